// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The contract between the engine and the units of work it schedules.
//!
//! A [`Process`] declares its ports and configuration, is initialized once
//! with a validated [`ConfigMap`], and is then stepped repeatedly. Each step
//! reads at most one value per input port and may publish at most one value
//! per output port through a [`StepContext`]; the step's [`StepStatus`]
//! tells the scheduler what happened.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ConfigMap, ConfigSchema};
use crate::errors::ConfigError;
use crate::graph::{Packet, PortSet};
use crate::resources::ResourcePool;

/// Outcome of one `step()` call.
///
/// # Variants
/// * `Success` - every connected output port was published
/// * `NoOutput` - the step consumed its inputs but produced nothing (warm-up)
/// * `Skip` - the inputs were deliberately dropped; nothing is published
/// * `Failure` - node-local error; the failure policy decides what happens next
/// * `EndOfInput` - the node is done producing; its output edges close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    NoOutput,
    Skip,
    Failure,
    EndOfInput,
}

/// Lifecycle of a node inside a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLifecycle {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    Failed,
}

impl NodeLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeLifecycle::Stopped | NodeLifecycle::Failed)
    }
}

/// A unit of work in the pipeline.
///
/// Implementations are driven by exactly one scheduler thread at a time, so
/// `step()` takes `&mut self` and may keep arbitrary internal state between
/// calls. `Send` is required because the async scheduler moves each process
/// onto its own worker.
///
/// # Examples
/// ```
/// use framegraph::graph::PortSet;
/// use framegraph::traits::{Process, StepContext, StepStatus};
///
/// struct Doubler;
///
/// impl Process for Doubler {
///     fn name(&self) -> &'static str {
///         "doubler"
///     }
///
///     fn ports(&self) -> PortSet {
///         PortSet::new().input::<i64>("in").output::<i64>("out")
///     }
///
///     fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
///         match ctx.input::<i64>("in").copied() {
///             Some(value) => {
///                 ctx.output("out", value * 2);
///                 StepStatus::Success
///             }
///             None => StepStatus::NoOutput,
///         }
///     }
/// }
/// ```
pub trait Process: Send {
    /// Short type name of the process, e.g. `"sliding_difference"`.
    fn name(&self) -> &'static str;

    /// Declared input and output ports. Must not change after construction.
    fn ports(&self) -> PortSet;

    /// Options this process accepts. The default accepts none.
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
    }

    /// Called once, before the first step, with the config already validated
    /// against [`Process::config_schema`] and defaults filled in.
    fn initialize(&mut self, _config: &ConfigMap) -> Result<(), ConfigError> {
        Ok(())
    }

    /// New options while the pipeline exists, already validated against
    /// the schema. The default re-runs [`Process::initialize`].
    fn reconfigure(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        self.initialize(config)
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus;

    /// Called exactly once when the node stops, fails, or the pipeline halts.
    fn finalize(&mut self) {}

    /// Return to the just-initialized state. Returning `false` refuses.
    fn reset(&mut self) -> bool {
        true
    }
}

/// Per-step view of a node's inputs, outputs and the shared resource pool.
pub struct StepContext {
    node_name: String,
    tick: u64,
    inputs: HashMap<String, Packet>,
    outputs: HashMap<String, Packet>,
    failure_cause: Option<String>,
    resources: Arc<ResourcePool>,
}

impl StepContext {
    pub fn new(
        node_name: impl Into<String>,
        tick: u64,
        inputs: HashMap<String, Packet>,
        resources: Arc<ResourcePool>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            tick,
            inputs,
            outputs: HashMap::new(),
            failure_cause: None,
            resources,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Zero-based index of this step for the node.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The value on `port` for this step, if one arrived and has type `T`.
    pub fn input<T: Any>(&self, port: &str) -> Option<&T> {
        self.inputs.get(port)?.downcast_ref::<T>()
    }

    pub fn input_packet(&self, port: &str) -> Option<&Packet> {
        self.inputs.get(port)
    }

    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.contains_key(port)
    }

    /// Publish `value` on `port`. A second call for the same port replaces
    /// the first; only one value per port leaves a step.
    pub fn output<T: Any + Send + Sync>(&mut self, port: &str, value: T) {
        self.outputs.insert(port.to_string(), Arc::new(value));
    }

    /// Publish an existing packet without copying the value.
    pub fn forward(&mut self, port: &str, packet: Packet) {
        self.outputs.insert(port.to_string(), packet);
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.contains_key(port)
    }

    /// Record why the step failed and return `StepStatus::Failure`.
    pub fn fail(&mut self, cause: impl Into<String>) -> StepStatus {
        self.failure_cause = Some(cause.into());
        StepStatus::Failure
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub(crate) fn take_outputs(&mut self) -> HashMap<String, Packet> {
        std::mem::take(&mut self.outputs)
    }

    pub(crate) fn take_failure_cause(&mut self) -> Option<String> {
        self.failure_cause.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(inputs: Vec<(&str, Packet)>) -> StepContext {
        let inputs = inputs
            .into_iter()
            .map(|(name, packet)| (name.to_string(), packet))
            .collect();
        StepContext::new("node", 3, inputs, Arc::new(ResourcePool::new()))
    }

    #[test]
    fn test_typed_input_access() {
        let ctx = context_with(vec![("frame", Arc::new(7_i64) as Packet)]);
        assert_eq!(ctx.input::<i64>("frame"), Some(&7));
        assert_eq!(ctx.input::<String>("frame"), None);
        assert!(ctx.has_input("frame"));
        assert!(!ctx.has_input("mask"));
        assert_eq!(ctx.tick(), 3);
        assert_eq!(ctx.node_name(), "node");
    }

    #[test]
    fn test_outputs_replace_and_drain() {
        let mut ctx = context_with(vec![]);
        ctx.output("out", 1_i64);
        ctx.output("out", 2_i64);
        assert!(ctx.has_output("out"));

        let outputs = ctx.take_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["out"].downcast_ref::<i64>(), Some(&2));
        assert!(!ctx.has_output("out"));
    }

    #[test]
    fn test_forward_shares_packet() {
        let packet: Packet = Arc::new(String::from("frame"));
        let mut ctx = context_with(vec![("in", packet.clone())]);
        let incoming = ctx.input_packet("in").cloned().unwrap();
        ctx.forward("out", incoming);

        let outputs = ctx.take_outputs();
        assert!(Arc::ptr_eq(&outputs["out"], &packet));
    }

    #[test]
    fn test_fail_records_cause() {
        let mut ctx = context_with(vec![]);
        assert_eq!(ctx.fail("decoder lost sync"), StepStatus::Failure);
        assert_eq!(ctx.take_failure_cause().as_deref(), Some("decoder lost sync"));
        assert_eq!(ctx.take_failure_cause(), None);
    }
}
