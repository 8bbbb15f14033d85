// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use serde::Serialize;

use crate::config::ConfigMap;
use crate::errors::ConfigError;
use crate::graph::{EdgeId, PortSet};
use crate::traits::{NodeLifecycle, Process};

/// Stable handle for a node, assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How one input port is wired to an upstream edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBinding {
    pub edge: EdgeId,
    pub cursor: usize,
    pub deferred: bool,
}

/// A process instance together with its wiring and lifecycle.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: &'static str,
    // `None` only while an async worker owns the process.
    pub(crate) process: Option<Box<dyn Process>>,
    pub(crate) ports: PortSet,
    pub(crate) config: ConfigMap,
    pub(crate) lifecycle: NodeLifecycle,
    /// Indexed like `ports.inputs()`.
    pub(crate) inputs: Vec<Option<InputBinding>>,
    /// Indexed like `ports.outputs()`.
    pub(crate) outputs: Vec<Option<EdgeId>>,
    /// Trigger edges from the nodes this one must run after.
    pub(crate) after: Vec<InputBinding>,
    /// Trigger edge this node signals after each successful step.
    pub(crate) trigger: Option<EdgeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, process: Box<dyn Process>, config: ConfigMap) -> Self {
        let ports = process.ports();
        let kind = process.name();
        Self {
            id,
            name,
            kind,
            inputs: vec![None; ports.inputs().len()],
            outputs: vec![None; ports.outputs().len()],
            after: Vec::new(),
            trigger: None,
            ports,
            config,
            process: Some(process),
            lifecycle: NodeLifecycle::Uninitialized,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The process type name, e.g. `"collector"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn lifecycle(&self) -> NodeLifecycle {
        self.lifecycle
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Validated configuration (defaults filled in once initialized).
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Every bound input, execution dependencies included.
    pub(crate) fn input_bindings(&self) -> impl Iterator<Item = InputBinding> + '_ {
        self.inputs
            .iter()
            .flatten()
            .copied()
            .chain(self.after.iter().copied())
    }

    /// Inputs that decide when the node may step.
    ///
    /// Normally the non-deferred inputs and execution dependencies. A node
    /// wired only through deferred edges is gated by those instead: it steps
    /// when one of them holds a value and is done once all are closed.
    pub(crate) fn gating_inputs(&self) -> Vec<InputBinding> {
        let blocking: Vec<InputBinding> = self.input_bindings().filter(|b| !b.deferred).collect();
        if blocking.is_empty() {
            self.input_bindings().collect()
        } else {
            blocking
        }
    }

    /// Data edges plus the trigger edge, if any.
    pub(crate) fn output_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.outputs.iter().flatten().copied().chain(self.trigger)
    }

    /// A node with no bound inputs steps on its own schedule.
    pub fn is_source(&self) -> bool {
        self.input_bindings().next().is_none()
    }

    /// Nodes this one must run after, through trigger edges.
    pub fn dependency_count(&self) -> usize {
        self.after.len()
    }

    /// Validate `config` against the process schema, then initialize.
    pub(crate) fn initialize(&mut self) -> Result<(), ConfigError> {
        let process = self.process.as_mut().ok_or_else(|| ConfigError::Rejected {
            reason: "process is not available".to_string(),
        })?;
        let validated = process.config_schema().validate(&self.config)?;
        process.initialize(&validated)?;
        self.config = validated;
        self.lifecycle = NodeLifecycle::Initialized;
        Ok(())
    }

    /// Apply `overrides` on top of the current config, validate the result
    /// and hand it to [`Process::reconfigure`]. The stored config changes
    /// only if the process accepts it.
    pub(crate) fn reconfigure(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let process = self.process.as_mut().ok_or_else(|| ConfigError::Rejected {
            reason: "process is not available".to_string(),
        })?;
        let merged = self.config.merged(overrides);
        let validated = process.config_schema().validate(&merged)?;
        process.reconfigure(&validated)?;
        self.config = validated;
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("lifecycle", &self.lifecycle)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("after", &self.after)
            .field("trigger", &self.trigger)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::{RunningTotal, SlidingDifference};

    #[test]
    fn test_gating_inputs_prefer_blocking_edges() {
        let mut node = Node::new(NodeId(0), "total".to_string(), Box::new(RunningTotal::new()), ConfigMap::new());
        assert!(node.is_source());
        assert!(node.gating_inputs().is_empty());

        node.inputs[1] = Some(InputBinding {
            edge: EdgeId(4),
            cursor: 0,
            deferred: true,
        });
        assert!(!node.is_source());
        assert_eq!(node.gating_inputs().len(), 1, "deferred-only wiring gates on the deferred edge");

        node.inputs[0] = Some(InputBinding {
            edge: EdgeId(2),
            cursor: 0,
            deferred: false,
        });
        let gating = node.gating_inputs();
        assert_eq!(gating.len(), 1);
        assert_eq!(gating[0].edge, EdgeId(2));
    }

    #[test]
    fn test_execution_dependency_gates_and_signals() {
        let mut node = Node::new(NodeId(3), "diff".to_string(), Box::new(SlidingDifference::new()), ConfigMap::new());
        node.after.push(InputBinding {
            edge: EdgeId(9),
            cursor: 1,
            deferred: false,
        });
        node.trigger = Some(EdgeId(11));

        assert!(!node.is_source());
        assert_eq!(node.dependency_count(), 1);
        assert_eq!(node.gating_inputs()[0].edge, EdgeId(9));
        assert_eq!(node.output_edges().collect::<Vec<_>>(), vec![EdgeId(11)]);
    }

    #[test]
    fn test_reconfigure_merges_and_validates() {
        let mut node = Node::new(
            NodeId(1),
            "diff".to_string(),
            Box::new(SlidingDifference::new()),
            ConfigMap::new(),
        );
        node.initialize().unwrap();

        node.reconfigure(&ConfigMap::new().with("span", 3_i64)).unwrap();
        assert_eq!(node.config().get_int("span"), Some(3));

        let rejected = node.reconfigure(&ConfigMap::new().with("span", 0_i64));
        assert!(matches!(rejected, Err(ConfigError::OutOfRange { .. })));
        assert_eq!(node.config().get_int("span"), Some(3));
    }

    #[test]
    fn test_initialize_stores_validated_config() {
        let mut node = Node::new(
            NodeId(1),
            "diff".to_string(),
            Box::new(SlidingDifference::new()),
            ConfigMap::new(),
        );
        node.initialize().unwrap();

        assert_eq!(node.lifecycle(), NodeLifecycle::Initialized);
        assert_eq!(node.config().get_int("span"), Some(1));
        assert_eq!(node.kind(), "sliding_difference");
    }

    #[test]
    fn test_initialize_rejects_unknown_option() {
        let mut node = Node::new(
            NodeId(1),
            "diff".to_string(),
            Box::new(SlidingDifference::new()),
            ConfigMap::new().with("spam", 1_i64),
        );
        assert!(matches!(
            node.initialize(),
            Err(ConfigError::UnknownOption { option }) if option == "spam"
        ));
        assert_eq!(node.lifecycle(), NodeLifecycle::Uninitialized);
    }
}
