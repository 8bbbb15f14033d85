// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A whole pipeline packaged as a single process.
//!
//! The inner graph is driven by its own [`SyncPipeline`]. Each exposed input
//! is fed through an inlet source added to the inner graph, and each
//! exposed output is drained by an outlet sink. One outer step pushes the
//! current inputs into the inlets, then advances the inner pipeline until a
//! tick passes with no successful step.

use std::any::Any;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::config::{ConfigMap, ConfigSchema, OptionSpec};
use crate::engine::{PipelineState, SyncPipeline};
use crate::errors::{ConfigError, GraphError};
use crate::graph::{Packet, PipelineGraph, PortRef, PortSet};
use crate::traits::{Process, StepContext, StepStatus};
use crate::utils::lock;

type Queue = Arc<Mutex<VecDeque<Packet>>>;

const DEFAULT_MAX_TICKS: i64 = 1_000;

/// Runs a nested [`PipelineGraph`] one outer step at a time.
///
/// The outer step reports `Success` once every exposed output holds a value,
/// `NoOutput` while the inner graph is still warming up, `EndOfInput` when
/// the inner pipeline stops on its own, and `Failure` when it fails. Inner
/// graphs that emit more than one value per input hand the surplus out on
/// later steps.
///
/// Options:
/// * `max_ticks` - inner ticks allowed per outer step before the step fails
///   (default 1000)
///
/// # Examples
/// ```
/// use framegraph::config::ConfigMap;
/// use framegraph::graph::PipelineGraph;
/// use framegraph::processes::{Passthrough, SubPipeline};
///
/// let mut inner = PipelineGraph::new();
/// let pass = inner.add_node("pass", Passthrough::<i64>::new(), ConfigMap::new()).unwrap();
/// let nested = SubPipeline::new(inner)
///     .expose_input::<i64>("in", pass.port("in"))
///     .unwrap()
///     .expose_output::<i64>("out", pass.port("out"))
///     .unwrap();
///
/// let mut outer = PipelineGraph::new();
/// outer.add_node("nested", nested, ConfigMap::new()).unwrap();
/// ```
pub struct SubPipeline {
    graph: PipelineGraph,
    inner: Option<SyncPipeline>,
    ports: PortSet,
    inlets: Vec<(String, Queue)>,
    outlets: Vec<(String, Queue)>,
    max_ticks: u64,
}

impl SubPipeline {
    pub fn new(graph: PipelineGraph) -> Self {
        Self {
            graph,
            inner: None,
            ports: PortSet::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            max_ticks: DEFAULT_MAX_TICKS as u64,
        }
    }

    /// Expose inner input `target` as outer input port `name`.
    pub fn expose_input<T: Any + Send + Sync>(mut self, name: &str, target: PortRef) -> Result<Self, GraphError> {
        let queue = Queue::default();
        let inlet = self.graph.add_node(
            &format!("inlet:{}", name),
            Inlet::<T>::new(queue.clone()),
            ConfigMap::new(),
        )?;
        self.graph.connect(inlet.port("out"), target, 1)?;
        self.ports = std::mem::take(&mut self.ports).input::<T>(name);
        self.inlets.push((name.to_string(), queue));
        Ok(self)
    }

    /// Expose inner output `source` as outer output port `name`.
    pub fn expose_output<T: Any + Send + Sync>(mut self, name: &str, source: PortRef) -> Result<Self, GraphError> {
        let queue = Queue::default();
        let outlet = self.graph.add_node(
            &format!("outlet:{}", name),
            Outlet::<T>::new(queue.clone()),
            ConfigMap::new(),
        )?;
        self.graph.connect(source, outlet.port("in"), 1)?;
        self.ports = std::mem::take(&mut self.ports).output::<T>(name);
        self.outlets.push((name.to_string(), queue));
        Ok(self)
    }

    /// Advance the inner pipeline until it goes quiet. `Err` carries the
    /// cause of a failed step.
    fn settle(&mut self) -> Result<PipelineState, String> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| "nested pipeline used before initialize".to_string())?;

        let mut ticks = 0;
        while inner.state() == PipelineState::Running {
            if ticks == self.max_ticks {
                return Err(format!("nested pipeline still busy after {} ticks", ticks));
            }
            let report = inner.advance().map_err(|e| e.to_string())?;
            ticks += 1;
            if !report.steps.iter().any(|r| r.status == StepStatus::Success) {
                break;
            }
        }

        if let Some(failure) = inner.failure() {
            return Err(format!("{}: {}", failure.node_name, failure.cause));
        }
        Ok(inner.state())
    }

    fn clear_queues(&self) {
        for (_, queue) in self.inlets.iter().chain(self.outlets.iter()) {
            lock(queue).clear();
        }
    }
}

impl Process for SubPipeline {
    fn name(&self) -> &'static str {
        "sub_pipeline"
    }

    fn ports(&self) -> PortSet {
        self.ports.clone()
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().option(
            OptionSpec::int("max_ticks", "inner ticks allowed per outer step")
                .default(DEFAULT_MAX_TICKS)
                .range(1.0, 1_000_000.0),
        )
    }

    fn initialize(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        self.max_ticks = config.get_int("max_ticks").unwrap_or(DEFAULT_MAX_TICKS) as u64;
        if self.inner.is_some() {
            return Ok(());
        }

        let rejected = |e: &dyn std::fmt::Display| ConfigError::Rejected {
            reason: format!("nested pipeline: {}", e),
        };
        let graph = std::mem::replace(&mut self.graph, PipelineGraph::new());
        let built = graph.build().map_err(|e| rejected(&e))?;
        let mut inner = SyncPipeline::new(built).map_err(|e| rejected(&e))?;
        inner.start().map_err(|e| rejected(&e))?;
        self.inner = Some(inner);
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        for (port, queue) in &self.inlets {
            if let Some(packet) = ctx.input_packet(port).cloned() {
                lock(queue).push_back(packet);
            }
        }

        let state = match self.settle() {
            Ok(state) => state,
            Err(cause) => return ctx.fail(cause),
        };

        let ready = self.outlets.iter().all(|(_, queue)| !lock(queue).is_empty());
        if ready && !self.outlets.is_empty() {
            for (port, queue) in &self.outlets {
                if let Some(packet) = lock(queue).pop_front() {
                    ctx.forward(port, packet);
                }
            }
            return StepStatus::Success;
        }
        if state == PipelineState::Stopped {
            return StepStatus::EndOfInput;
        }
        StepStatus::NoOutput
    }

    fn finalize(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            let _ = inner.stop();
        }
    }

    fn reset(&mut self) -> bool {
        let Some(inner) = self.inner.as_mut() else {
            return true;
        };
        let restarted = inner
            .stop()
            .and_then(|_| inner.reset())
            .and_then(|_| inner.start());
        self.clear_queues();
        restarted.is_ok()
    }
}

/// Inner source that emits whatever the outer step queued for it.
struct Inlet<T> {
    queue: Queue,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Inlet<T> {
    fn new(queue: Queue) -> Self {
        Self {
            queue,
            _marker: PhantomData,
        }
    }
}

impl<T: Any> Process for Inlet<T> {
    fn name(&self) -> &'static str {
        "inlet"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().output::<T>("out")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        match lock(&self.queue).pop_front() {
            Some(packet) => {
                ctx.forward("out", packet);
                StepStatus::Success
            }
            None => StepStatus::NoOutput,
        }
    }
}

/// Inner sink that queues values for the outer step to publish.
struct Outlet<T> {
    queue: Queue,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Outlet<T> {
    fn new(queue: Queue) -> Self {
        Self {
            queue,
            _marker: PhantomData,
        }
    }
}

impl<T: Any> Process for Outlet<T> {
    fn name(&self) -> &'static str {
        "outlet"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().input::<T>("in")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        match ctx.input_packet("in").cloned() {
            Some(packet) => {
                lock(&self.queue).push_back(packet);
                StepStatus::Success
            }
            None => StepStatus::NoOutput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::{Passthrough, ScriptStep, ScriptedSource, SlidingDifference, SumInputs};
    use crate::resources::ResourcePool;
    use std::collections::HashMap;

    fn initialized(mut process: SubPipeline) -> SubPipeline {
        let config = process.config_schema().validate(&ConfigMap::new()).unwrap();
        process.initialize(&config).unwrap();
        process
    }

    fn feed(process: &mut SubPipeline, inputs: &[(&str, i64)]) -> (StepStatus, HashMap<String, i64>) {
        let inputs = inputs
            .iter()
            .map(|(port, value)| (port.to_string(), Arc::new(*value) as Packet))
            .collect();
        let mut ctx = StepContext::new("nested", 0, inputs, Arc::new(ResourcePool::new()));
        let status = process.step(&mut ctx);
        let outputs = ctx
            .take_outputs()
            .into_iter()
            .filter_map(|(port, packet)| packet.downcast_ref::<i64>().map(|v| (port, *v)))
            .collect();
        (status, outputs)
    }

    fn differencing() -> SubPipeline {
        let mut inner = PipelineGraph::new();
        let pass = inner.add_node("pass", Passthrough::<i64>::new(), ConfigMap::new()).unwrap();
        let diff = inner.add_node("diff", SlidingDifference::new(), ConfigMap::new()).unwrap();
        inner.connect(pass.port("out"), diff.port("in"), 1).unwrap();
        SubPipeline::new(inner)
            .expose_input::<i64>("in", pass.port("in"))
            .unwrap()
            .expose_output::<i64>("delta", diff.port("out"))
            .unwrap()
    }

    #[test]
    fn test_exposed_ports_become_process_ports() {
        let process = differencing();
        let ports = process.ports();
        assert!(ports.input_spec("in").is_some());
        assert!(ports.output_spec("delta").is_some());
        assert_eq!(process.inlets.len(), 1);
        assert_eq!(process.outlets.len(), 1);
    }

    #[test]
    fn test_each_outer_step_settles_inner_graph() {
        let mut process = initialized(differencing());

        assert_eq!(feed(&mut process, &[("in", 5)]).0, StepStatus::NoOutput);
        let (status, outputs) = feed(&mut process, &[("in", 8)]);
        assert_eq!(status, StepStatus::Success);
        assert_eq!(outputs.get("delta"), Some(&3));
    }

    #[test]
    fn test_waits_for_every_exposed_input() {
        let mut inner = PipelineGraph::new();
        let sum = inner.add_node("sum", SumInputs::new(), ConfigMap::new()).unwrap();
        let nested = SubPipeline::new(inner)
            .expose_input::<i64>("left", sum.port("left"))
            .unwrap()
            .expose_input::<i64>("right", sum.port("right"))
            .unwrap()
            .expose_output::<i64>("sum", sum.port("sum"))
            .unwrap();
        let mut process = initialized(nested);

        assert_eq!(feed(&mut process, &[("left", 1)]).0, StepStatus::NoOutput);
        let (status, outputs) = feed(&mut process, &[("right", 10)]);
        assert_eq!(status, StepStatus::Success);
        assert_eq!(outputs.get("sum"), Some(&11));
    }

    #[test]
    fn test_inner_failure_fails_outer_step() {
        let mut inner = PipelineGraph::new();
        let script = inner
            .add_node(
                "script",
                ScriptedSource::new(vec![ScriptStep::Fail("inner broke".to_string())]),
                ConfigMap::new(),
            )
            .unwrap();
        let nested = SubPipeline::new(inner)
            .expose_output::<i64>("out", script.port("out"))
            .unwrap();
        let mut process = initialized(nested);

        let inputs = HashMap::new();
        let mut ctx = StepContext::new("nested", 0, inputs, Arc::new(ResourcePool::new()));
        assert_eq!(process.step(&mut ctx), StepStatus::Failure);
        assert_eq!(ctx.take_failure_cause().as_deref(), Some("script: inner broke"));
    }

    #[test]
    fn test_inner_end_of_input_ends_outer() {
        let mut inner = PipelineGraph::new();
        let script = inner
            .add_node("script", ScriptedSource::emitting([4]), ConfigMap::new())
            .unwrap();
        let nested = SubPipeline::new(inner)
            .expose_output::<i64>("out", script.port("out"))
            .unwrap();
        let mut process = initialized(nested);

        let (status, outputs) = feed(&mut process, &[]);
        assert_eq!(status, StepStatus::Success);
        assert_eq!(outputs.get("out"), Some(&4));
        assert_eq!(feed(&mut process, &[]).0, StepStatus::EndOfInput);

        assert!(process.reset());
        assert_eq!(feed(&mut process, &[]).1.get("out"), Some(&4));
    }

    #[test]
    fn test_bad_inner_graph_rejected_at_initialize() {
        let mut inner = PipelineGraph::new();
        inner.add_node("sum", SumInputs::new(), ConfigMap::new()).unwrap();
        let mut process = SubPipeline::new(inner);
        let config = process.config_schema().validate(&ConfigMap::new()).unwrap();

        assert!(matches!(
            process.initialize(&config),
            Err(ConfigError::Rejected { .. })
        ));
    }
}
