// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Single-threaded, deterministic scheduler.
//!
//! Each call to [`SyncPipeline::advance`] is one *tick*: live nodes are
//! visited once, in the topological order fixed at build time, and each is
//! stepped at most once. Because the visiting order and every readiness
//! decision depend only on edge contents, the same inputs always produce
//! the same sequence of steps.
//!
//! ## Readiness
//! A node steps when every gating input has a value or is closed and
//! drained, at least one of them has a value, and none of its non-deferred
//! output edges is full. Gating inputs are the non-deferred inputs and
//! execution dependencies; a node wired only through deferred edges is
//! gated by those, and steps as soon as any one of them has a value. A node
//! whose gating inputs are all closed and drained retires as if it had
//! returned `EndOfInput`; its own output edges close, so purely downstream
//! nodes retire later in the same tick. Nodes with no inputs at all are
//! sources and step every tick until they report `EndOfInput`.
//!
//! ## Reviving a branch
//! Under [`FailurePolicy::ContinueOnError`] a failed node and whatever it fed
//! retire while the rest keeps running. [`SyncPipeline::reset_downstream`]
//! resets that branch and puts it back on the schedule;
//! [`SyncPipeline::set_params_downstream`] pushes new options into it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::RingBuffer;
use crate::config::{ConfigMap, EngineConfig};
use crate::engine::step::{self, OutputPort};
use crate::engine::{NodeReport, NodeStats, PipelineReport, PipelineState, StepRecord, TickReport};
use crate::errors::{FailurePolicy, GraphError, PipelineError, StepFailure};
use crate::graph::{
    downstream_of, Availability, BuiltPipeline, Edge, EdgeId, InputBinding, Node, NodeId, Packet,
};
use crate::observability::messages::scheduler::{
    BranchReset, NodeReconfigured, NodeRetired, PipelineFinished, PipelineHalted, PipelineReset,
    PipelineStalled, PipelineStarted,
};
use crate::observability::messages::StructuredLog;
use crate::resources::ResourcePool;
use crate::traits::{NodeLifecycle, StepContext, StepStatus};

const SCHEDULER: &str = "sync";

/// Tick reports kept for [`SyncPipeline::history`] unless configured.
const DEFAULT_HISTORY: usize = 64;

enum Readiness {
    Ready,
    Wait,
    Exhausted,
}

/// Drives a [`BuiltPipeline`] one tick at a time on the caller's thread.
///
/// # Examples
/// ```
/// use framegraph::config::ConfigMap;
/// use framegraph::engine::{PipelineState, SyncPipeline};
/// use framegraph::graph::PipelineGraph;
/// use framegraph::processes::{Collector, VecSource};
///
/// let (collector, collected) = Collector::<i64>::new();
/// let mut graph = PipelineGraph::new();
/// let src = graph.add_node("numbers", VecSource::new(vec![1_i64, 2, 3]), ConfigMap::new()).unwrap();
/// let sink = graph.add_node("sink", collector, ConfigMap::new()).unwrap();
/// graph.connect(src.port("out"), sink.port("in"), 2).unwrap();
///
/// let mut pipeline = SyncPipeline::new(graph.build().unwrap()).unwrap();
/// pipeline.start().unwrap();
/// assert_eq!(pipeline.run().unwrap(), PipelineState::Stopped);
/// assert_eq!(collected.values(), vec![1, 2, 3]);
/// ```
pub struct SyncPipeline {
    nodes: Vec<Node>,
    edges: BTreeMap<EdgeId, Edge>,
    order: Vec<NodeId>,
    ordering: Vec<(NodeId, NodeId)>,
    outputs: Vec<Vec<OutputPort>>,
    live: Vec<bool>,
    stats: Vec<NodeStats>,
    state: PipelineState,
    policy: FailurePolicy,
    failure: Option<StepFailure>,
    tick: u64,
    max_ticks: Option<u64>,
    history: RingBuffer<TickReport>,
    started: Option<Instant>,
    resources: Arc<ResourcePool>,
}

impl SyncPipeline {
    /// Take ownership of a built pipeline.
    ///
    /// # Errors
    /// [`GraphError::Cycle`] if deferred edges close a cycle; this scheduler
    /// only runs acyclic graphs.
    pub fn new(built: BuiltPipeline) -> Result<Self, PipelineError> {
        if let Some(cycle) = built.feedback_cycle() {
            return Err(GraphError::Cycle {
                path: built.cycle_names(cycle),
            }
            .into());
        }

        let BuiltPipeline {
            nodes,
            edges,
            order,
            ordering,
            resources,
            ..
        } = built;
        let outputs = nodes.iter().map(step::output_ports).collect();
        let node_count = nodes.len();

        Ok(Self {
            nodes,
            edges,
            order,
            ordering,
            outputs,
            live: vec![false; node_count],
            stats: vec![NodeStats::default(); node_count],
            state: PipelineState::Built,
            policy: FailurePolicy::default(),
            failure: None,
            tick: 0,
            max_ticks: None,
            history: RingBuffer::new(DEFAULT_HISTORY)
                .map_err(|e| PipelineError::Runtime(e.to_string()))?,
            started: None,
            resources,
        })
    }

    /// Apply the engine-wide failure policy and tick limit.
    pub fn from_config(built: BuiltPipeline, config: &EngineConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(built)?
            .with_policy(config.failure_policy)
            .with_max_ticks(config.max_ticks))
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound on ticks taken by [`SyncPipeline::run`].
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Number of recent tick reports retained. Zero is treated as one.
    pub fn with_history(mut self, limit: usize) -> Self {
        if let Ok(history) = RingBuffer::new(limit.max(1)) {
            self.history = history;
        }
        self
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Built {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }
        PipelineStarted {
            scheduler: SCHEDULER,
            nodes: self.nodes.len(),
            policy: self.policy,
        }
        .log();

        for node in self.nodes.iter_mut() {
            node.lifecycle = NodeLifecycle::Running;
        }
        self.live.iter_mut().for_each(|live| *live = true);
        self.started = Some(Instant::now());
        self.state = PipelineState::Running;

        if self.nodes.is_empty() {
            self.finish();
        }
        Ok(())
    }

    /// Run one tick.
    pub fn advance(&mut self) -> Result<TickReport, PipelineError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning { state: self.state });
        }

        let mut report = TickReport::new(self.tick);
        for position in 0..self.order.len() {
            let id = self.order[position];
            if !self.live[id.0] {
                continue;
            }

            match self.readiness(id) {
                Readiness::Wait => continue,
                Readiness::Exhausted => {
                    self.retire(id, NodeLifecycle::Stopped, None);
                    report.retired.push(id);
                    continue;
                }
                Readiness::Ready => {}
            }

            let status = self.step_node(id);
            report.steps.push(StepRecord { node: id, status });

            match status {
                StepStatus::EndOfInput => {
                    self.retire(id, NodeLifecycle::Stopped, Some(status));
                    report.retired.push(id);
                }
                StepStatus::Failure => match self.policy {
                    FailurePolicy::FailFast => {
                        self.halt(id);
                        break;
                    }
                    FailurePolicy::ContinueOnError => {
                        self.retire(id, NodeLifecycle::Failed, Some(status));
                        report.retired.push(id);
                    }
                },
                _ => {}
            }
        }

        self.tick += 1;
        if self.state == PipelineState::Running && !self.live.iter().any(|live| *live) {
            self.finish();
        }
        self.history.push(report.clone());
        Ok(report)
    }

    /// Advance until the pipeline stops or fails.
    ///
    /// # Errors
    /// [`PipelineError::Stalled`] when a tick makes no progress, and
    /// [`PipelineError::Runtime`] when the configured tick limit is hit.
    pub fn run(&mut self) -> Result<PipelineState, PipelineError> {
        let span = PipelineStarted {
            scheduler: SCHEDULER,
            nodes: self.nodes.len(),
            policy: self.policy,
        }
        .span("run");
        let _entered = span.enter();

        while self.state == PipelineState::Running {
            if let Some(max) = self.max_ticks {
                if self.tick >= max {
                    return Err(PipelineError::Runtime(format!(
                        "tick limit of {} reached",
                        max
                    )));
                }
            }
            let report = self.advance()?;
            if !report.made_progress() && self.state == PipelineState::Running {
                PipelineStalled {
                    tick: report.tick,
                    waiting: self.live.iter().filter(|live| **live).count(),
                }
                .log();
                return Err(PipelineError::Stalled { tick: report.tick });
            }
        }
        Ok(self.state)
    }

    /// Finalize every live node and stop.
    pub fn stop(&mut self) -> Result<PipelineState, PipelineError> {
        match self.state {
            PipelineState::Running => {
                self.state = PipelineState::Draining;
                for position in 0..self.order.len() {
                    let id = self.order[position];
                    if self.live[id.0] {
                        self.retire(id, NodeLifecycle::Stopped, None);
                    }
                }
                self.finish();
                Ok(self.state)
            }
            state if state.is_terminal() => Ok(state),
            state => Err(PipelineError::InvalidTransition {
                from: state,
                action: "stop",
            }),
        }
    }

    /// Reset every process and edge so the pipeline can be started again.
    ///
    /// Values in the resource pool are dropped; subscriptions stay. If a
    /// process refuses, the pipeline keeps its terminal state, edges and
    /// counters, and the call can be retried.
    pub fn reset(&mut self) -> Result<(), PipelineError> {
        if !self.state.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                action: "reset",
            });
        }
        let all: Vec<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        self.reset_processes(&all)?;

        for node in self.nodes.iter_mut() {
            node.lifecycle = NodeLifecycle::Initialized;
        }
        self.edges.values_mut().for_each(Edge::reset);
        self.stats.iter_mut().for_each(|s| *s = NodeStats::default());
        self.history.clear();
        self.resources.clear_values();
        self.failure = None;
        self.tick = 0;
        self.started = None;
        self.state = PipelineState::Built;

        PipelineReset {
            nodes: self.nodes.len(),
        }
        .log();
        Ok(())
    }

    /// Reset one node of a running pipeline and put it back on the
    /// schedule. Its output edges reopen with their contents intact.
    pub fn reset_node(&mut self, id: NodeId) -> Result<(), PipelineError> {
        self.lookup(id)?;
        self.revive(&[id])
    }

    /// Reset `id` and every node downstream of it, over data edges,
    /// deferred edges and execution dependencies, and put them back on the
    /// schedule. Edges inside the branch are emptied. Returns the branch in
    /// breadth-first order, `id` first.
    pub fn reset_downstream(&mut self, id: NodeId) -> Result<Vec<NodeId>, PipelineError> {
        self.lookup(id)?;
        let branch = downstream_of(id, self.nodes.len(), &self.edges, &self.ordering);
        self.revive(&branch)?;
        Ok(branch)
    }

    /// Push new options to nodes by name. Each entry is merged over the
    /// node's current config, validated, and handed to the process. Every
    /// named node is tried; the first error is returned.
    pub fn set_params(&mut self, params: &BTreeMap<String, ConfigMap>) -> Result<(), PipelineError> {
        if let Some(unknown) = params.keys().find(|name| self.node_id(name).is_none()) {
            return Err(GraphError::UnknownNode(unknown.clone()).into());
        }
        let all: Vec<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        self.reconfigure(&all, params)
    }

    /// [`SyncPipeline::set_params`] limited to `id` and its downstream
    /// nodes; entries for other nodes are ignored. Returns the branch.
    pub fn set_params_downstream(
        &mut self,
        id: NodeId,
        params: &BTreeMap<String, ConfigMap>,
    ) -> Result<Vec<NodeId>, PipelineError> {
        self.lookup(id)?;
        let branch = downstream_of(id, self.nodes.len(), &self.edges, &self.ordering);
        self.reconfigure(&branch, params)?;
        Ok(branch)
    }

    fn lookup(&self, id: NodeId) -> Result<&Node, PipelineError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()).into())
    }

    /// Reset the processes of `ids`. Every process is asked even after a
    /// refusal; the first refusal is returned.
    fn reset_processes(&mut self, ids: &[NodeId]) -> Result<(), PipelineError> {
        let mut refused = None;
        for id in ids {
            let node = &mut self.nodes[id.0];
            let accepted = node
                .process
                .as_mut()
                .map(|process| step::reset(process.as_mut()))
                .unwrap_or(false);
            if !accepted && refused.is_none() {
                refused = Some(node.name.clone());
            }
        }
        match refused {
            Some(node) => Err(PipelineError::ResetRefused { node }),
            None => Ok(()),
        }
    }

    fn revive(&mut self, branch: &[NodeId]) -> Result<(), PipelineError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning { state: self.state });
        }
        self.reset_processes(branch)?;

        for &id in branch {
            let outputs: Vec<EdgeId> = self.nodes[id.0].output_edges().collect();
            for edge_id in outputs {
                if let Some(edge) = self.edges.get_mut(&edge_id) {
                    if edge.consumers().iter().all(|c| branch.contains(&c.node)) {
                        edge.reset();
                    } else {
                        edge.reopen();
                    }
                }
            }
        }
        for &id in branch {
            let inputs: Vec<InputBinding> = self.nodes[id.0].input_bindings().collect();
            for binding in inputs {
                if let Some(edge) = self.edges.get_mut(&binding.edge) {
                    edge.reattach(binding.cursor);
                }
            }
            self.live[id.0] = true;
            self.nodes[id.0].lifecycle = NodeLifecycle::Running;
        }
        if self
            .failure
            .as_ref()
            .is_some_and(|failure| branch.contains(&failure.node))
        {
            self.failure = None;
        }

        if let Some(root) = branch.first() {
            BranchReset {
                root: &self.nodes[root.0].name,
                nodes: branch.len(),
            }
            .log();
        }
        Ok(())
    }

    fn reconfigure(
        &mut self,
        ids: &[NodeId],
        params: &BTreeMap<String, ConfigMap>,
    ) -> Result<(), PipelineError> {
        let mut first_error = None;
        for id in ids {
            let node = &mut self.nodes[id.0];
            let Some(overrides) = params.get(&node.name) else {
                continue;
            };
            match node.reconfigure(overrides) {
                Ok(()) => NodeReconfigured {
                    node: &node.name,
                    options: overrides.len(),
                }
                .log(),
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(GraphError::Configuration {
                            node: node.name.clone(),
                            source,
                        });
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn readiness(&self, id: NodeId) -> Readiness {
        let node = &self.nodes[id.0];
        let gating = node.gating_inputs();
        let deferred_only = gating.iter().all(|binding| binding.deferred);

        let mut any_ready = false;
        let mut any_pending = false;
        for binding in &gating {
            match self.edges[&binding.edge].availability(binding.cursor) {
                Availability::Ready => any_ready = true,
                Availability::Pending => any_pending = true,
                Availability::Closed => {}
            }
        }

        if !gating.is_empty() {
            if !any_ready {
                return if any_pending {
                    Readiness::Wait
                } else {
                    Readiness::Exhausted
                };
            }
            // deferred edges never hold a step back
            if any_pending && !deferred_only {
                return Readiness::Wait;
            }
        }

        let blocked = node
            .output_edges()
            .any(|edge| !self.edges[&edge].has_room());
        if blocked {
            Readiness::Wait
        } else {
            Readiness::Ready
        }
    }

    fn gather_inputs(&mut self, id: NodeId) -> HashMap<String, Packet> {
        let node = &self.nodes[id.0];
        let mut inputs = HashMap::new();
        for (index, binding) in node.inputs.iter().enumerate() {
            let Some(binding) = binding else {
                continue;
            };
            if let Some(edge) = self.edges.get_mut(&binding.edge) {
                if let Some(packet) = edge.take(binding.cursor) {
                    inputs.insert(node.ports.inputs()[index].name.clone(), packet);
                }
            }
        }
        for binding in &node.after {
            if let Some(edge) = self.edges.get_mut(&binding.edge) {
                edge.take(binding.cursor);
            }
        }
        inputs
    }

    fn step_node(&mut self, id: NodeId) -> StepStatus {
        let inputs = self.gather_inputs(id);
        let step_index = self.stats[id.0].steps;
        let node = &mut self.nodes[id.0];
        let mut ctx = StepContext::new(node.name.clone(), step_index, inputs, self.resources.clone());

        let outcome = match node.process.as_mut() {
            Some(process) => step::execute(process.as_mut(), &mut ctx, &self.outputs[id.0]),
            None => step::StepOutcome {
                status: StepStatus::Failure,
                publish: Vec::new(),
                cause: Some("process is not available".to_string()),
                elapsed: Duration::ZERO,
            },
        };

        for (edge, packet) in outcome.publish {
            if let Some(edge) = self.edges.get_mut(&edge) {
                // room was checked before stepping
                let _ = edge.publish(packet);
            }
        }
        if outcome.status == StepStatus::Success {
            if let Some(trigger) = self.nodes[id.0].trigger {
                if let Some(edge) = self.edges.get_mut(&trigger) {
                    let _ = edge.publish(Arc::new(()));
                }
            }
        }
        self.stats[id.0].record(outcome.status, outcome.elapsed);

        if outcome.status == StepStatus::Failure && self.failure.is_none() {
            self.failure = Some(StepFailure {
                node: id,
                node_name: self.nodes[id.0].name.clone(),
                status: StepStatus::Failure,
                cause: outcome.cause.unwrap_or_default(),
            });
        }
        outcome.status
    }

    /// Take a node off the schedule: close its outputs, release its input
    /// cursors and finalize it.
    fn retire(&mut self, id: NodeId, lifecycle: NodeLifecycle, last_status: Option<StepStatus>) {
        self.live[id.0] = false;
        for edge in self.nodes[id.0].output_edges() {
            if let Some(edge) = self.edges.get_mut(&edge) {
                edge.close();
            }
        }
        for binding in self.nodes[id.0].input_bindings() {
            if let Some(edge) = self.edges.get_mut(&binding.edge) {
                edge.release(binding.cursor);
            }
        }

        let node = &mut self.nodes[id.0];
        if let Some(process) = node.process.as_mut() {
            step::finalize(process.as_mut());
        }
        node.lifecycle = lifecycle;

        NodeRetired {
            node: &node.name,
            lifecycle,
            last_status,
            steps: self.stats[id.0].steps,
        }
        .log();
    }

    /// Fail-fast: the failing node is `Failed`, everyone else `Stopped`.
    fn halt(&mut self, failed: NodeId) {
        PipelineHalted {
            failed_node: &self.nodes[failed.0].name,
            live_nodes: self.live.iter().filter(|live| **live).count(),
        }
        .log();

        self.retire(failed, NodeLifecycle::Failed, Some(StepStatus::Failure));
        for position in 0..self.order.len() {
            let id = self.order[position];
            if self.live[id.0] {
                self.retire(id, NodeLifecycle::Stopped, None);
            }
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.state = if self.failure.is_some() {
            PipelineState::Failed
        } else {
            PipelineState::Stopped
        };
        PipelineFinished {
            scheduler: SCHEDULER,
            state: self.state,
            steps: self.stats.iter().map(|s| s.steps).sum(),
            elapsed: self.started.map(|t| t.elapsed()).unwrap_or_default(),
        }
        .log();
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The first step failure, if any. Cleared when the failing node is
    /// revived or the pipeline reset.
    pub fn failure(&self) -> Option<StepFailure> {
        self.failure.clone()
    }

    /// Ticks taken so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn lifecycle(&self, id: NodeId) -> Option<NodeLifecycle> {
        self.nodes.get(id.0).map(|n| n.lifecycle)
    }

    pub fn stats(&self, id: NodeId) -> Option<&NodeStats> {
        self.stats.get(id.0)
    }

    /// Recent tick reports, oldest first.
    pub fn history(&self) -> Vec<&TickReport> {
        self.history.iter().rev().collect()
    }

    /// Unread values for the slowest consumer of `edge`.
    pub fn backlog(&self, edge: EdgeId) -> Option<usize> {
        self.edges.get(&edge).map(Edge::backlog)
    }

    pub fn resources(&self) -> &Arc<ResourcePool> {
        &self.resources
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            scheduler: SCHEDULER,
            state: self.state,
            failure: self.failure(),
            ticks: Some(self.tick),
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeReport {
                    id: node.id,
                    name: node.name.clone(),
                    kind: node.kind,
                    lifecycle: node.lifecycle,
                    stats: self.stats[node.id.0].clone(),
                })
                .collect(),
        }
    }
}
