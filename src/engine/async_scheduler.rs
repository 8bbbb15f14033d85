// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Worker-per-node scheduler on tokio.
//!
//! [`AsyncPipeline::start`] spawns one task per node. A worker waits for one
//! value (or end of input) on every non-deferred input edge and execution
//! dependency, runs the step on the blocking pool with `spawn_blocking`,
//! then publishes its outputs, waiting while an output edge is full. A
//! worker fed only through deferred edges instead waits for any one of them
//! to hold a value, and exits once all of them are closed and drained.
//! Workers suspend only on those edge waits and are woken early by the
//! pipeline's [`CancellationToken`].
//!
//! ## Failure propagation
//!
//! A failing worker records the first failure, closes its output edges (so
//! downstream sees end of input) and exits. Under
//! [`FailurePolicy::FailFast`] it also cancels the token, and every other
//! worker exits at its next suspension point.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::engine::shared_edge::SharedEdge;
use crate::engine::step::{self, OutputPort, StepOutcome};
use crate::engine::{NodeReport, NodeStats, PipelineReport, PipelineState};
use crate::errors::{EdgeError, FailurePolicy, PipelineError, StepFailure};
use crate::graph::{Availability, BuiltPipeline, EdgeId, Node, NodeId, Packet};
use crate::observability::messages::scheduler::{
    NodeRetired, PipelineFinished, PipelineHalted, PipelineReset, PipelineStarted, WorkerStarted,
};
use crate::observability::messages::StructuredLog;
use crate::resources::ResourcePool;
use crate::traits::{NodeLifecycle, Process, StepContext, StepStatus};
use crate::utils::lock;

const SCHEDULER: &str = "async";

type SharedFailure = Arc<Mutex<Option<StepFailure>>>;

type ReadyWait<'a> = Pin<Box<dyn Future<Output = Result<Availability, EdgeError>> + Send + 'a>>;

/// Drives a [`BuiltPipeline`] with one tokio task per node.
///
/// # Examples
/// ```
/// use framegraph::config::ConfigMap;
/// use framegraph::engine::{AsyncPipeline, PipelineState};
/// use framegraph::graph::PipelineGraph;
/// use framegraph::processes::{Collector, VecSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (collector, collected) = Collector::<i64>::new();
/// let mut graph = PipelineGraph::new();
/// let src = graph.add_node("numbers", VecSource::new(vec![1_i64, 2, 3]), ConfigMap::new()).unwrap();
/// let sink = graph.add_node("sink", collector, ConfigMap::new()).unwrap();
/// graph.connect(src.port("out"), sink.port("in"), 1).unwrap();
///
/// let mut pipeline = AsyncPipeline::new(graph.build().unwrap());
/// pipeline.start().unwrap();
/// assert_eq!(pipeline.run_until_drained().await.unwrap(), PipelineState::Stopped);
/// assert_eq!(collected.values(), vec![1, 2, 3]);
/// # }
/// ```
pub struct AsyncPipeline {
    nodes: Vec<Node>,
    edges: BTreeMap<EdgeId, Arc<SharedEdge>>,
    stats: Vec<NodeStats>,
    state: PipelineState,
    policy: FailurePolicy,
    failure: SharedFailure,
    cancel: CancellationToken,
    workers: Vec<(NodeId, JoinHandle<WorkerReport>)>,
    /// Workers that have not exited yet.
    live: Arc<AtomicUsize>,
    started: Option<Instant>,
    resources: Arc<ResourcePool>,
}

impl AsyncPipeline {
    /// Take ownership of a built pipeline. Deferred feedback cycles are
    /// allowed here.
    pub fn new(built: BuiltPipeline) -> Self {
        let BuiltPipeline {
            nodes,
            edges,
            resources,
            ..
        } = built;
        let node_count = nodes.len();

        Self {
            nodes,
            edges: edges
                .into_iter()
                .map(|(id, edge)| (id, Arc::new(SharedEdge::new(edge))))
                .collect(),
            stats: vec![NodeStats::default(); node_count],
            state: PipelineState::Built,
            policy: FailurePolicy::default(),
            failure: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            workers: Vec::new(),
            live: Arc::new(AtomicUsize::new(0)),
            started: None,
            resources,
        }
    }

    pub fn from_config(built: BuiltPipeline, config: &EngineConfig) -> Self {
        Self::new(built).with_policy(config.failure_policy)
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawn one worker per node on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Built {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PipelineError::Runtime(format!("no tokio runtime: {}", e)))?;

        PipelineStarted {
            scheduler: SCHEDULER,
            nodes: self.nodes.len(),
            policy: self.policy,
        }
        .log();

        self.live.store(self.nodes.len(), Ordering::SeqCst);
        let mut workers = Vec::with_capacity(self.nodes.len());
        for index in 0..self.nodes.len() {
            let worker = self.worker_for(index)?;
            let span = WorkerStarted {
                node: &worker.name,
                kind: worker.kind,
            }
            .span("worker");
            workers.push((worker.id, runtime.spawn(worker.run().instrument(span))));
        }

        self.workers = workers;
        self.started = Some(Instant::now());
        self.state = PipelineState::Running;
        Ok(())
    }

    fn worker_for(&mut self, index: usize) -> Result<Worker, PipelineError> {
        let outputs = Arc::new(step::output_ports(&self.nodes[index]));
        let node = &mut self.nodes[index];
        let process = node.process.take().ok_or_else(|| {
            PipelineError::Runtime(format!("node '{}' has no process to run", node.name))
        })?;

        let mut inputs = Vec::new();
        for (port, binding) in node.ports.inputs().iter().zip(node.inputs.iter()) {
            let Some(binding) = binding else {
                continue;
            };
            if let Some(edge) = self.edges.get(&binding.edge) {
                inputs.push(WorkerInput {
                    port: Some(port.name.clone()),
                    edge: edge.clone(),
                    cursor: binding.cursor,
                    deferred: binding.deferred,
                });
            }
        }
        for binding in &node.after {
            if let Some(edge) = self.edges.get(&binding.edge) {
                inputs.push(WorkerInput {
                    port: None,
                    edge: edge.clone(),
                    cursor: binding.cursor,
                    deferred: false,
                });
            }
        }

        let output_edges = node
            .output_edges()
            .filter_map(|id| self.edges.get(&id).map(|edge| (id, edge.clone())))
            .collect();

        node.lifecycle = NodeLifecycle::Running;
        Ok(Worker {
            id: node.id,
            name: node.name.clone(),
            kind: node.kind,
            process,
            inputs,
            outputs,
            output_edges,
            trigger: node.trigger,
            resources: self.resources.clone(),
            cancel: self.cancel.clone(),
            policy: self.policy,
            failure: self.failure.clone(),
            live: self.live.clone(),
        })
    }

    /// Join every worker and settle the terminal state.
    pub async fn run_until_drained(&mut self) -> Result<PipelineState, PipelineError> {
        match self.state {
            PipelineState::Running | PipelineState::Draining => {}
            state if state.is_terminal() => return Ok(state),
            state => {
                return Err(PipelineError::InvalidTransition {
                    from: state,
                    action: "drain",
                })
            }
        }

        for (id, handle) in std::mem::take(&mut self.workers) {
            match handle.await {
                Ok(report) => {
                    let node = &mut self.nodes[id.0];
                    node.process = report.process;
                    node.lifecycle = report.lifecycle;
                    self.stats[id.0] = report.stats;
                }
                Err(join_error) => {
                    let node = &mut self.nodes[id.0];
                    node.lifecycle = NodeLifecycle::Failed;
                    record_failure(
                        &self.failure,
                        id,
                        &node.name,
                        format!("worker task aborted: {}", join_error),
                    );
                }
            }
        }

        self.state = if lock(&self.failure).is_some() {
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
        Ok(self.state)
    }

    /// Broadcast cancellation, then join every worker.
    pub async fn stop(&mut self) -> Result<PipelineState, PipelineError> {
        match self.state {
            PipelineState::Running => {
                self.state = PipelineState::Draining;
                self.cancel.cancel();
                self.run_until_drained().await
            }
            PipelineState::Draining => self.run_until_drained().await,
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
    /// process refuses, nothing else changes and the call can be retried.
    pub fn reset(&mut self) -> Result<(), PipelineError> {
        if !self.state.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                action: "reset",
            });
        }
        let mut refused = None;
        for node in self.nodes.iter_mut() {
            let accepted = node
                .process
                .as_mut()
                .map(|process| step::reset(process.as_mut()))
                .unwrap_or(false);
            if !accepted && refused.is_none() {
                refused = Some(node.name.clone());
            }
        }
        if let Some(node) = refused {
            return Err(PipelineError::ResetRefused { node });
        }

        for node in self.nodes.iter_mut() {
            node.lifecycle = NodeLifecycle::Initialized;
        }
        self.edges.values().for_each(|edge| edge.reset());
        self.stats.iter_mut().for_each(|s| *s = NodeStats::default());
        self.resources.clear_values();
        *lock(&self.failure) = None;
        self.cancel = CancellationToken::new();
        self.started = None;
        self.state = PipelineState::Built;

        PipelineReset {
            nodes: self.nodes.len(),
        }
        .log();
        Ok(())
    }

    /// State as of the last start/join; workers may have finished since.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The first step failure, visible as soon as a worker records it.
    pub fn failure(&self) -> Option<StepFailure> {
        lock(&self.failure).clone()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn lifecycle(&self, id: NodeId) -> Option<NodeLifecycle> {
        self.nodes.get(id.0).map(|n| n.lifecycle)
    }

    /// Counters as of the last join.
    pub fn stats(&self, id: NodeId) -> Option<&NodeStats> {
        self.stats.get(id.0)
    }

    pub fn backlog(&self, edge: EdgeId) -> Option<usize> {
        self.edges.get(&edge).map(|e| e.backlog())
    }

    pub fn resources(&self) -> &Arc<ResourcePool> {
        &self.resources
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            scheduler: SCHEDULER,
            state: self.state,
            failure: self.failure(),
            ticks: None,
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

impl Drop for AsyncPipeline {
    fn drop(&mut self) {
        // Detached workers must not outlive their pipeline.
        self.cancel.cancel();
    }
}

fn record_failure(failure: &SharedFailure, node: NodeId, name: &str, cause: String) -> bool {
    let mut slot = lock(failure);
    if slot.is_some() {
        return false;
    }
    *slot = Some(StepFailure {
        node,
        node_name: name.to_string(),
        status: StepStatus::Failure,
        cause,
    });
    true
}

struct WorkerInput {
    /// `None` for an execution dependency; its values are discarded.
    port: Option<String>,
    edge: Arc<SharedEdge>,
    cursor: usize,
    deferred: bool,
}

enum Gathered {
    Ready(HashMap<String, Packet>),
    Exhausted,
    Cancelled,
}

struct WorkerReport {
    process: Option<Box<dyn Process>>,
    lifecycle: NodeLifecycle,
    stats: NodeStats,
}

struct Worker {
    id: NodeId,
    name: String,
    kind: &'static str,
    process: Box<dyn Process>,
    inputs: Vec<WorkerInput>,
    outputs: Arc<Vec<OutputPort>>,
    output_edges: HashMap<EdgeId, Arc<SharedEdge>>,
    trigger: Option<EdgeId>,
    resources: Arc<ResourcePool>,
    cancel: CancellationToken,
    policy: FailurePolicy,
    failure: SharedFailure,
    live: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self) -> WorkerReport {
        WorkerStarted {
            node: &self.name,
            kind: self.kind,
        }
        .log();

        let Worker {
            id,
            name,
            process,
            inputs,
            outputs,
            output_edges,
            trigger,
            resources,
            cancel,
            policy,
            failure,
            live,
            ..
        } = self;

        let mut stats = NodeStats::default();
        let mut process = Some(process);

        let (lifecycle, last_status) = 'steps: loop {
            if cancel.is_cancelled() {
                break (NodeLifecycle::Stopped, None);
            }
            let values = match gather(&inputs, &cancel).await {
                Gathered::Ready(values) => values,
                Gathered::Exhausted | Gathered::Cancelled => break (NodeLifecycle::Stopped, None),
            };
            let Some(mut current) = process.take() else {
                break (NodeLifecycle::Failed, None);
            };

            let mut ctx = StepContext::new(name.clone(), stats.steps, values, resources.clone());
            let ports = outputs.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let outcome = step::execute(current.as_mut(), &mut ctx, &ports);
                (current, outcome)
            })
            .await;

            let outcome = match joined {
                Ok((returned, outcome)) => {
                    process = Some(returned);
                    outcome
                }
                Err(join_error) => StepOutcome {
                    status: StepStatus::Failure,
                    publish: Vec::new(),
                    cause: Some(format!("step task aborted: {}", join_error)),
                    elapsed: Duration::ZERO,
                },
            };
            stats.record(outcome.status, outcome.elapsed);

            match outcome.status {
                StepStatus::Success => {
                    let signal = trigger.map(|edge| (edge, Arc::new(()) as Packet));
                    for (edge_id, packet) in outcome.publish.into_iter().chain(signal) {
                        let Some(edge) = output_edges.get(&edge_id) else {
                            continue;
                        };
                        match edge.publish(packet, &cancel).await {
                            Ok(()) | Err(EdgeError::Closed) => {}
                            Err(EdgeError::Cancelled) => break 'steps (NodeLifecycle::Stopped, None),
                        }
                    }
                }
                StepStatus::NoOutput | StepStatus::Skip => {}
                StepStatus::EndOfInput => {
                    break (NodeLifecycle::Stopped, Some(StepStatus::EndOfInput));
                }
                StepStatus::Failure => {
                    let cause = outcome.cause.unwrap_or_default();
                    let first = record_failure(&failure, id, &name, cause);
                    if policy == FailurePolicy::FailFast && first {
                        PipelineHalted {
                            failed_node: &name,
                            live_nodes: live.load(Ordering::SeqCst),
                        }
                        .log();
                        cancel.cancel();
                    }
                    break (NodeLifecycle::Failed, Some(StepStatus::Failure));
                }
            }
        };

        for edge in output_edges.values() {
            edge.close();
        }
        for input in &inputs {
            input.edge.release(input.cursor);
        }
        if let Some(current) = process.as_mut() {
            step::finalize(current.as_mut());
        }
        live.fetch_sub(1, Ordering::SeqCst);
        NodeRetired {
            node: &name,
            lifecycle,
            last_status,
            steps: stats.steps,
        }
        .log();

        WorkerReport {
            process,
            lifecycle,
            stats,
        }
    }
}

/// One value (or end of input) from every non-deferred input, then whatever
/// the deferred inputs already hold.
async fn gather(inputs: &[WorkerInput], cancel: &CancellationToken) -> Gathered {
    if !inputs.is_empty() && inputs.iter().all(|input| input.deferred) {
        return gather_deferred(inputs, cancel).await;
    }

    let mut values = HashMap::new();
    let mut blocking = 0;
    let mut received = false;
    for input in inputs.iter().filter(|input| !input.deferred) {
        blocking += 1;
        match input.edge.consume(input.cursor, cancel).await {
            Ok(Some(packet)) => {
                received = true;
                if let Some(port) = &input.port {
                    values.insert(port.clone(), packet);
                }
            }
            Ok(None) => {}
            Err(_) => return Gathered::Cancelled,
        }
    }
    if blocking > 0 && !received {
        return Gathered::Exhausted;
    }

    for input in inputs.iter().filter(|input| input.deferred) {
        if let (Some(port), Some(packet)) = (&input.port, input.edge.take(input.cursor)) {
            values.insert(port.clone(), packet);
        }
    }
    Gathered::Ready(values)
}

/// Whatever the deferred inputs hold, once at least one holds something.
async fn gather_deferred(inputs: &[WorkerInput], cancel: &CancellationToken) -> Gathered {
    loop {
        let mut values = HashMap::new();
        let mut pending = Vec::new();
        for input in inputs {
            match input.edge.availability(input.cursor) {
                Availability::Ready => {
                    if let (Some(port), Some(packet)) = (&input.port, input.edge.take(input.cursor)) {
                        values.insert(port.clone(), packet);
                    }
                }
                Availability::Pending => pending.push(input),
                Availability::Closed => {}
            }
        }
        if !values.is_empty() {
            return Gathered::Ready(values);
        }
        if pending.is_empty() {
            return Gathered::Exhausted;
        }
        if wait_any(&pending, cancel).await.is_err() {
            return Gathered::Cancelled;
        }
    }
}

/// Resolve as soon as one of `inputs` has a value or closes.
async fn wait_any<'a>(
    inputs: &[&'a WorkerInput],
    cancel: &'a CancellationToken,
) -> Result<Availability, EdgeError> {
    let mut waits: Vec<ReadyWait<'a>> = inputs
        .iter()
        .map(|&input| Box::pin(input.edge.wait_ready(input.cursor, cancel)) as ReadyWait<'a>)
        .collect();
    std::future::poll_fn(|cx| {
        for wait in waits.iter_mut() {
            if let Poll::Ready(result) = wait.as_mut().poll(cx) {
                return Poll::Ready(result);
            }
        }
        Poll::Pending
    })
    .await
}
