// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler lifecycle and per-node step events.
//!
//! This module contains message types for logging events related to:
//! * Pipeline start, halt, stall and completion
//! * Node retirement (end of input, failure, cancellation)
//! * Step failures as reported by a process or caught from a panic

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::engine::PipelineState;
use crate::errors::FailurePolicy;
use crate::observability::messages::StructuredLog;
use crate::traits::{NodeLifecycle, StepStatus};

/// A scheduler took over a built pipeline.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use framegraph::observability::messages::scheduler::PipelineStarted;
/// use framegraph::errors::FailurePolicy;
///
/// let msg = PipelineStarted {
///     scheduler: "sync",
///     nodes: 4,
///     policy: FailurePolicy::FailFast,
/// };
///
/// assert_eq!(msg.to_string(), "Starting sync pipeline: 4 nodes, policy=FailFast");
/// ```
pub struct PipelineStarted<'a> {
    pub scheduler: &'a str,
    pub nodes: usize,
    pub policy: FailurePolicy,
}

impl Display for PipelineStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting {} pipeline: {} nodes, policy={:?}",
            self.scheduler, self.nodes, self.policy
        )
    }
}

impl StructuredLog for PipelineStarted<'_> {
    fn log(&self) {
        tracing::info!(
            scheduler = self.scheduler,
            nodes = self.nodes,
            policy = ?self.policy,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            scheduler = self.scheduler,
            nodes = self.nodes,
        )
    }
}

/// An async worker began driving one node.
///
/// # Log Level
/// `debug!` - Worker detail
pub struct WorkerStarted<'a> {
    pub node: &'a str,
    pub kind: &'a str,
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker for node '{}' ({}) started", self.node, self.kind)
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::debug!(node = self.node, kind = self.kind, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node", span_name = name, node = self.node, kind = self.kind)
    }
}

/// A step reported `Failure`, broke its output contract, or panicked.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct StepFailed<'a> {
    pub node: &'a str,
    pub tick: u64,
    pub cause: &'a str,
}

impl Display for StepFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed at step {}: {}",
            self.node, self.tick, self.cause
        )
    }
}

impl StructuredLog for StepFailed<'_> {
    fn log(&self) {
        tracing::error!(node = self.node, tick = self.tick, cause = self.cause, "{}", self);
    }
}

/// A node left the schedule and closed its output edges.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct NodeRetired<'a> {
    pub node: &'a str,
    pub lifecycle: NodeLifecycle,
    pub last_status: Option<StepStatus>,
    pub steps: u64,
}

impl Display for NodeRetired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' retired as {:?} after {} steps",
            self.node, self.lifecycle, self.steps
        )?;
        if let Some(status) = self.last_status {
            write!(f, " (last status {:?})", status)?;
        }
        Ok(())
    }
}

impl StructuredLog for NodeRetired<'_> {
    fn log(&self) {
        tracing::debug!(
            node = self.node,
            lifecycle = ?self.lifecycle,
            steps = self.steps,
            "{}", self
        );
    }
}

/// Fail-fast policy stopped every node after a failure.
///
/// # Log Level
/// `warn!` - Pipeline stopped early
pub struct PipelineHalted<'a> {
    pub failed_node: &'a str,
    pub live_nodes: usize,
}

impl Display for PipelineHalted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Halting pipeline after failure in '{}': stopping {} live nodes",
            self.failed_node, self.live_nodes
        )
    }
}

impl StructuredLog for PipelineHalted<'_> {
    fn log(&self) {
        tracing::warn!(
            failed_node = self.failed_node,
            live_nodes = self.live_nodes,
            "{}", self
        );
    }
}

/// A sync tick made no progress.
///
/// # Log Level
/// `warn!` - The graph cannot advance on its own
pub struct PipelineStalled {
    pub tick: u64,
    pub waiting: usize,
}

impl Display for PipelineStalled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline stalled at tick {}: {} nodes waiting, none ready",
            self.tick, self.waiting
        )
    }
}

impl StructuredLog for PipelineStalled {
    fn log(&self) {
        tracing::warn!(tick = self.tick, waiting = self.waiting, "{}", self);
    }
}

/// The pipeline reached a terminal state.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineFinished<'a> {
    pub scheduler: &'a str,
    pub state: PipelineState,
    pub steps: u64,
    pub elapsed: Duration,
}

impl Display for PipelineFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} pipeline finished as {:?}: {} steps in {:?}",
            self.scheduler, self.state, self.steps, self.elapsed
        )
    }
}

impl StructuredLog for PipelineFinished<'_> {
    fn log(&self) {
        tracing::info!(
            scheduler = self.scheduler,
            state = ?self.state,
            steps = self.steps,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }
}

/// Every process was reset and the pipeline can be started again.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineReset {
    pub nodes: usize,
}

impl Display for PipelineReset {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline reset: {} nodes back to initialized", self.nodes)
    }
}

impl StructuredLog for PipelineReset {
    fn log(&self) {
        tracing::info!(nodes = self.nodes, "{}", self);
    }
}

/// Part of a running pipeline was reset so it can step again.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BranchReset<'a> {
    pub root: &'a str,
    pub nodes: usize,
}

impl Display for BranchReset<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Reset '{}' and {} downstream nodes", self.root, self.nodes.saturating_sub(1))
    }
}

impl StructuredLog for BranchReset<'_> {
    fn log(&self) {
        tracing::info!(root = self.root, nodes = self.nodes, "{}", self);
    }
}

/// A node accepted new options.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeReconfigured<'a> {
    pub node: &'a str,
    pub options: usize,
}

impl Display for NodeReconfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' reconfigured: {} options changed", self.node, self.options)
    }
}

impl StructuredLog for NodeReconfigured<'_> {
    fn log(&self) {
        tracing::info!(node = self.node, options = self.options, "{}", self);
    }
}
