// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

use serde::Serialize;

use crate::errors::StepFailure;
use crate::graph::NodeId;
use crate::traits::{NodeLifecycle, StepStatus};

/// Lifecycle of a whole pipeline.
///
/// `Built -> Running -> Draining -> Stopped | Failed`. `Draining` is entered
/// by `stop()` while nodes are being finalized or workers joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Built,
    Running,
    Draining,
    Stopped,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Failed)
    }
}

/// Per-node step counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStats {
    pub steps: u64,
    pub success: u64,
    pub no_output: u64,
    pub skip: u64,
    pub failure: u64,
    pub end_of_input: u64,
    /// Time spent inside `step()`.
    pub busy: Duration,
}

impl NodeStats {
    pub fn record(&mut self, status: StepStatus, elapsed: Duration) {
        self.steps += 1;
        self.busy += elapsed;
        match status {
            StepStatus::Success => self.success += 1,
            StepStatus::NoOutput => self.no_output += 1,
            StepStatus::Skip => self.skip += 1,
            StepStatus::Failure => self.failure += 1,
            StepStatus::EndOfInput => self.end_of_input += 1,
        }
    }
}

/// One node step within a sync tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub node: NodeId,
    pub status: StepStatus,
}

/// What a single `advance()` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Steps in the order they ran.
    pub steps: Vec<StepRecord>,
    /// Nodes that left the schedule during this tick, in order.
    pub retired: Vec<NodeId>,
}

impl TickReport {
    pub(crate) fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn made_progress(&self) -> bool {
        !self.steps.is_empty() || !self.retired.is_empty()
    }

    pub fn status_of(&self, node: NodeId) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.node == node)
            .map(|record| record.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub lifecycle: NodeLifecycle,
    pub stats: NodeStats,
}

/// Serializable summary of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub scheduler: &'static str,
    pub state: PipelineState,
    pub failure: Option<StepFailure>,
    /// Sync only: number of `advance()` calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u64>,
    pub nodes: Vec<NodeReport>,
}

impl PipelineReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn total_steps(&self) -> u64 {
        self.nodes.iter().map(|n| n.stats.steps).sum()
    }
}
