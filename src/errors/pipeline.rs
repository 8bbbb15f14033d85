// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::PipelineState;
use crate::errors::GraphError;
use crate::graph::NodeId;
use crate::traits::StepStatus;

/// How a scheduler reacts when a node's step returns `Failure`.
///
/// # Variants
/// * `FailFast` - halt the whole pipeline on the first failure (default)
/// * `ContinueOnError` - retire only the failing node; downstream nodes see
///   end of input on its edges and the rest of the pipeline keeps running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    ContinueOnError,
}

/// A node-local step failure, as surfaced to the driver.
///
/// Carries the identity of the failing node and the cause it reported (or
/// the panic message if the step unwound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub node: NodeId,
    pub node_name: String,
    pub status: StepStatus,
    pub cause: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node '{}' ({}) reported {:?}: {}",
            self.node_name, self.node, self.status, self.cause
        )
    }
}

impl std::error::Error for StepFailure {}

/// Errors returned by the pipeline driver interface.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// `advance()` or a similar call on a pipeline that is not running.
    #[error("pipeline is not running (state: {state:?})")]
    NotRunning { state: PipelineState },

    #[error("cannot {action} a pipeline in state {from:?}")]
    InvalidTransition {
        from: PipelineState,
        action: &'static str,
    },

    /// A sync tick where no node could step or retire. The graph can make no
    /// further progress without outside intervention.
    #[error("pipeline stalled at tick {tick}: no node is ready")]
    Stalled { tick: u64 },

    /// `reset()` was refused by a process.
    #[error("node '{node}' refused to reset")]
    ResetRefused { node: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("runtime error: {0}")]
    Runtime(String),
}
