// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for pipeline assembly and build-time validation.

use thiserror::Error;

use crate::errors::ConfigError;
use crate::graph::{EdgeId, PortDirection};

/// Errors that can occur while assembling or building a pipeline graph.
///
/// Every variant is fatal to the build: a graph that produced one of these
/// never reaches a scheduler.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("no node named '{0}' in the pipeline")]
    UnknownNode(String),

    #[error("node '{node}' has no {direction} port named '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: PortDirection,
    },

    #[error("edge {0:?} does not exist")]
    UnknownEdge(EdgeId),

    #[error("duplicate node name: '{0}'")]
    DuplicateNodeName(String),

    /// Producer and consumer disagree on the value type carried by the edge.
    #[error("cannot connect {from} ({output_type}) to {to} ({input_type}): port types differ")]
    PortTypeMismatch {
        from: String,
        to: String,
        output_type: &'static str,
        input_type: &'static str,
    },

    #[error("input port {node}.{port} is already connected")]
    InputAlreadyConnected { node: String, port: String },

    #[error("edge capacity must be at least 1, got {capacity}")]
    InvalidCapacity { capacity: usize },

    /// A second consumer joined a fan-out edge with a different capacity or
    /// deferral than the edge already has.
    #[error("output {node}.{port} already feeds an edge that differs: {reason}")]
    FanOutMismatch {
        node: String,
        port: String,
        reason: String,
    },

    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A required input port has no upstream edge.
    #[error("required input port {node}.{port} is not connected")]
    DisconnectedPort { node: String, port: String },

    #[error("node '{node}' failed to initialize: {source}")]
    Configuration {
        node: String,
        #[source]
        source: ConfigError,
    },
}
