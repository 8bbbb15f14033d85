// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline assembly and build-time events.

use std::fmt::{Display, Formatter};

use crate::observability::messages::StructuredLog;

/// A process instance was added to the graph.
///
/// # Log Level
/// `debug!` - Assembly detail
pub struct NodeAdded<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub inputs: usize,
    pub outputs: usize,
}

impl Display for NodeAdded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' added: kind={}, inputs={}, outputs={}",
            self.name, self.kind, self.inputs, self.outputs
        )
    }
}

impl StructuredLog for NodeAdded<'_> {
    fn log(&self) {
        tracing::debug!(node = self.name, kind = self.kind, "{}", self);
    }
}

/// Two ports were connected.
///
/// # Log Level
/// `debug!` - Assembly detail
pub struct EdgeConnected<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub capacity: usize,
    pub deferred: bool,
}

impl Display for EdgeConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let kind = if self.deferred { "deferred edge" } else { "edge" };
        write!(
            f,
            "Connected {} -> {} ({}, capacity={})",
            self.from, self.to, kind, self.capacity
        )
    }
}

impl StructuredLog for EdgeConnected<'_> {
    fn log(&self) {
        tracing::debug!(
            from = self.from,
            to = self.to,
            capacity = self.capacity,
            deferred = self.deferred,
            "{}", self
        );
    }
}

/// One node was made to run after another.
///
/// # Log Level
/// `debug!` - Assembly detail
pub struct DependencyAdded<'a> {
    pub before: &'a str,
    pub after: &'a str,
    pub optional: bool,
}

impl Display for DependencyAdded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let kind = if self.optional { "optional" } else { "required" };
        write!(f, "'{}' runs after '{}' ({})", self.after, self.before, kind)
    }
}

impl StructuredLog for DependencyAdded<'_> {
    fn log(&self) {
        tracing::debug!(
            before = self.before,
            after = self.after,
            optional = self.optional,
            "{}", self
        );
    }
}

/// An edge and all of its consumers were removed.
///
/// # Log Level
/// `debug!` - Assembly detail
pub struct EdgeRemoved {
    pub edge: usize,
    pub consumers: usize,
}

impl Display for EdgeRemoved {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Edge {} removed ({} consumers detached)",
            self.edge, self.consumers
        )
    }
}

impl StructuredLog for EdgeRemoved {
    fn log(&self) {
        tracing::debug!(edge = self.edge, consumers = self.consumers, "{}", self);
    }
}

/// The graph validated and every node initialized.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineBuilt {
    pub nodes: usize,
    pub edges: usize,
    pub feedback: bool,
}

impl Display for PipelineBuilt {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline built: {} nodes, {} edges", self.nodes, self.edges)?;
        if self.feedback {
            write!(f, " (with deferred feedback)")?;
        }
        Ok(())
    }
}

impl StructuredLog for PipelineBuilt {
    fn log(&self) {
        tracing::info!(
            nodes = self.nodes,
            edges = self.edges,
            feedback = self.feedback,
            "{}", self
        );
    }
}

/// A node's configuration or `initialize()` was rejected.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct NodeInitializationFailed<'a> {
    pub node: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeInitializationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' failed to initialize: {}", self.node, self.error)
    }
}

impl StructuredLog for NodeInitializationFailed<'_> {
    fn log(&self) {
        tracing::error!(node = self.node, error = %self.error, "{}", self);
    }
}
