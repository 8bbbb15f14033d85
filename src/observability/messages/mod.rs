// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message is a small struct with a `Display` implementation for the
//! human-readable text and a [`StructuredLog`] implementation that emits it
//! at the right level with its fields attached. Call sites build the struct
//! and call `.log()`; no log text is written inline elsewhere in the crate.
//!
//! # Organization
//!
//! * `graph` - pipeline assembly, validation and initialization
//! * `scheduler` - pipeline lifecycle and per-node step events
//! * `resource` - resource pool writes and notifications
//!
//! # Usage Pattern
//!
//! ```rust
//! use framegraph::observability::messages::graph::PipelineBuilt;
//! use framegraph::observability::messages::StructuredLog;
//!
//! let msg = PipelineBuilt {
//!     nodes: 3,
//!     edges: 2,
//!     feedback: false,
//! };
//!
//! msg.log();
//! assert_eq!(msg.to_string(), "Pipeline built: 3 nodes, 2 edges");
//! ```

use std::fmt::Display;

use tracing::Span;

pub mod graph;
pub mod resource;
pub mod scheduler;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog: Display {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// A span carrying the message's fields, for work done under it.
    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("framegraph", span_name = name, message = %self)
    }
}
