// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types live under [`messages`], organized by subsystem, and are
//! emitted through `tracing`. The library never installs a subscriber on its
//! own; binaries and tests call [`init_tracing`] once at startup.
//!
//! # Usage
//!
//! ```rust
//! use framegraph::observability::messages::scheduler::PipelineStalled;
//! use framegraph::observability::messages::StructuredLog;
//!
//! let _ = framegraph::observability::init_tracing("warn");
//! PipelineStalled { tick: 3, waiting: 2 }.log();
//! ```

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

pub mod messages;

/// Install a `fmt` subscriber. `RUST_LOG` wins over `default_filter` when set.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .try_init()
}
