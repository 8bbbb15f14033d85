// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod graph;
mod pipeline;
mod resource;
mod transport;

pub use config::ConfigError;
pub use graph::GraphError;
pub use pipeline::{FailurePolicy, PipelineError, StepFailure};
pub use resource::ResourceError;
pub use transport::{EdgeError, RingBufferError};
