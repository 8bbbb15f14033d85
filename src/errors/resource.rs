// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors reported by the [`ResourcePool`](crate::resources::ResourcePool).
///
/// None of these are fatal to a pipeline; the caller decides what to do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource '{name}' is not in the pool")]
    Missing { name: String },

    #[error("resource '{name}' does not hold a value of type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// A subscriber of `name` tried to write `name` while being notified.
    #[error("re-entrant write to resource '{name}' from one of its own subscribers")]
    ReentrantWrite { name: String },
}
