// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the data-carrying primitives: ring buffers and edges.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    /// A ring buffer must be able to hold at least one value.
    #[error("ring buffer capacity must be at least 1")]
    ZeroCapacity,

    /// Lookback past the oldest retained value.
    #[error("offset {offset} is out of range for a buffer holding {occupancy} values")]
    OutOfRange { offset: usize, occupancy: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeError {
    /// The producer closed the edge; nothing further will be published.
    #[error("edge is closed")]
    Closed,

    /// The pipeline stop token fired while waiting on the edge.
    #[error("wait on edge was cancelled")]
    Cancelled,
}
