// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fixed-capacity lookback storage shared by edges and windowed processes.

mod ring_buffer;

pub use ring_buffer::RingBuffer;
