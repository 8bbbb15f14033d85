// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod buffer;     // ring buffer
pub mod config;     // engine settings + process option schemas
pub mod engine;     // sync and async schedulers
pub mod errors;     // error handling
pub mod graph;      // ports, edges, assembly
pub mod observability;
pub mod processes;  // generic utility processes
pub mod resources;  // named resource pool
pub mod traits;     // process contract
pub mod utils;
