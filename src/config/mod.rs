// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod schema;

pub mod consts;

pub use loader::{
    load_engine_config, EdgeOptions, EngineConfig, LoggingConfig, SchedulerKind,
};
pub use schema::{ConfigKind, ConfigMap, ConfigSchema, ConfigValue, OptionSpec};
