// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;

use crate::config::{ConfigMap, ConfigSchema, OptionSpec};
use crate::errors::ConfigError;
use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};

/// Source that emits the values it was built with, one per step, then
/// reports end of input.
///
/// Options:
/// * `limit` - stop after this many values; `0` emits them all
pub struct VecSource<T> {
    values: Vec<T>,
    position: usize,
    limit: usize,
}

impl<T> VecSource<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            position: 0,
            limit: 0,
        }
    }

    /// Values emitted so far.
    pub fn emitted(&self) -> usize {
        self.position
    }

    fn exhausted(&self) -> bool {
        self.position >= self.values.len() || (self.limit > 0 && self.position >= self.limit)
    }
}

impl<T: Any + Clone + Send + Sync> Process for VecSource<T> {
    fn name(&self) -> &'static str {
        "vec_source"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().output::<T>("out")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().option(
            OptionSpec::int("limit", "maximum number of values to emit, 0 for all")
                .default(0_i64)
                .range(0.0, u32::MAX as f64),
        )
    }

    fn initialize(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        self.limit = config.get_int("limit").unwrap_or(0) as usize;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        if self.exhausted() {
            return StepStatus::EndOfInput;
        }
        ctx.output("out", self.values[self.position].clone());
        self.position += 1;
        StepStatus::Success
    }

    fn reset(&mut self) -> bool {
        self.position = 0;
        true
    }
}
