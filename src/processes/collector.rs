// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::config::{ConfigMap, ConfigSchema, OptionSpec};
use crate::errors::ConfigError;
use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};
use crate::utils::lock;

/// Sink that appends every value it receives to a shared list.
///
/// Options:
/// * `publish_as` - if non-empty, also `put` the latest value into the
///   resource pool under this name
pub struct Collector<T> {
    values: Arc<Mutex<Vec<T>>>,
    publish_as: Option<String>,
}

/// Read side of a [`Collector`], kept by the driver after the collector is
/// moved into the graph.
pub struct CollectorHandle<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CollectorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
        }
    }
}

impl<T: Clone> CollectorHandle<T> {
    /// Snapshot of everything collected so far. Values survive a pipeline
    /// reset; call [`CollectorHandle::clear`] to drop them.
    pub fn values(&self) -> Vec<T> {
        lock(&self.values).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.values).clear();
    }
}

impl<T> Collector<T> {
    pub fn new() -> (Self, CollectorHandle<T>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                values: values.clone(),
                publish_as: None,
            },
            CollectorHandle { values },
        )
    }
}

impl<T: Any + Clone + Send + Sync> Process for Collector<T> {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().input::<T>("in")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().option(
            OptionSpec::string("publish_as", "resource name for the latest value").default(""),
        )
    }

    fn initialize(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        self.publish_as = config
            .get_str("publish_as")
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let Some(value) = ctx.input::<T>("in").cloned() else {
            return StepStatus::NoOutput;
        };
        if let Some(name) = &self.publish_as {
            if let Err(e) = ctx.resources().put(name, value.clone()) {
                return ctx.fail(e.to_string());
            }
        }
        lock(&self.values).push(value);
        StepStatus::Success
    }
}
