// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::buffer::RingBuffer;
use crate::config::{ConfigMap, ConfigSchema, OptionSpec};
use crate::errors::ConfigError;
use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};

/// Difference between the current value and the one `span` steps back.
///
/// Returns `NoOutput` until the window holds `span + 1` values. This is the
/// shape of a frame-differencing stage, reduced to integers.
///
/// Options:
/// * `span` - lookback distance, 1 to 256 (default 1)
#[derive(Debug, Default)]
pub struct SlidingDifference {
    window: Option<RingBuffer<i64>>,
    span: usize,
}

impl SlidingDifference {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Process for SlidingDifference {
    fn name(&self) -> &'static str {
        "sliding_difference"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().input::<i64>("in").output::<i64>("out")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().option(
            OptionSpec::int("span", "how many steps back to compare against")
                .default(1_i64)
                .range(1.0, 256.0),
        )
    }

    fn initialize(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        self.span = config.get_int("span").unwrap_or(1) as usize;
        let window = RingBuffer::new(self.span + 1).map_err(|e| ConfigError::Rejected {
            reason: e.to_string(),
        })?;
        self.window = Some(window);
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let Some(value) = ctx.input::<i64>("in").copied() else {
            return StepStatus::NoOutput;
        };
        let Some(window) = self.window.as_mut() else {
            return ctx.fail("sliding window used before initialize");
        };

        window.push(value);
        if !window.is_full() {
            return StepStatus::NoOutput;
        }
        match window.at(self.span) {
            Ok(oldest) => {
                let difference = value - *oldest;
                ctx.output("out", difference);
                StepStatus::Success
            }
            Err(e) => ctx.fail(e.to_string()),
        }
    }

    fn reset(&mut self) -> bool {
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        true
    }
}
