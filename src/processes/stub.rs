// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processes with scripted behavior, for exercising scheduler paths that
//! well-behaved processes never reach.

use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};

/// One scripted step of a [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Emit(i64),
    NoOutput,
    Skip,
    Fail(String),
    End,
}

/// Source that plays back a fixed script, then reports end of input.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Vec<ScriptStep>,
    position: usize,
    finalized: bool,
}

impl ScriptedSource {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            position: 0,
            finalized: false,
        }
    }

    /// Emit every value in order.
    pub fn emitting(values: impl IntoIterator<Item = i64>) -> Self {
        Self::new(values.into_iter().map(ScriptStep::Emit).collect())
    }
}

impl Process for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted_source"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().output::<i64>("out")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let Some(next) = self.script.get(self.position).cloned() else {
            return StepStatus::EndOfInput;
        };
        self.position += 1;
        match next {
            ScriptStep::Emit(value) => {
                ctx.output("out", value);
                StepStatus::Success
            }
            ScriptStep::NoOutput => StepStatus::NoOutput,
            ScriptStep::Skip => StepStatus::Skip,
            ScriptStep::Fail(cause) => ctx.fail(cause),
            ScriptStep::End => StepStatus::EndOfInput,
        }
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }

    fn reset(&mut self) -> bool {
        self.position = 0;
        self.finalized = false;
        true
    }
}

/// Forwards `i64` values and panics when it sees `trigger`.
#[derive(Debug)]
pub struct PanickingProcess {
    trigger: i64,
}

impl PanickingProcess {
    pub fn on(trigger: i64) -> Self {
        Self { trigger }
    }
}

impl Process for PanickingProcess {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().input::<i64>("in").output::<i64>("out")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let Some(value) = ctx.input::<i64>("in").copied() else {
            return StepStatus::NoOutput;
        };
        if value == self.trigger {
            panic!("refusing value {}", value);
        }
        ctx.output("out", value);
        StepStatus::Success
    }

    fn reset(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourcePool;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_script_plays_back_in_order() {
        let mut source = ScriptedSource::new(vec![
            ScriptStep::Emit(1),
            ScriptStep::Skip,
            ScriptStep::Fail("lens cap on".to_string()),
        ]);
        let pool = Arc::new(ResourcePool::new());
        let mut statuses = Vec::new();
        for tick in 0..4 {
            let mut ctx = StepContext::new("s", tick, HashMap::new(), pool.clone());
            statuses.push(source.step(&mut ctx));
        }

        assert_eq!(
            statuses,
            vec![
                StepStatus::Success,
                StepStatus::Skip,
                StepStatus::Failure,
                StepStatus::EndOfInput
            ]
        );
    }

    #[test]
    fn test_finalize_and_reset() {
        let mut source = ScriptedSource::emitting([1, 2]);
        source.finalize();
        assert!(source.finalized);
        assert!(source.reset());
        assert!(!source.finalized);
        assert!(!PanickingProcess::on(0).reset());
    }
}
