// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};

/// Adds whichever of `left` and `right` arrived this step.
///
/// Once one side reaches end of input the other keeps flowing through on
/// its own.
#[derive(Debug, Default)]
pub struct SumInputs;

impl SumInputs {
    pub fn new() -> Self {
        Self
    }
}

impl Process for SumInputs {
    fn name(&self) -> &'static str {
        "sum_inputs"
    }

    fn ports(&self) -> PortSet {
        PortSet::new()
            .input::<i64>("left")
            .input::<i64>("right")
            .output::<i64>("sum")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let left = ctx.input::<i64>("left").copied();
        let right = ctx.input::<i64>("right").copied();
        if left.is_none() && right.is_none() {
            return StepStatus::NoOutput;
        }
        ctx.output("sum", left.unwrap_or(0) + right.unwrap_or(0));
        StepStatus::Success
    }
}

/// Running sum whose state lives on a feedback edge.
///
/// `total = value + previous`, where `previous` is normally connected with a
/// deferred edge from this node's own `feedback` output. The same total is
/// published on both `total` and `feedback`.
#[derive(Debug, Default)]
pub struct RunningTotal;

impl RunningTotal {
    pub fn new() -> Self {
        Self
    }
}

impl Process for RunningTotal {
    fn name(&self) -> &'static str {
        "running_total"
    }

    fn ports(&self) -> PortSet {
        PortSet::new()
            .input::<i64>("value")
            .optional_input::<i64>("previous")
            .output::<i64>("total")
            .output::<i64>("feedback")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        let Some(value) = ctx.input::<i64>("value").copied() else {
            return StepStatus::NoOutput;
        };
        let total = value + ctx.input::<i64>("previous").copied().unwrap_or(0);
        ctx.output("total", total);
        ctx.output("feedback", total);
        StepStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Packet;
    use crate::resources::ResourcePool;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx(inputs: &[(&str, i64)]) -> StepContext {
        let inputs = inputs
            .iter()
            .map(|(port, value)| (port.to_string(), Arc::new(*value) as Packet))
            .collect::<HashMap<_, _>>();
        StepContext::new("arith", 0, inputs, Arc::new(ResourcePool::new()))
    }

    fn output(ctx: &mut StepContext, port: &str) -> Option<i64> {
        ctx.take_outputs()
            .remove(port)
            .and_then(|p| p.downcast_ref::<i64>().copied())
    }

    #[test]
    fn test_sum_of_both_sides() {
        let mut ctx = ctx(&[("left", 2), ("right", 40)]);
        assert_eq!(SumInputs::new().step(&mut ctx), StepStatus::Success);
        assert_eq!(output(&mut ctx, "sum"), Some(42));
    }

    #[test]
    fn test_sum_with_one_side_closed() {
        let mut ctx = ctx(&[("right", 7)]);
        SumInputs::new().step(&mut ctx);
        assert_eq!(output(&mut ctx, "sum"), Some(7));
    }

    #[test]
    fn test_running_total_adds_previous() {
        let mut first = ctx(&[("value", 1)]);
        RunningTotal::new().step(&mut first);
        assert_eq!(output(&mut first, "total"), Some(1));

        let mut second = ctx(&[("value", 2), ("previous", 1)]);
        RunningTotal::new().step(&mut second);
        let outputs = second.take_outputs();
        assert_eq!(outputs["total"].downcast_ref::<i64>(), Some(&3));
        assert_eq!(outputs["feedback"].downcast_ref::<i64>(), Some(&3));
    }
}
