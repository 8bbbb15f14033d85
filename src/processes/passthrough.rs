// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::marker::PhantomData;

use crate::graph::PortSet;
use crate::traits::{Process, StepContext, StepStatus};

/// Forwards each input packet to `out` without copying the value.
pub struct Passthrough<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Passthrough<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Passthrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> Process for Passthrough<T> {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn ports(&self) -> PortSet {
        PortSet::new().input::<T>("in").output::<T>("out")
    }

    fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
        match ctx.input_packet("in").cloned() {
            Some(packet) => {
                ctx.forward("out", packet);
                StepStatus::Success
            }
            None => StepStatus::NoOutput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Packet;
    use crate::resources::ResourcePool;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_forwards_same_packet() {
        let packet: Packet = Arc::new(String::from("frame"));
        let inputs = HashMap::from([("in".to_string(), packet.clone())]);
        let mut ctx = StepContext::new("p", 0, inputs, Arc::new(ResourcePool::new()));

        let mut process = Passthrough::<String>::new();
        assert_eq!(process.step(&mut ctx), StepStatus::Success);

        let out = ctx.take_outputs().remove("out").unwrap();
        assert!(Arc::ptr_eq(&out, &packet));
    }

    #[test]
    fn test_nothing_in_nothing_out() {
        let mut ctx = StepContext::new("p", 0, HashMap::new(), Arc::new(ResourcePool::new()));
        let mut process = Passthrough::<i64>::default();
        assert_eq!(process.step(&mut ctx), StepStatus::NoOutput);
    }
}
