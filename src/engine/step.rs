// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The node boundary shared by both schedulers: run one step with panics
//! contained, then check the published outputs against the node's ports.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::graph::{EdgeId, Node, Packet, PortType};
use crate::observability::messages::scheduler::StepFailed;
use crate::observability::messages::StructuredLog;
use crate::traits::{Process, StepContext, StepStatus};
use crate::utils::panic_message;

/// A declared output port and the edge it feeds, if connected.
#[derive(Debug, Clone)]
pub(crate) struct OutputPort {
    pub name: String,
    pub port_type: PortType,
    pub edge: Option<EdgeId>,
}

pub(crate) fn output_ports(node: &Node) -> Vec<OutputPort> {
    node.ports
        .outputs()
        .iter()
        .zip(node.outputs.iter())
        .map(|(spec, edge)| OutputPort {
            name: spec.name.clone(),
            port_type: spec.port_type,
            edge: *edge,
        })
        .collect()
}

pub(crate) struct StepOutcome {
    pub status: StepStatus,
    /// Packets to publish, in output port order. Empty unless `Success`.
    pub publish: Vec<(EdgeId, Packet)>,
    pub cause: Option<String>,
    pub elapsed: Duration,
}

/// Run `process.step(ctx)` and turn whatever happens into a [`StepOutcome`].
pub(crate) fn execute(
    process: &mut dyn Process,
    ctx: &mut StepContext,
    outputs: &[OutputPort],
) -> StepOutcome {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| process.step(ctx)));
    let elapsed = started.elapsed();
    let published = ctx.take_outputs();

    let (status, cause) = match result {
        Err(payload) => (
            StepStatus::Failure,
            Some(format!("step panicked: {}", panic_message(payload.as_ref()))),
        ),
        Ok(StepStatus::Failure) => (
            StepStatus::Failure,
            Some(
                ctx.take_failure_cause()
                    .unwrap_or_else(|| "step reported failure".to_string()),
            ),
        ),
        Ok(status) => (status, None),
    };

    let outcome = |status, publish, cause| StepOutcome {
        status,
        publish,
        cause,
        elapsed,
    };

    if status != StepStatus::Success {
        if let Some(cause) = &cause {
            StepFailed {
                node: ctx.node_name(),
                tick: ctx.tick(),
                cause,
            }
            .log();
        }
        return outcome(status, Vec::new(), cause);
    }

    match collect_outputs(outputs, published) {
        Ok(publish) => outcome(StepStatus::Success, publish, None),
        Err(cause) => {
            StepFailed {
                node: ctx.node_name(),
                tick: ctx.tick(),
                cause: &cause,
            }
            .log();
            outcome(StepStatus::Failure, Vec::new(), Some(cause))
        }
    }
}

/// Every connected output must carry a value of its declared type; values
/// on declared but unconnected ports are dropped.
fn collect_outputs(
    outputs: &[OutputPort],
    mut published: HashMap<String, Packet>,
) -> Result<Vec<(EdgeId, Packet)>, String> {
    let mut publish = Vec::new();
    for port in outputs {
        let packet = published.remove(&port.name);
        let Some(edge) = port.edge else {
            continue;
        };
        let packet = packet.ok_or_else(|| format!("output port '{}' was not published", port.name))?;
        if !port.port_type.matches(&packet) {
            return Err(format!(
                "output port '{}' expects {}, got a value of another type",
                port.name,
                port.port_type.name()
            ));
        }
        publish.push((edge, packet));
    }

    if let Some(undeclared) = published.keys().min() {
        return Err(format!("published to undeclared port '{}'", undeclared));
    }
    Ok(publish)
}

/// `finalize()` with panics contained. Returns the panic message, if any.
pub(crate) fn finalize(process: &mut dyn Process) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(|| process.finalize()))
        .err()
        .map(|payload| panic_message(payload.as_ref()))
}

/// `reset()` with panics contained; a panic counts as a refusal.
pub(crate) fn reset(process: &mut dyn Process) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| process.reset())).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PortSet;
    use crate::resources::ResourcePool;
    use std::sync::Arc;

    struct Scripted<F: FnMut(&mut StepContext) -> StepStatus + Send>(F);

    impl<F: FnMut(&mut StepContext) -> StepStatus + Send> Process for Scripted<F> {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn ports(&self) -> PortSet {
            PortSet::new().output::<i64>("out").output::<i64>("spare")
        }

        fn step(&mut self, ctx: &mut StepContext) -> StepStatus {
            (self.0)(ctx)
        }
    }

    fn ports() -> Vec<OutputPort> {
        vec![
            OutputPort {
                name: "out".to_string(),
                port_type: PortType::of::<i64>(),
                edge: Some(EdgeId(3)),
            },
            OutputPort {
                name: "spare".to_string(),
                port_type: PortType::of::<i64>(),
                edge: None,
            },
        ]
    }

    fn ctx() -> StepContext {
        StepContext::new("scripted", 0, HashMap::new(), Arc::new(ResourcePool::new()))
    }

    #[test]
    fn test_success_publishes_connected_outputs_only() {
        let mut process = Scripted(|ctx: &mut StepContext| {
            ctx.output("out", 1_i64);
            ctx.output("spare", 2_i64);
            StepStatus::Success
        });
        let outcome = execute(&mut process, &mut ctx(), &ports());

        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.publish.len(), 1);
        assert_eq!(outcome.publish[0].0, EdgeId(3));
    }

    #[test]
    fn test_missing_output_turns_into_failure() {
        let mut process = Scripted(|_: &mut StepContext| StepStatus::Success);
        let outcome = execute(&mut process, &mut ctx(), &ports());

        assert_eq!(outcome.status, StepStatus::Failure);
        assert_eq!(outcome.cause.as_deref(), Some("output port 'out' was not published"));
    }

    #[test]
    fn test_wrong_output_type_is_failure() {
        let mut process = Scripted(|ctx: &mut StepContext| {
            ctx.output("out", "not a number");
            StepStatus::Success
        });
        let outcome = execute(&mut process, &mut ctx(), &ports());
        assert_eq!(outcome.status, StepStatus::Failure);
        assert!(outcome.cause.unwrap().contains("expects i64"));
    }

    #[test]
    fn test_undeclared_output_is_failure() {
        let mut process = Scripted(|ctx: &mut StepContext| {
            ctx.output("out", 1_i64);
            ctx.output("bogus", 1_i64);
            StepStatus::Success
        });
        let outcome = execute(&mut process, &mut ctx(), &ports());
        assert_eq!(outcome.cause.as_deref(), Some("published to undeclared port 'bogus'"));
    }

    #[test]
    fn test_no_output_discards_values() {
        let mut process = Scripted(|ctx: &mut StepContext| {
            ctx.output("out", 1_i64);
            StepStatus::NoOutput
        });
        let outcome = execute(&mut process, &mut ctx(), &ports());
        assert_eq!(outcome.status, StepStatus::NoOutput);
        assert!(outcome.publish.is_empty());
    }

    #[test]
    fn test_panic_becomes_failure_with_message() {
        let mut process = Scripted(|_: &mut StepContext| -> StepStatus { panic!("bad frame header") });
        let outcome = execute(&mut process, &mut ctx(), &ports());
        assert_eq!(outcome.status, StepStatus::Failure);
        assert_eq!(outcome.cause.as_deref(), Some("step panicked: bad frame header"));
    }

    #[test]
    fn test_reported_failure_keeps_cause() {
        let mut process = Scripted(|ctx: &mut StepContext| ctx.fail("sensor offline"));
        let outcome = execute(&mut process, &mut ctx(), &ports());
        assert_eq!(outcome.cause.as_deref(), Some("sensor offline"));
    }
}
