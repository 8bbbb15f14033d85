// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// A type-erased value travelling along an edge.
///
/// Packets are shared by every consumer cursor of a fan-out edge; the value
/// itself is never mutated after publication.
pub type Packet = Arc<dyn Any + Send + Sync>;

/// `TypeId` of the value inside a packet (not of the `Arc`).
pub fn packet_type_id(packet: &Packet) -> TypeId {
    let value: &(dyn Any + Send + Sync) = packet.as_ref();
    value.type_id()
}

/// Static type tag of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortType {
    id: TypeId,
    name: &'static str,
}

impl PortType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, packet: &Packet) -> bool {
        packet_type_id(packet) == self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Declaration of one port on a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub port_type: PortType,
    pub direction: PortDirection,
    /// Inputs only: a required input must be connected before build.
    pub required: bool,
}

/// The fixed set of ports a process declares.
///
/// # Examples
/// ```
/// use framegraph::graph::PortSet;
///
/// let ports = PortSet::new()
///     .input::<i64>("frame")
///     .optional_input::<i64>("mask")
///     .output::<i64>("difference");
///
/// assert_eq!(ports.inputs().len(), 2);
/// assert!(ports.input_spec("mask").map(|p| !p.required).unwrap_or(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<T: Any>(self, name: &str) -> Self {
        self.push_input::<T>(name, true)
    }

    pub fn optional_input<T: Any>(self, name: &str) -> Self {
        self.push_input::<T>(name, false)
    }

    pub fn output<T: Any>(mut self, name: &str) -> Self {
        self.outputs.push(PortSpec {
            name: name.to_string(),
            port_type: PortType::of::<T>(),
            direction: PortDirection::Output,
            required: false,
        });
        self
    }

    fn push_input<T: Any>(mut self, name: &str, required: bool) -> Self {
        self.inputs.push(PortSpec {
            name: name.to_string(),
            port_type: PortType::of::<T>(),
            direction: PortDirection::Input,
            required,
        });
        self
    }

    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    pub fn input_spec(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_spec(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}
