// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod dot;
mod edge;
mod node;
mod pipeline_graph;
mod port;
pub mod validation;

pub use edge::{Availability, Edge, EdgeId, PortRef};
pub use node::{InputBinding, Node, NodeId};
pub use pipeline_graph::{BuiltPipeline, PipelineGraph};
pub(crate) use pipeline_graph::downstream_of;
pub use port::{packet_type_id, Packet, PortDirection, PortSet, PortSpec, PortType};
