// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded single-producer edges with one read cursor per consumer.
//!
//! An edge belongs to one output port. Each input port connected to that
//! output gets its own cursor, so fan-out never copies values: every
//! consumer reads the same [`Packet`] at its own pace. Values are addressed
//! by publication sequence number; the edge is *full* when the slowest
//! cursor is `capacity` values behind the producer.
//!
//! A *trigger* edge carries no data. It hangs off a node rather than a port,
//! receives a unit value after each successful step of its producer, and
//! orders and gates its consumers like any other non-deferred edge.

use crate::buffer::RingBuffer;
use crate::errors::{EdgeError, GraphError};
use crate::graph::{NodeId, Packet, PortType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub usize);

/// A `(node, port)` pair naming one end of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl NodeId {
    /// Refer to one of this node's ports by name.
    pub fn port(self, name: &str) -> PortRef {
        PortRef {
            node: self,
            port: name.to_string(),
        }
    }
}

/// What a consumer sees when it looks at its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// At least one unread value.
    Ready,
    /// Nothing unread, producer still live.
    Pending,
    /// Nothing unread and the producer has closed the edge.
    Closed,
}

pub struct Edge {
    id: EdgeId,
    source: PortRef,
    consumers: Vec<PortRef>,
    port_type: PortType,
    deferred: bool,
    trigger: bool,
    buffer: RingBuffer<Packet>,
    published: u64,
    cursors: Vec<u64>,
    released: Vec<bool>,
    closed: bool,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        source: PortRef,
        port_type: PortType,
        capacity: usize,
        deferred: bool,
    ) -> Result<Self, GraphError> {
        let buffer =
            RingBuffer::new(capacity).map_err(|_| GraphError::InvalidCapacity { capacity })?;
        Ok(Self {
            id,
            source,
            consumers: Vec::new(),
            port_type,
            deferred,
            trigger: false,
            buffer,
            published: 0,
            cursors: Vec::new(),
            released: Vec::new(),
            closed: false,
        })
    }

    /// A data-less edge signalling each successful step of `producer`.
    pub fn trigger(id: EdgeId, producer: NodeId, capacity: usize) -> Result<Self, GraphError> {
        let mut edge = Self::new(
            id,
            PortRef {
                node: producer,
                port: String::new(),
            },
            PortType::of::<()>(),
            capacity,
            false,
        )?;
        edge.trigger = true;
        Ok(edge)
    }

    /// Attach a consumer and return its cursor index. A late consumer starts
    /// at the oldest value still retained.
    pub fn add_consumer(&mut self, target: PortRef) -> usize {
        self.consumers.push(target);
        self.cursors.push(self.oldest_retained());
        self.released.push(false);
        self.cursors.len() - 1
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn source(&self) -> &PortRef {
        &self.source
    }

    pub fn consumers(&self) -> &[PortRef] {
        &self.consumers
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    /// Deferred edges never block their producer and are ignored by
    /// scheduling order; they carry values into the next step.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Execution-dependency edge: no ports, unit values only.
    pub fn is_trigger(&self) -> bool {
        self.trigger
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    fn oldest_retained(&self) -> u64 {
        self.published - self.buffer.occupancy() as u64
    }

    /// Unread values for one consumer.
    pub fn unread(&self, cursor: usize) -> usize {
        (self.published - self.cursors[cursor]) as usize
    }

    /// Unread values for the slowest consumer still attached.
    pub fn backlog(&self) -> usize {
        self.cursors
            .iter()
            .zip(self.released.iter())
            .filter(|(_, released)| !**released)
            .map(|(c, _)| (self.published - c) as usize)
            .max()
            .unwrap_or(0)
    }

    /// True when a publish would not overrun any consumer.
    pub fn has_room(&self) -> bool {
        self.deferred || self.backlog() < self.capacity()
    }

    pub fn availability(&self, cursor: usize) -> Availability {
        if self.cursors[cursor] < self.published {
            Availability::Ready
        } else if self.closed {
            Availability::Closed
        } else {
            Availability::Pending
        }
    }

    /// Append a value. When the buffer is already full the oldest value is
    /// dropped and lagging cursors skip past it; schedulers only let that
    /// happen on deferred edges.
    pub fn publish(&mut self, packet: Packet) -> Result<(), EdgeError> {
        if self.closed {
            return Err(EdgeError::Closed);
        }
        self.buffer.push(packet);
        self.published += 1;

        let oldest = self.oldest_retained();
        for cursor in self.cursors.iter_mut() {
            if *cursor < oldest {
                *cursor = oldest;
            }
        }
        Ok(())
    }

    /// Take the next value for `cursor`, if any.
    pub fn take(&mut self, cursor: usize) -> Option<Packet> {
        let position = self.cursors[cursor];
        if position >= self.published {
            return None;
        }
        let offset = (self.published - 1 - position) as usize;
        let packet = self.buffer.at(offset).ok()?.clone();
        self.cursors[cursor] += 1;
        Some(packet)
    }

    /// Consumer is done: its cursor no longer holds back the producer.
    pub fn release(&mut self, cursor: usize) {
        if let Some(released) = self.released.get_mut(cursor) {
            *released = true;
        }
    }

    pub fn is_released(&self, cursor: usize) -> bool {
        self.released.get(cursor).copied().unwrap_or(false)
    }

    /// Attach a released consumer again, starting at the oldest value still
    /// retained. A cursor that was never released is left where it is.
    pub fn reattach(&mut self, cursor: usize) {
        let oldest = self.oldest_retained();
        if let Some(released) = self.released.get_mut(cursor) {
            if *released {
                *released = false;
                self.cursors[cursor] = oldest;
            }
        }
    }

    /// Accept values again after [`Edge::close`], keeping what is buffered.
    pub fn reopen(&mut self) {
        self.closed = false;
    }

    /// Producer is done: consumers drain what is buffered, then see `Closed`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Empty the buffer, rewind every cursor and reopen the edge.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.published = 0;
        self.cursors.iter_mut().for_each(|c| *c = 0);
        self.released.iter_mut().for_each(|r| *r = false);
        self.closed = false;
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("consumers", &self.consumers)
            .field("capacity", &self.capacity())
            .field("deferred", &self.deferred)
            .field("trigger", &self.trigger)
            .field("published", &self.published)
            .field("cursors", &self.cursors)
            .field("released", &self.released)
            .field("closed", &self.closed)
            .finish()
    }
}
