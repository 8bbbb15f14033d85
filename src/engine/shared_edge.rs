// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! An [`Edge`] shared between async workers.
//!
//! The edge itself sits behind a short-lived `std::sync::Mutex` (it is never
//! held across an `.await`). Producers wait on `space_available`, consumers
//! on `data_available`; every wait also listens to the pipeline's
//! cancellation token. Each wait registers interest with
//! `Notified::enable` *before* inspecting the edge, so a notification sent
//! between the check and the `.await` is not lost.

use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::errors::EdgeError;
use crate::graph::{Availability, Edge, Packet};
use crate::utils::lock;

pub struct SharedEdge {
    inner: Mutex<Edge>,
    data_available: Notify,
    space_available: Notify,
}

impl SharedEdge {
    pub fn new(edge: Edge) -> Self {
        Self {
            inner: Mutex::new(edge),
            data_available: Notify::new(),
            space_available: Notify::new(),
        }
    }

    /// Publish `packet`, suspending while the edge is full.
    pub async fn publish(&self, packet: Packet, cancel: &CancellationToken) -> Result<(), EdgeError> {
        loop {
            let notified = self.space_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut edge = lock(&self.inner);
                if edge.is_closed() {
                    return Err(EdgeError::Closed);
                }
                if edge.has_room() {
                    edge.publish(packet)?;
                    drop(edge);
                    self.data_available.notify_waiters();
                    return Ok(());
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(EdgeError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Next value for `cursor`; `Ok(None)` once the edge is closed and
    /// drained. Suspends while empty.
    pub async fn consume(
        &self,
        cursor: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<Packet>, EdgeError> {
        loop {
            let notified = self.data_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.availability(cursor) {
                Availability::Closed => return Ok(None),
                Availability::Ready => {
                    if let Some(packet) = self.take(cursor) {
                        return Ok(Some(packet));
                    }
                }
                Availability::Pending => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(EdgeError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    pub fn availability(&self, cursor: usize) -> Availability {
        lock(&self.inner).availability(cursor)
    }

    /// Suspend until `cursor` has a value or the edge is closed and
    /// drained, without taking anything. Never returns `Pending`.
    pub async fn wait_ready(
        &self,
        cursor: usize,
        cancel: &CancellationToken,
    ) -> Result<Availability, EdgeError> {
        loop {
            let notified = self.data_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.availability(cursor) {
                Availability::Pending => {}
                settled => return Ok(settled),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(EdgeError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Non-blocking read, used for deferred inputs.
    pub fn take(&self, cursor: usize) -> Option<Packet> {
        let packet = lock(&self.inner).take(cursor);
        if packet.is_some() {
            self.space_available.notify_waiters();
        }
        packet
    }

    /// The consumer behind `cursor` is gone; wakes a producer waiting on it.
    pub fn release(&self, cursor: usize) {
        lock(&self.inner).release(cursor);
        self.space_available.notify_waiters();
    }

    /// No more values will be published; wakes every waiter.
    pub fn close(&self) {
        lock(&self.inner).close();
        self.data_available.notify_waiters();
        self.space_available.notify_waiters();
    }

    pub fn backlog(&self) -> usize {
        lock(&self.inner).backlog()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).is_closed()
    }

    pub fn reset(&self) {
        lock(&self.inner).reset();
    }

    /// Run `f` against the edge under its lock.
    pub fn with<R>(&self, f: impl FnOnce(&Edge) -> R) -> R {
        f(&lock(&self.inner))
    }
}
