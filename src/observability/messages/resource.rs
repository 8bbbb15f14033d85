// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Display, Formatter};

use crate::observability::messages::StructuredLog;

/// A resource was written and its subscribers are about to run.
///
/// # Log Level
/// `trace!` - Emitted on every write
pub struct ResourceUpdated<'a> {
    pub name: &'a str,
    pub subscribers: usize,
}

impl Display for ResourceUpdated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resource '{}' updated, notifying {} subscribers",
            self.name, self.subscribers
        )
    }
}

impl StructuredLog for ResourceUpdated<'_> {
    fn log(&self) {
        tracing::trace!(resource = self.name, subscribers = self.subscribers, "{}", self);
    }
}

/// A subscriber tried to write the resource it is being notified about.
///
/// # Log Level
/// `warn!` - Likely a wiring mistake in process code
pub struct ReentrantWriteRejected<'a> {
    pub name: &'a str,
}

impl Display for ReentrantWriteRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected re-entrant write to resource '{}' from inside its own notification",
            self.name
        )
    }
}

impl StructuredLog for ReentrantWriteRejected<'_> {
    fn log(&self) {
        tracing::warn!(resource = self.name, "{}", self);
    }
}
