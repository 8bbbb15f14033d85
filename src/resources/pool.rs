// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Named, typed shared state with change notification.
//!
//! One [`ResourcePool`] is created per pipeline and handed to every process
//! through its [`StepContext`](crate::traits::StepContext). Values are stored
//! type-erased and read back by downcast; subscribers registered on a name are
//! called synchronously, in registration order, after each write to it.
//!
//! Writers to the same name are serialized across *store + notify*, so all
//! subscribers of one write finish before the next write to that name becomes
//! visible. A subscriber that writes back to a name whose notification is in
//! progress on the same thread gets [`ResourceError::ReentrantWrite`] instead
//! of recursing.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use crate::errors::ResourceError;
use crate::observability::messages::resource::{ReentrantWriteRejected, ResourceUpdated};
use crate::observability::messages::StructuredLog;
use crate::utils::{lock, read, write};

type Value = Arc<dyn Any + Send + Sync>;
type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`ResourcePool::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Entry {
    value: Mutex<Option<Value>>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    // Held from store until the last subscriber returns.
    write_gate: Mutex<()>,
    notifying: Mutex<Option<ThreadId>>,
}

impl Entry {
    fn is_notifying_on_current_thread(&self) -> bool {
        *lock(&self.notifying) == Some(thread::current().id())
    }
}

/// Clears the notifying marker even if a subscriber panics.
struct NotifyingGuard<'a> {
    entry: &'a Entry,
}

impl<'a> NotifyingGuard<'a> {
    fn enter(entry: &'a Entry) -> Self {
        *lock(&entry.notifying) = Some(thread::current().id());
        Self { entry }
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.entry.notifying) = None;
    }
}

/// Thread-safe map from resource name to a type-erased value plus observers.
///
/// # Examples
/// ```
/// use std::sync::{Arc, Mutex};
/// use framegraph::resources::ResourcePool;
///
/// let pool = ResourcePool::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// pool.subscribe("frame_rate", move |name| sink.lock().unwrap().push(name.to_string()));
///
/// pool.put("frame_rate", 29.97_f64).unwrap();
///
/// assert_eq!(pool.get::<f64>("frame_rate"), Some(29.97));
/// assert_eq!(seen.lock().unwrap().as_slice(), ["frame_rate"]);
/// ```
#[derive(Default)]
pub struct ResourcePool {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    next_subscription: AtomicU64,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Option<Arc<Entry>> {
        read(&self.entries).get(name).cloned()
    }

    fn entry_or_insert(&self, name: &str) -> Arc<Entry> {
        if let Some(entry) = self.entry(name) {
            return entry;
        }
        write(&self.entries)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Store `value` under `name`, replacing any previous value (of any type),
    /// then notify subscribers of `name`.
    pub fn put<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<(), ResourceError> {
        let entry = self.entry_or_insert(name);
        self.write_and_notify(name, &entry, |slot| {
            *slot = Some(Arc::new(value));
            true
        })
        .map(|_| ())
    }

    /// Store `value` only if `name` holds no value yet. Returns whether the
    /// value was stored; subscribers are notified only in that case.
    pub fn create<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<bool, ResourceError> {
        let entry = self.entry_or_insert(name);
        self.write_and_notify(name, &entry, |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::new(value));
            true
        })
    }

    fn write_and_notify<F>(&self, name: &str, entry: &Entry, store: F) -> Result<bool, ResourceError>
    where
        F: FnOnce(&mut Option<Value>) -> bool,
    {
        if entry.is_notifying_on_current_thread() {
            ReentrantWriteRejected { name }.log();
            return Err(ResourceError::ReentrantWrite {
                name: name.to_string(),
            });
        }

        let _gate = lock(&entry.write_gate);
        let stored = store(&mut lock(&entry.value));
        if stored {
            Self::notify_entry(name, entry);
        }
        Ok(stored)
    }

    fn notify_entry(name: &str, entry: &Entry) {
        let subscribers: Vec<Callback> = lock(&entry.subscribers)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        ResourceUpdated {
            name,
            subscribers: subscribers.len(),
        }
        .log();

        let _notifying = NotifyingGuard::enter(entry);
        for callback in subscribers {
            callback(name);
        }
    }

    /// A clone of the value under `name`, if present and of type `T`.
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        let entry = self.entry(name)?;
        let value = lock(&entry.value);
        value.as_ref()?.downcast_ref::<T>().cloned()
    }

    /// The shared value under `name` without cloning it.
    pub fn get_shared<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let entry = self.entry(name)?;
        let value = lock(&entry.value).clone()?;
        value.downcast::<T>().ok()
    }

    /// Like [`ResourcePool::get`] but says why nothing came back.
    pub fn try_get<T: Any + Clone>(&self, name: &str) -> Result<T, ResourceError> {
        let missing = || ResourceError::Missing {
            name: name.to_string(),
        };
        let entry = self.entry(name).ok_or_else(missing)?;
        let value = lock(&entry.value);
        let value = value.as_ref().ok_or_else(missing)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ResourceError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name)
            .map(|entry| lock(&entry.value).is_some())
            .unwrap_or(false)
    }

    /// Remove `name` together with its subscribers. Returns whether a value
    /// was present.
    pub fn remove(&self, name: &str) -> bool {
        match write(&self.entries).remove(name) {
            Some(entry) => lock(&entry.value).is_some(),
            None => false,
        }
    }

    /// Re-run the subscribers of `name` without changing its value.
    pub fn notify(&self, name: &str) -> Result<(), ResourceError> {
        let entry = self.entry(name).ok_or_else(|| ResourceError::Missing {
            name: name.to_string(),
        })?;
        self.write_and_notify(name, &entry, |_| true).map(|_| ())
    }

    /// Register `callback` to run after every write to `name`. The name does
    /// not need to hold a value yet.
    pub fn subscribe<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let entry = self.entry_or_insert(name);
        lock(&entry.subscribers).push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };
        let mut subscribers = lock(&entry.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.entry(name)
            .map(|entry| lock(&entry.subscribers).len())
            .unwrap_or(0)
    }

    /// Names that currently hold a value, sorted.
    pub fn names(&self) -> Vec<String> {
        let entries = read(&self.entries);
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| lock(&entry.value).is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
    }

    /// Drop every stored value but keep subscriptions. Subscribers are not
    /// notified.
    pub fn clear_values(&self) {
        for entry in read(&self.entries).values() {
            let _gate = lock(&entry.write_gate);
            *lock(&entry.value) = None;
        }
    }
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("names", &self.names())
            .finish()
    }
}
