// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-producer / multi-consumer rendezvous keyed by runbook path.
//!
//! Dependent runbooks wait on the path of their dependency; the dependency
//! publishes its result store exactly once when it finishes. Waiters that
//! subscribe after the value is set are resolved immediately. Closing the
//! map drops every outstanding waiter, so pending receivers resolve with a
//! receive error.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

struct Inner<V> {
    values: HashMap<String, V>,
    waiters: HashMap<String, Vec<oneshot::Sender<V>>>,
    closed: bool,
}

/// Rendezvous map. Cheap to clone; clones share state.
pub struct WaitMap<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for WaitMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for WaitMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> WaitMap<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                values: HashMap::new(),
                waiters: HashMap::new(),
                closed: false,
            })),
        }
    }

    /// Close the map, waking all outstanding waiters with an error.
    /// Called exactly once when a fleet run completes.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.waiters.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().values.contains_key(key)
    }
}

impl<V: Clone> WaitMap<V> {
    /// Subscribe to `key`. The receiver fires once: immediately if the value
    /// is already set, otherwise when [`set`](Self::set) is called. After
    /// [`close`](Self::close) the receiver fails with a recv error.
    pub fn subscribe(&self, key: &str) -> oneshot::Receiver<V> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        if let Some(value) = inner.values.get(key) {
            // Receiver is still in scope; this send cannot fail.
            let _ = tx.send(value.clone());
            return rx;
        }
        if inner.closed {
            // Drop the sender so the receiver resolves with an error.
            return rx;
        }
        inner.waiters.entry(key.to_string()).or_default().push(tx);
        rx
    }

    /// Publish a value for `key`, waking every subscribed waiter. Later
    /// subscribers receive the value synchronously.
    pub fn set(&self, key: &str, value: V) {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.values.insert(key.to_string(), value.clone());
            inner.waiters.remove(key).unwrap_or_default()
        };
        for tx in waiters {
            let _ = tx.send(value.clone());
        }
    }

    /// Non-blocking lookup of an already-published value.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().values.get(key).cloned()
    }
}

#[cfg(test)]
#[path = "waitmap_tests.rs"]
mod tests;
