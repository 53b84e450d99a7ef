// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-runbook shared key/value table.
//!
//! One table is shared by every operator in a fleet; values written by one
//! runbook are visible to all others under the `kv` expression root.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Thread-safe key/value table. Cheap to clone; clones share storage.
#[derive(Debug, Clone, Default)]
pub struct Kv {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl Kv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    pub fn del(&self, key: &str) {
        self.inner.write().shift_remove(key);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of the whole table for expression evaluation.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.inner.read().clone())
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
