// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-operator run memory.
//!
//! The store backs expression evaluation: one entry per executed step (in
//! list or keyed map mode), the variables written by `bind:`, the published
//! outputs of `needs:` dependencies, the cookie jar, and the shared kv
//! table. [`Store::scope`] renders it under the fixed root vocabulary the
//! evaluator exposes (`steps`, `vars`, `needs`, `loop`, `env`, `cookies`,
//! `kv`); `previous` / `current` / `included` are contextual and added by
//! the operator.

use drill_core::Kv;
use serde_json::{Map, Value};

/// Root names reserved in the expression scope. `bind:` may not shadow them.
pub const ROOT_KEYS: &[&str] = &[
    "steps", "previous", "current", "included", "vars", "needs", "loop", "env", "cookies", "kv",
];

/// Field attached to every step entry carrying its outcome.
pub const OUTCOME_KEY: &str = "outcome";

#[derive(Debug, Clone)]
pub struct Store {
    /// Step history in execution order; the key is the step key (stringified
    /// index in list mode).
    entries: Vec<(String, Value)>,
    use_map: bool,
    /// `bind:` outputs plus initial `vars:`. Published to dependents.
    pub bind_vars: Map<String, Value>,
    /// Dependency alias to published outputs (or null).
    pub needs_vars: Map<String, Value>,
    /// Loop iteration of the enclosing scope, while one is running.
    pub loop_index: Option<usize>,
    cookies: Map<String, Value>,
    kv: Kv,
}

impl Store {
    pub fn new(use_map: bool, vars: Map<String, Value>, kv: Kv) -> Self {
        Self {
            entries: Vec::new(),
            use_map,
            bind_vars: vars,
            needs_vars: Map::new(),
            loop_index: None,
            cookies: Map::new(),
            kv,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a step entry under `key`.
    pub fn record(&mut self, key: String, value: Value) {
        self.entries.push((key, value));
    }

    /// Drop the most recent entry (loop overwrite).
    pub fn remove_latest(&mut self) {
        self.entries.pop();
    }

    /// Set a field on the most recently recorded entry. Idempotent for the
    /// same key. No-op when nothing has been recorded.
    pub fn record_to_latest(&mut self, field: &str, value: Value) {
        if let Some((_, entry)) = self.entries.last_mut() {
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(map) = entry.as_object_mut() {
                map.insert(field.to_string(), value);
            }
        }
    }

    /// Merge cookies into the jar.
    pub fn record_cookies(&mut self, cookies: Map<String, Value>) {
        for (name, value) in cookies {
            self.cookies.insert(name, value);
        }
    }

    pub fn latest(&self) -> Option<&Value> {
        self.entries.last().map(|(_, v)| v)
    }

    pub fn previous(&self) -> Option<&Value> {
        if self.entries.len() < 2 {
            return None;
        }
        self.entries.get(self.entries.len() - 2).map(|(_, v)| v)
    }

    pub fn clear_steps(&mut self) {
        self.entries.clear();
        self.loop_index = None;
    }

    /// The `steps` root: a sequence in list mode, a keyed mapping in map mode.
    pub fn steps_value(&self) -> Value {
        if self.use_map {
            let mut map = Map::with_capacity(self.entries.len());
            for (key, value) in &self.entries {
                map.insert(key.clone(), value.clone());
            }
            Value::Object(map)
        } else {
            Value::Array(self.entries.iter().map(|(_, v)| v.clone()).collect())
        }
    }

    /// Render the store for the evaluator.
    pub fn scope(&self) -> Value {
        let mut root = Map::new();
        root.insert("steps".to_string(), self.steps_value());
        root.insert("vars".to_string(), Value::Object(self.bind_vars.clone()));
        root.insert("needs".to_string(), Value::Object(self.needs_vars.clone()));
        root.insert(
            "loop".to_string(),
            self.loop_index.map(|i| Value::from(i as u64)).unwrap_or(Value::Null),
        );
        root.insert("env".to_string(), env_value());
        root.insert("cookies".to_string(), Value::Object(self.cookies.clone()));
        root.insert("kv".to_string(), self.kv.snapshot());
        Value::Object(root)
    }
}

fn env_value() -> Value {
    let mut map = Map::new();
    for (key, value) in std::env::vars() {
        map.insert(key, Value::String(value));
    }
    Value::Object(map)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
