// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stopwatch tree for run profiling.
//!
//! Spans are keyed by the serialized trail path of the unit being timed.
//! Starting a span returns a guard; dropping the guard folds the elapsed
//! time into the node addressed by the path. Multiple runbooks time spans
//! concurrently, so the tree is kept behind a mutex.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Node {
    elapsed: Duration,
    children: Vec<(String, Node)>,
}

impl Node {
    fn descend(&mut self, path: &[String]) -> &mut Node {
        let mut node = self;
        for id in path {
            let pos = match node.children.iter().position(|(k, _)| k == id) {
                Some(pos) => pos,
                None => {
                    node.children.push((id.clone(), Node::default()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[pos].1;
        }
        node
    }

    fn report(&self, id: Option<&str>) -> StopwatchReport {
        StopwatchReport {
            id: id.map(str::to_string),
            elapsed_ms: self.elapsed.as_millis() as u64,
            breakdown: self
                .children
                .iter()
                .map(|(k, n)| n.report(Some(k.as_str())))
                .collect(),
        }
    }
}

/// Shared stopwatch tree. Cheap to clone; clones record into the same tree.
#[derive(Clone, Default)]
pub struct Stopwatch {
    root: Arc<Mutex<Node>>,
    enabled: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Mutex::new(Node::default())),
            enabled: Arc::new(AtomicBool::new(true)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop recording; subsequent spans are no-ops.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Start timing the unit addressed by `path`. The returned guard records
    /// the elapsed time when dropped.
    pub fn start(&self, path: Vec<String>) -> SpanGuard {
        if self.is_enabled() {
            self.started.store(true, Ordering::Relaxed);
        }
        SpanGuard {
            sw: self.clone(),
            path,
            begin: Instant::now(),
        }
    }

    fn record(&self, path: &[String], elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }
        let mut root = self.root.lock();
        let node = root.descend(path);
        node.elapsed += elapsed;
    }

    /// Snapshot of the recorded tree, or `None` if nothing was recorded.
    pub fn report(&self) -> Option<StopwatchReport> {
        if !self.started.load(Ordering::Relaxed) {
            return None;
        }
        Some(self.root.lock().report(None))
    }
}

/// Guard returned by [`Stopwatch::start`].
pub struct SpanGuard {
    sw: Stopwatch,
    path: Vec<String>,
    begin: Instant,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let elapsed = self.begin.elapsed();
        self.sw.record(&self.path, elapsed);
    }
}

/// Serializable profile tree: `{id, elapsed_ms, breakdown: [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct StopwatchReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<StopwatchReport>,
}

impl StopwatchReport {
    /// Find a direct or transitive child by id.
    pub fn find(&self, id: &str) -> Option<&StopwatchReport> {
        for child in &self.breakdown {
            if child.id.as_deref() == Some(id) {
                return Some(child);
            }
            if let Some(found) = child.find(id) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "stopwatch_tests.rs"]
mod tests;
