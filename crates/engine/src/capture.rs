// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming run observers.
//!
//! Capturers watch a run as it happens. Every call is fire-and-forget:
//! implementations must not block meaningfully, and their failures never
//! affect the run outcome.

use crate::result::RunResult;
use drill_core::Trails;
use std::sync::Arc;

/// Observer of run progress.
pub trait Capturer: Send + Sync {
    fn set_current_trails(&self, _trails: &Trails) {}
    fn capture_start(&self, _trails: &Trails, _book_path: &str, _desc: &str) {}
    fn capture_result_by_step(&self, _trails: &Trails, _result: &RunResult) {}
    fn capture_result(&self, _trails: &Trails, _result: &RunResult) {}
    fn capture_end(&self, _trails: &Trails, _book_path: &str, _desc: &str) {}
}

/// Fan-out over registered capturers. Cheap to clone.
#[derive(Clone, Default)]
pub struct Capturers(Vec<Arc<dyn Capturer>>);

impl Capturers {
    pub fn new(capturers: Vec<Arc<dyn Capturer>>) -> Self {
        Self(capturers)
    }

    pub fn push(&mut self, capturer: Arc<dyn Capturer>) {
        self.0.push(capturer);
    }

    pub fn set_current_trails(&self, trails: &Trails) {
        for c in &self.0 {
            c.set_current_trails(trails);
        }
    }

    pub fn capture_start(&self, trails: &Trails, book_path: &str, desc: &str) {
        for c in &self.0 {
            c.capture_start(trails, book_path, desc);
        }
    }

    pub fn capture_result_by_step(&self, trails: &Trails, result: &RunResult) {
        for c in &self.0 {
            c.capture_result_by_step(trails, result);
        }
    }

    pub fn capture_result(&self, trails: &Trails, result: &RunResult) {
        for c in &self.0 {
            c.capture_result(trails, result);
        }
    }

    pub fn capture_end(&self, trails: &Trails, book_path: &str, desc: &str) {
        for c in &self.0 {
            c.capture_end(trails, book_path, desc);
        }
    }
}

/// Capturer that mirrors progress into `tracing` debug events.
#[derive(Debug, Default)]
pub struct TracingCapturer;

impl Capturer for TracingCapturer {
    fn capture_start(&self, _trails: &Trails, book_path: &str, desc: &str) {
        tracing::debug!(book = book_path, desc, "run start");
    }

    fn capture_result(&self, _trails: &Trails, result: &RunResult) {
        tracing::debug!(
            book = %result.book_path,
            skipped = result.skipped,
            failed = result.failed(),
            elapsed_ms = result.elapsed_ms,
            "run result"
        );
    }

    fn capture_end(&self, _trails: &Trails, book_path: &str, desc: &str) {
        tracing::debug!(book = book_path, desc, "run end");
    }
}
