// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency group: a global slot limit plus tag-based mutual exclusion.
//!
//! The fleet scheduler dispatches each operator through
//! [`ConcGroup::acquire`]. A permit holds one of `limit` global slots and
//! the locks of every `concurrency:` tag the operator declares, so two
//! operators sharing a tag never run at the same time. Slots are acquired
//! before tags, and tags in sorted order, which keeps acquisition
//! deadlock-free.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

pub struct ConcGroup {
    slots: Arc<Semaphore>,
    tags: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConcGroup {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(limit.max(1))),
            tags: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for a global slot and every tag lock in `tags`.
    pub async fn acquire(&self, tags: &[String]) -> ConcPermit {
        let slot = Arc::clone(&self.slots).acquire_owned().await.ok();

        let mut sorted: Vec<String> = tags.to_vec();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<tokio::sync::Mutex<()>>> = {
            let mut table = self.tags.lock();
            sorted
                .iter()
                .map(|tag| Arc::clone(table.entry(tag.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        ConcPermit {
            _slot: slot,
            _tags: guards,
        }
    }
}

/// Held for the duration of one operator run.
pub struct ConcPermit {
    _slot: Option<OwnedSemaphorePermit>,
    _tags: Vec<OwnedMutexGuard<()>>,
}

#[cfg(test)]
#[path = "concurrency_tests.rs"]
mod tests;
