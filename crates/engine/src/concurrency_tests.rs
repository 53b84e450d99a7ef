// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn run_tracked(
    group: Arc<ConcGroup>,
    tags: Vec<String>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) {
    let _permit = group.acquire(&tags).await;
    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
    peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    running.fetch_sub(1, Ordering::SeqCst);
}

#[tokio::test]
async fn slot_limit_bounds_parallelism() {
    let group = Arc::new(ConcGroup::new(2));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..6 {
        handles.push(tokio::spawn(run_tracked(
            Arc::clone(&group),
            vec![],
            Arc::clone(&running),
            Arc::clone(&peak),
        )));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn shared_tag_serializes_holders() {
    let group = Arc::new(ConcGroup::new(4));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(tokio::spawn(run_tracked(
            Arc::clone(&group),
            vec!["db".to_string()],
            Arc::clone(&running),
            Arc::clone(&peak),
        )));
    }
    for h in handles {
        h.await.unwrap();
    }
    // All four share the "db" tag: never more than one at a time.
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_tags_run_in_parallel() {
    let group = Arc::new(ConcGroup::new(4));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(tokio::spawn(run_tracked(
            Arc::clone(&group),
            vec![format!("tag-{i}")],
            Arc::clone(&running),
            Arc::clone(&peak),
        )));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn duplicate_tags_do_not_self_deadlock() {
    let group = ConcGroup::new(2);
    let tags = vec!["a".to_string(), "a".to_string()];
    let permit = tokio::time::timeout(Duration::from_secs(1), group.acquire(&tags)).await;
    assert!(permit.is_ok());
}
