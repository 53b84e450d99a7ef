// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn set_then_subscribe_resolves_immediately() {
    let wm: WaitMap<i32> = WaitMap::new();
    wm.set("a", 7);
    let rx = wm.subscribe("a");
    assert_eq!(rx.await.unwrap(), 7);
}

#[tokio::test]
async fn subscribe_blocks_until_set() {
    let wm: WaitMap<String> = WaitMap::new();
    let rx = wm.subscribe("books/a.yml");

    let writer = wm.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        writer.set("books/a.yml", "published".to_string());
    });

    assert_eq!(rx.await.unwrap(), "published");
    handle.await.unwrap();
}

#[tokio::test]
async fn multiple_waiters_all_receive() {
    let wm: WaitMap<i32> = WaitMap::new();
    let rx1 = wm.subscribe("k");
    let rx2 = wm.subscribe("k");
    let rx3 = wm.subscribe("k");
    wm.set("k", 42);
    assert_eq!(rx1.await.unwrap(), 42);
    assert_eq!(rx2.await.unwrap(), 42);
    assert_eq!(rx3.await.unwrap(), 42);
}

#[tokio::test]
async fn close_wakes_outstanding_waiters_with_error() {
    let wm: WaitMap<i32> = WaitMap::new();
    let rx = wm.subscribe("never");
    wm.close();
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn subscribe_after_close_errors() {
    let wm: WaitMap<i32> = WaitMap::new();
    wm.close();
    let rx = wm.subscribe("k");
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn values_survive_close() {
    let wm: WaitMap<i32> = WaitMap::new();
    wm.set("k", 1);
    wm.close();
    // Already-set values still resolve for late subscribers.
    let rx = wm.subscribe("k");
    assert_eq!(rx.await.unwrap(), 1);
}

#[test]
fn contains_reflects_set() {
    let wm: WaitMap<i32> = WaitMap::new();
    assert!(!wm.contains("k"));
    wm.set("k", 1);
    assert!(wm.contains("k"));
}
