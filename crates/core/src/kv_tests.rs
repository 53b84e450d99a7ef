// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn set_get_del_roundtrip() {
    let kv = Kv::new();
    kv.set("token", json!("t-123"));
    assert_eq!(kv.get("token"), Some(json!("t-123")));
    kv.del("token");
    assert_eq!(kv.get("token"), None);
}

#[test]
fn clear_empties_the_table() {
    let kv = Kv::new();
    kv.set("a", json!(1));
    kv.set("b", json!(2));
    kv.clear();
    assert!(kv.is_empty());
}

#[test]
fn clones_share_storage() {
    let kv = Kv::new();
    let other = kv.clone();
    kv.set("shared", json!(true));
    assert_eq!(other.get("shared"), Some(json!(true)));
}

#[test]
fn snapshot_is_an_object() {
    let kv = Kv::new();
    kv.set("n", json!(7));
    let snap = kv.snapshot();
    assert_eq!(snap["n"], json!(7));
}

#[test]
fn concurrent_writers_do_not_lose_updates() {
    let kv = Kv::new();
    let mut handles = Vec::new();
    for i in 0..8 {
        let kv = kv.clone();
        handles.push(std::thread::spawn(move || {
            for j in 0..50 {
                kv.set(format!("k{}-{}", i, j), json!(j));
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(kv.len(), 8 * 50);
}
