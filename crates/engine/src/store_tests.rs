// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn list_store() -> Store {
    Store::new(false, Map::new(), Kv::new())
}

fn map_store() -> Store {
    Store::new(true, Map::new(), Kv::new())
}

#[test]
fn list_mode_steps_are_a_sequence() {
    let mut store = list_store();
    store.record("0".into(), json!({"status": 200}));
    store.record("1".into(), json!({"status": 404}));
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.steps_value(),
        json!([{"status": 200}, {"status": 404}])
    );
}

#[test]
fn map_mode_steps_are_a_mapping_in_insertion_order() {
    let mut store = map_store();
    store.record("login".into(), json!({"ok": true}));
    store.record("fetch".into(), json!({"ok": false}));
    let steps = store.steps_value();
    let keys: Vec<&String> = steps.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["login", "fetch"]);
}

#[test]
fn latest_and_previous() {
    let mut store = list_store();
    assert!(store.latest().is_none());
    assert!(store.previous().is_none());
    store.record("0".into(), json!({"n": 1}));
    assert_eq!(store.latest(), Some(&json!({"n": 1})));
    assert!(store.previous().is_none());
    store.record("1".into(), json!({"n": 2}));
    assert_eq!(store.previous(), Some(&json!({"n": 1})));
    assert_eq!(store.latest(), Some(&json!({"n": 2})));
}

#[test]
fn remove_latest_supports_loop_overwrite() {
    let mut store = list_store();
    store.record("0".into(), json!({"iter": 0}));
    store.remove_latest();
    store.record("0".into(), json!({"iter": 1}));
    assert_eq!(store.len(), 1);
    assert_eq!(store.latest(), Some(&json!({"iter": 1})));
}

#[test]
fn record_to_latest_sets_and_overwrites_a_field() {
    let mut store = list_store();
    store.record("0".into(), json!({"status": 200}));
    store.record_to_latest(OUTCOME_KEY, json!("success"));
    store.record_to_latest(OUTCOME_KEY, json!("success"));
    assert_eq!(store.latest().unwrap()["outcome"], json!("success"));
    assert_eq!(store.latest().unwrap()["status"], json!(200));
}

#[test]
fn record_to_latest_on_empty_store_is_a_noop() {
    let mut store = list_store();
    store.record_to_latest(OUTCOME_KEY, json!("skipped"));
    assert!(store.is_empty());
}

#[test]
fn scope_has_all_roots() {
    let mut vars = Map::new();
    vars.insert("user".to_string(), json!("alice"));
    let store = Store::new(false, vars, Kv::new());
    let scope = store.scope();
    for key in ["steps", "vars", "needs", "loop", "env", "cookies", "kv"] {
        assert!(scope.get(key).is_some(), "missing root {key}");
    }
    assert_eq!(scope["vars"]["user"], json!("alice"));
    assert_eq!(scope["loop"], json!(null));
}

#[test]
fn scope_reflects_loop_index_and_kv() {
    let kv = Kv::new();
    kv.set("shared", json!(1));
    let mut store = Store::new(false, Map::new(), kv);
    store.loop_index = Some(2);
    let scope = store.scope();
    assert_eq!(scope["loop"], json!(2));
    assert_eq!(scope["kv"]["shared"], json!(1));
}

#[test]
fn cookies_merge_by_name() {
    let mut store = list_store();
    let mut first = Map::new();
    first.insert("session".to_string(), json!("a"));
    store.record_cookies(first);
    let mut second = Map::new();
    second.insert("session".to_string(), json!("b"));
    store.record_cookies(second);
    assert_eq!(store.scope()["cookies"]["session"], json!("b"));
}

#[test]
fn clear_steps_resets_history_and_loop_index() {
    let mut store = list_store();
    store.record("0".into(), json!({}));
    store.loop_index = Some(1);
    store.clear_steps();
    assert!(store.is_empty());
    assert!(store.loop_index.is_none());
}
