// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn random_ids_are_unique_and_sized() {
    let a = random_id();
    let b = random_id();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), ID_LEN);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn path_ids_are_stable() {
    let a = path_id("books/login.yml");
    let b = path_id("books/login.yml");
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), ID_LEN);
}

#[test]
fn path_ids_differ_by_path() {
    assert_ne!(path_id("books/a.yml"), path_id("books/b.yml"));
}

#[test]
fn prefix_matching() {
    let id = RunbookId::from_string("deadbeef00");
    assert!(id.has_prefix("dead"));
    assert!(id.has_prefix("deadbeef00"));
    assert!(!id.has_prefix("beef"));
    // An empty prefix never matches; it would select everything.
    assert!(!id.has_prefix(""));
}

#[test]
fn short_truncates() {
    let id = RunbookId::from_string("abcdef");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdef");
}
