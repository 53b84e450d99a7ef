// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn path(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn empty_stopwatch_reports_none() {
    let sw = Stopwatch::new();
    assert!(sw.report().is_none());
}

#[test]
fn span_records_into_nested_node() {
    let sw = Stopwatch::new();
    {
        let _span = sw.start(path(&["book", "step0"]));
        std::thread::sleep(Duration::from_millis(5));
    }
    let report = sw.report().unwrap();
    let book = report.find("book").unwrap();
    let step = book.find("step0").unwrap();
    assert!(step.elapsed_ms >= 5);
}

#[test]
fn repeated_spans_accumulate() {
    let sw = Stopwatch::new();
    for _ in 0..3 {
        let _span = sw.start(path(&["book"]));
        std::thread::sleep(Duration::from_millis(2));
    }
    let report = sw.report().unwrap();
    let book = report.find("book").unwrap();
    assert!(book.elapsed_ms >= 6);
    // One node, not three.
    assert_eq!(report.breakdown.len(), 1);
}

#[test]
fn disabled_stopwatch_records_nothing() {
    let sw = Stopwatch::new();
    sw.disable();
    {
        let _span = sw.start(path(&["book"]));
    }
    assert!(sw.report().is_none());
}

#[test]
fn clones_share_the_tree() {
    let sw = Stopwatch::new();
    let other = sw.clone();
    {
        let _span = other.start(path(&["book"]));
    }
    assert!(sw.report().is_some());
}

#[test]
fn report_serializes_as_profile_json() {
    let sw = Stopwatch::new();
    {
        let _span = sw.start(path(&["book"]));
    }
    let json = serde_json::to_value(sw.report().unwrap()).unwrap();
    assert!(json.get("elapsed_ms").is_some());
    assert_eq!(json["breakdown"][0]["id"], "book");
}
