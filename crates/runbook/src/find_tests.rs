// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn directory_is_searched_recursively_and_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "b/second.yml", "desc: b");
    write(tmp.path(), "a/first.yaml", "desc: a");
    write(tmp.path(), "notes.txt", "not a runbook");

    let files = find_runbooks(&tmp.path().to_string_lossy()).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0].0.ends_with("a/first.yaml"));
    assert!(files[1].0.ends_with("b/second.yml"));
}

#[test]
fn single_file_is_taken_as_is() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write(tmp.path(), "only.yml", "desc: only");
    let files = find_runbooks(&path.to_string_lossy()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].1, Format::Yaml);
}

#[test]
fn glob_pattern_filters_by_extension() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.yml", "desc: a");
    write(tmp.path(), "b.json", "{}");
    write(tmp.path(), "c.txt", "no");

    let pattern = format!("{}/*", tmp.path().to_string_lossy());
    let files = find_runbooks(&pattern).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn no_match_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let pattern = format!("{}/*.yml", tmp.path().to_string_lossy());
    assert!(matches!(
        find_runbooks(&pattern),
        Err(FindError::NoMatch(_))
    ));
}
