// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook file discovery

use crate::parser::{format_for_path, Format};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from runbook path expansion.
#[derive(Debug, Error)]
pub enum FindError {
    #[error("invalid path pattern {pattern}: {detail}")]
    BadPattern { pattern: String, detail: String },
    #[error("no runbooks match: {0}")]
    NoMatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Expand a path pattern into runbook files, sorted by path.
///
/// The pattern is a glob (`books/**/*.yml`); a plain directory is searched
/// recursively for `.yml`/`.yaml`/`.json` files, and a plain file is taken
/// as-is.
pub fn find_runbooks(pattern: &str) -> Result<Vec<(PathBuf, Format)>, FindError> {
    let direct = Path::new(pattern);
    let mut files = if direct.is_dir() {
        collect_runbook_files(direct)?
    } else if direct.is_file() {
        match format_for_path(direct) {
            Some(format) => vec![(direct.to_path_buf(), format)],
            None => Vec::new(),
        }
    } else {
        let mut found = Vec::new();
        let paths = glob::glob(pattern).map_err(|e| FindError::BadPattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?;
        for entry in paths {
            let path = entry.map_err(|e| FindError::BadPattern {
                pattern: pattern.to_string(),
                detail: e.to_string(),
            })?;
            if path.is_dir() {
                found.extend(collect_runbook_files(&path)?);
            } else if let Some(format) = format_for_path(&path) {
                found.push((path, format));
            }
        }
        found
    };

    if files.is_empty() {
        return Err(FindError::NoMatch(pattern.to_string()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files.dedup_by(|a, b| a.0 == b.0);
    Ok(files)
}

/// Recursively collect all runbook files under `dir`.
fn collect_runbook_files(dir: &Path) -> Result<Vec<(PathBuf, Format)>, std::io::Error> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Some(format) = format_for_path(&path) {
                files.push((path, format));
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
#[path = "find_tests.rs"]
mod tests;
