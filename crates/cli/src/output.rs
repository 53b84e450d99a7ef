// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run result rendering.

use crate::color;
use drill_engine::{FleetResult, RunResult};

/// One line per runbook: status, desc, path, elapsed.
pub fn result_line(result: &RunResult) -> String {
    let status = if result.failed() {
        color::red("failed")
    } else if result.skipped {
        color::yellow("skipped")
    } else {
        color::green("ok")
    };
    let desc = if result.desc.is_empty() {
        "-".to_string()
    } else {
        result.desc.clone()
    };
    format!(
        "{:<9} {} ({}) {}ms",
        status, desc, result.book_path, result.elapsed_ms
    )
}

/// Summary counts after a run.
pub fn summary(result: &FleetResult) -> String {
    let failed = result.run_results.iter().filter(|r| r.failed()).count();
    let skipped = result
        .run_results
        .iter()
        .filter(|r| r.skipped && !r.failed())
        .count();
    let passed = result.run_results.len() - failed - skipped;
    format!(
        "{} scenarios, {} passed, {} failed, {} skipped",
        result.total, passed, failed, skipped
    )
}

/// Error report for one failed runbook: the error text, plus the failing
/// step's YAML (re-rendered) for context when the file is readable.
pub fn failure_report(result: &RunResult) -> String {
    let mut report = color::red(result.err.as_deref().unwrap_or("unknown error"));
    if let Some(index) = result.first_failed_step() {
        if let Ok(content) = std::fs::read_to_string(&result.book_path) {
            let key = result
                .step_results
                .get(index)
                .map(|s| s.key.as_str());
            if let Some(snippet) = pick_step_yaml(&content, index, key) {
                report.push_str(&format!(
                    "\nFailure step ({}):\n{}",
                    result.book_path, snippet
                ));
            }
        }
    }
    report
}

/// Extract one step of a runbook as YAML.
///
/// `key` addresses map-form steps; `index` addresses list-form steps. The
/// step is re-rendered from the parsed document, so formatting may differ
/// from the source file.
pub fn pick_step_yaml(content: &str, index: usize, key: Option<&str>) -> Option<String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content).ok()?;
    let steps = doc.get("steps")?;
    match steps {
        serde_yaml::Value::Sequence(items) => {
            let step = items.get(index)?;
            let rendered = serde_yaml::to_string(step).ok()?;
            Some(indent(&rendered, "  ").trim_end().to_string())
        }
        serde_yaml::Value::Mapping(items) => {
            let key = key?;
            let step = items
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v)?;
            let rendered = serde_yaml::to_string(step).ok()?;
            Some(format!(
                "{}:\n{}",
                key,
                indent(&rendered, "  ").trim_end()
            ))
        }
        _ => None,
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
