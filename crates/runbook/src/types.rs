// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed runbook data types.

use crate::loop_spec::LoopDef;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Step sections that are not runner invocations.
pub const RESERVED_STEP_KEYS: &[&str] = &["if", "desc", "loop", "test", "dump", "bind"];

/// Runner names claimed by the engine itself.
pub const RESERVED_RUNNER_NAMES: &[&str] = &["exec", "include", "runner", "test", "dump", "bind", "steps"];

/// A parsed runbook file.
///
/// Holds everything the engine needs to build an operator: the steps, the
/// runner configurations they address, dependencies on other runbooks, and
/// the run-control sections. Parsing never touches the network or spawns
/// anything; a `Runbook` is inert data.
#[derive(Debug, Clone, Default)]
pub struct Runbook {
    /// Human description of the scenario.
    pub desc: String,
    /// Selection labels.
    pub labels: Vec<String>,
    /// Top-level run condition.
    pub if_cond: Option<String>,
    /// `needs:` alias to relative-path dependency mapping, in file order.
    pub needs: Vec<(String, String)>,
    /// Runner name to configuration payload.
    pub runners: Map<String, Value>,
    /// Initial variable bindings.
    pub vars: Map<String, Value>,
    /// Echo step activity to stderr.
    pub debug: bool,
    /// Pause between consecutive steps.
    pub interval: Option<Duration>,
    /// `loop:` spec for running the whole book repeatedly.
    pub loop_spec: Option<LoopDef>,
    /// Tags that serialize this book against others carrying the same tag.
    pub concurrency: Vec<String>,
    /// Keep running steps after a failure.
    pub force: bool,
    /// Skip `test:` sub-runners without failing their steps.
    pub skip_test: bool,
    /// This book's failure aborts the whole fleet run.
    pub fail_fast: bool,
    /// Steps in declaration order.
    pub steps: Vec<StepDef>,
    /// True when `steps:` used the keyed map form.
    pub use_map: bool,
    /// Source file, when parsed from disk.
    pub path: Option<PathBuf>,
}

impl Runbook {
    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }

    /// Path as a display string ("" for in-memory books).
    pub fn path_str(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// One parsed step.
#[derive(Debug, Clone, Default)]
pub struct StepDef {
    /// Position in the book.
    pub index: usize,
    /// Map key, or the stringified index in list mode.
    pub key: String,
    /// `desc:` section.
    pub desc: Option<String>,
    /// `if:` section.
    pub if_cond: Option<String>,
    /// `loop:` section.
    pub loop_spec: Option<LoopDef>,
    /// The single non-reserved key naming the runner to invoke.
    pub runner_key: Option<String>,
    /// Payload under the runner key (`Null` when the step has no runner).
    pub payload: Value,
    /// `bind:` variable name to expression.
    pub bind: Option<Map<String, Value>>,
    /// `dump:` section.
    pub dump: Option<DumpDef>,
    /// `test:` condition.
    pub test_cond: Option<String>,
}

/// Parsed `dump:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpDef {
    /// Expression to evaluate and print.
    pub expr: String,
    /// Output file path; stdout when empty.
    pub out: Option<String>,
    pub disable_trailing_newline: bool,
}
