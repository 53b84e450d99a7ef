// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime step state.

use crate::error::RunError;
use crate::result::{RunResult, StepResult};
use drill_core::Outcome;
use drill_runbook::StepDef;

/// One step of a running operator: the parsed definition plus the state the
/// current run accumulates on it.
#[derive(Debug, Clone)]
pub struct Step {
    pub def: StepDef,
    /// Current loop iteration, while the step's `loop:` is running.
    pub loop_index: Option<usize>,
    pub outcome: Option<Outcome>,
    pub err: Option<RunError>,
    pub elapsed_ms: u64,
    /// Results of runbooks run by an `include:` on this step.
    pub included_run_results: Vec<RunResult>,
}

impl Step {
    pub fn new(def: StepDef) -> Self {
        Self {
            def,
            loop_index: None,
            outcome: None,
            err: None,
            elapsed_ms: 0,
            included_run_results: Vec::new(),
        }
    }

    /// Reset run state (kept definition) before a fresh pass.
    pub fn clear_result(&mut self) {
        self.loop_index = None;
        self.outcome = None;
        self.err = None;
        self.elapsed_ms = 0;
        self.included_run_results.clear();
    }

    pub fn to_result(&self, runbook_id: &str) -> StepResult {
        StepResult {
            id: format!("{}?step={}", runbook_id, self.def.index),
            key: self.def.key.clone(),
            desc: self.def.desc.clone(),
            err: self.err.as_ref().map(|e| e.to_string()),
            outcome: self.outcome.unwrap_or(Outcome::Skipped),
            elapsed_ms: self.elapsed_ms,
            included_run_results: self.included_run_results.clone(),
        }
    }
}

/// Diagnostic step name.
///
/// List mode: `"<desc>".steps[<i>]`; map mode: `"<desc>".steps.<key>`;
/// inside a loop a `.loop[<j>]` suffix is appended.
pub fn step_name(
    desc: &str,
    use_map: bool,
    key: &str,
    index: usize,
    loop_index: Option<usize>,
) -> String {
    let suffix = loop_index
        .map(|j| format!(".loop[{}]", j))
        .unwrap_or_default();
    if use_map {
        format!("{:?}.steps.{}{}", desc, key, suffix)
    } else {
        format!("{:?}.steps[{}]{}", desc, index, suffix)
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
