// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run result types.

use drill_core::Outcome;
use serde::Serialize;

/// Result of one runbook run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub id: String,
    pub book_path: String,
    pub desc: String,
    pub labels: Vec<String>,
    pub included: bool,
    pub err: Option<String>,
    pub skipped: bool,
    pub elapsed_ms: u64,
    pub step_results: Vec<StepResult>,
}

impl RunResult {
    pub fn failed(&self) -> bool {
        self.err.is_some()
    }

    /// Index of the first failed step, if any.
    pub fn first_failed_step(&self) -> Option<usize> {
        self.step_results
            .iter()
            .position(|s| s.outcome.is_failure())
    }
}

/// Result of one step within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Unit id (`<runbook id>?step=<i>`).
    pub id: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub err: Option<String>,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub included_run_results: Vec<RunResult>,
}

/// Result of one fleet invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetResult {
    /// Number of operators selected for the run.
    pub total: usize,
    pub run_results: Vec<RunResult>,
}

impl FleetResult {
    pub fn has_failure(&self) -> bool {
        self.run_results.iter().any(RunResult::failed)
    }

    pub fn failed(&self) -> Vec<&RunResult> {
        self.run_results.iter().filter(|r| r.failed()).collect()
    }
}
