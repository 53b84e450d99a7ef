// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step outcome classification.

use serde::{Deserialize, Serialize};

/// Outcome recorded for every step of a runbook run.
///
/// Exactly one of these is attached to each step's store entry: a step that
/// ran to completion is `Success`, a step whose runner or test errored is
/// `Failure`, and a step that never ran (false `if:`, prior failure, or a
/// skipped runbook) is `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

crate::simple_display! {
    Outcome {
        Success => "success",
        Failure => "failure",
        Skipped => "skipped",
    }
}
