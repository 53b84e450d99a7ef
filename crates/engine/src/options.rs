// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run options shared by operators and the fleet planner.

use crate::runner::StepRunner;
use std::sync::Arc;
use std::time::Duration;

/// A before/after hook. Errors abort (before) or override (after) the run.
pub type Hook = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Scope allowing includes of runbooks outside the including book's
/// directory tree.
pub const SCOPE_READ_PARENT: &str = "read:parent";

/// Options applied when loading and running a fleet.
#[derive(Clone)]
pub struct RunOptions {
    /// Upper bound on concurrently running operators.
    pub concurrent_max: usize,
    /// Shuffle the selected set with this seed.
    pub shuffle_seed: Option<u64>,
    /// Keep only every `n`-th operator: `(shard_n, shard_index)`.
    pub shard: Option<(usize, usize)>,
    /// Pick this many operators without replacement.
    pub sample: Option<usize>,
    /// Pick this many operators with replacement, rebuilding each pick.
    pub random: Option<usize>,
    /// Regex over runbook paths (`DRILL_RUN`).
    pub run_match: Option<String>,
    /// Id prefixes to select, in user order (`DRILL_ID`).
    pub run_ids: Vec<String>,
    /// Label expressions (`DRILL_LABEL`).
    pub run_labels: Vec<String>,
    /// Granted runner-visibility scopes (`DRILL_SCOPES`), e.g. `read:parent`
    /// to allow including runbooks from outside the book's directory.
    pub scopes: Vec<String>,
    pub skip_test: bool,
    pub force: bool,
    pub fail_fast: bool,
    pub debug: bool,
    pub profile: bool,
    /// Exclude runbooks that another selected runbook includes.
    pub skip_included: bool,
    /// Load for listing only; running is an error.
    pub load_only: bool,
    /// Grace period for subtasks after cancellation.
    pub wait_timeout: Duration,
    /// Extra runners registered by name (test scaffolding, db/grpc/ssh
    /// integrations). These take precedence over `runners:` sections.
    pub runners: Vec<(String, Arc<dyn StepRunner>)>,
    pub before_hooks: Vec<Hook>,
    pub after_hooks: Vec<Hook>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrent_max: 1,
            shuffle_seed: None,
            shard: None,
            sample: None,
            random: None,
            run_match: None,
            run_ids: Vec::new(),
            run_labels: Vec::new(),
            scopes: Vec::new(),
            skip_test: false,
            force: false,
            fail_fast: false,
            debug: false,
            profile: false,
            skip_included: false,
            load_only: false,
            wait_timeout: Duration::from_secs(10),
            runners: Vec::new(),
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
        }
    }
}

impl RunOptions {
    /// Register a runner by name.
    pub fn with_runner(mut self, name: impl Into<String>, runner: Arc<dyn StepRunner>) -> Self {
        self.runners.push((name.into(), runner));
        self
    }

    pub fn with_before_hook(mut self, hook: Hook) -> Self {
        self.before_hooks.push(hook);
        self
    }

    pub fn with_after_hook(mut self, hook: Hook) -> Self {
        self.after_hooks.push(hook);
        self
    }
}
