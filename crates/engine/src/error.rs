// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! [`RunError`] covers everything that can go wrong while running; it is
//! `Clone` so results can carry it around freely. [`LoadError`] covers fleet
//! loading and operator construction. [`Error`] is the crate-level union.

use crate::expr::ExprError;
use std::time::Duration;
use thiserror::Error;

/// What kind of action a failed step was performing. Used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Http,
    Db,
    Grpc,
    Cdp,
    Ssh,
    Exec,
    Include,
    RunnerDefinition,
    Dump,
    Bind,
    Test,
}

drill_core::simple_display! {
    RunnerKind {
        Http => "http request",
        Db => "db query",
        Grpc => "gRPC request",
        Cdp => "cdp action",
        Ssh => "ssh command",
        Exec => "exec command",
        Include => "include",
        RunnerDefinition => "runner definition",
        Dump => "dump",
        Bind => "bind",
        Test => "test",
    }
}

/// Errors raised while running operators and fleets.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("{0}")]
    Config(String),

    #[error("{kind} failed on {step}: {message}")]
    Runner {
        kind: RunnerKind,
        step: String,
        message: String,
    },

    #[error("invalid runner: {0}")]
    InvalidRunner(String),

    #[error("retry loop failed on {step}.loop (count: {count}, {interval}): ({until}) is not true\n{trace}")]
    Loop {
        step: String,
        count: usize,
        interval: String,
        until: String,
        trace: String,
    },

    #[error("loop failed: {source}")]
    LoopIteration {
        #[source]
        source: Box<RunError>,
    },

    #[error("before hook error: {0}")]
    BeforeHook(String),

    #[error("after hook error: {0}")]
    AfterHook(String),

    #[error("failed to run {path}: {source}")]
    Book {
        path: String,
        #[source]
        source: Box<RunError>,
    },

    #[error("{0}")]
    Included(Box<RunError>),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("run canceled")]
    Canceled,

    #[error("timed out waiting for subtasks after {0:?}")]
    WaitTimeout(Duration),

    /// Internal sentinel: a step was skipped by `if:` or by a prior failure.
    /// Never surfaces to callers.
    #[error("step skipped")]
    StepSkipped,

    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Multi(Vec<RunError>),
}

impl RunError {
    /// Join two optional errors, flattening `Multi`.
    pub fn join(a: Option<RunError>, b: Option<RunError>) -> Option<RunError> {
        match (a, b) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => {
                let mut all = Vec::new();
                match a {
                    RunError::Multi(errs) => all.extend(errs),
                    other => all.push(other),
                }
                match b {
                    RunError::Multi(errs) => all.extend(errs),
                    other => all.push(other),
                }
                Some(RunError::Multi(all))
            }
        }
    }

    /// True for the internal skip sentinel.
    pub fn is_skip(&self) -> bool {
        matches!(self, RunError::StepSkipped)
    }

    /// True when the failure came from an included runbook that already
    /// reported itself.
    pub fn is_included(&self) -> bool {
        match self {
            RunError::Included(_) => true,
            RunError::Book { source, .. } => source.is_included(),
            RunError::LoopIteration { source } => source.is_included(),
            RunError::Multi(errs) => errs.iter().any(RunError::is_included),
            _ => false,
        }
    }
}

/// Errors raised while loading books and constructing operators.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] drill_runbook::ParseError),

    #[error(transparent)]
    Find(#[from] drill_runbook::FindError),

    #[error("cannot find runner ({path}): {name}")]
    UnknownRunner { path: String, name: String },

    #[error("unsupported runner target ({name}): {target}")]
    UnsupportedRunner { name: String, target: String },

    #[error("no runbooks has the id prefix: {0:?}")]
    NoIdMatch(Vec<String>),

    #[error("multiple runbooks have the same id prefix: {0:?}")]
    AmbiguousId(Vec<String>),

    #[error("`needs:` max depth exceeded: {0}")]
    NeedsTooDeep(usize),

    #[error("invalid run filter: {0}")]
    RunFilter(#[from] regex::Error),

    #[error("label filter error: {0}")]
    Label(String),

    #[error("this runbook is not allowed to run")]
    LoadOnly,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-level error union.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Run(#[from] RunError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
