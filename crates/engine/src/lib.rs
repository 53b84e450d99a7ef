// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drill-engine: operator and fleet scheduling for the drill scenario
//! engine.
//!
//! The [`Fleet`] loads runbooks, resolves their `needs:` dependency graph,
//! and schedules the selected set; each runbook runs under an
//! [`operator::Operator`] that sequences steps, evaluates conditions and
//! loops, and records results into a [`store::Store`] that the expression
//! language exposes to later steps.

pub mod capture;
pub mod concurrency;
pub mod debugger;
pub mod error;
pub mod expr;
pub mod fleet;
pub mod operator;
pub mod options;
pub mod result;
pub mod runner;
pub mod runners;
pub mod step;
pub mod store;
pub mod template;

pub use capture::{Capturer, Capturers, TracingCapturer};
pub use drill_core::{Outcome, RunbookId, Trails};
pub use debugger::{AttachPoint, DebugHook, NoopHook};
pub use error::{Error, LoadError, RunError, RunnerKind};
pub use expr::{eval, eval_cond, eval_count, eval_with_trace, is_truthy, EvalTrace, ExprError};
pub use fleet::{Fleet, ListEntry, MAX_NEEDS_DEPTH};
pub use operator::{Operator, OperatorContext, Published};
pub use options::{Hook, RunOptions, SCOPE_READ_PARENT};
pub use result::{FleetResult, RunResult, StepResult};
pub use runner::{RunnerError, RunnerRequest, StepRunner};
pub use runners::{build_runner, ExecRunner, HttpRunner};
pub use template::expand;
