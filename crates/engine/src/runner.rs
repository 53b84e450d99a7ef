// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner contract.
//!
//! A runner performs one step's action: it receives the step's expanded
//! payload and returns a JSON value that becomes the step's store entry.
//! Runners for protocols the engine does not ship (db, gRPC, ssh, browser)
//! implement this trait and are registered by name, either through
//! [`RunOptions::with_runner`](crate::fleet::RunOptions) or a `runner:`
//! definition step.

use crate::error::RunnerKind;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What a runner gets handed for one step.
pub struct RunnerRequest {
    /// Step payload with `${...}` placeholders already expanded.
    pub payload: Value,
    /// Diagnostic step name (`"<desc>".steps[<i>]`).
    pub step_name: String,
    /// Cancelled when the run is aborted; runners should return promptly.
    pub cancel: CancellationToken,
}

/// Error from a runner. The operator wraps it with the runner kind and the
/// step name, so the message should only describe the cause.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RunnerError(pub String);

impl RunnerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

impl From<reqwest::Error> for RunnerError {
    fn from(e: reqwest::Error) -> Self {
        Self(e.to_string())
    }
}

/// A step action: run, optionally renew between book-loop iterations, and
/// optionally close.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Runner kind used in error messages.
    fn kind(&self) -> RunnerKind;

    /// Perform the step. The returned value is recorded as the step entry.
    async fn run(&self, req: RunnerRequest) -> Result<Value, RunnerError>;

    /// Reinitialize the runner (between book-loop iterations).
    async fn renew(&self) -> Result<(), RunnerError> {
        Ok(())
    }

    /// Release resources. Close errors are swallowed by the operator.
    async fn close(&self) -> Result<(), RunnerError> {
        Ok(())
    }

    /// True when the runner has no real target (test-injected) and must be
    /// left alone by a non-force close.
    fn detached_target(&self) -> bool {
        false
    }
}
