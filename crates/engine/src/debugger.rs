// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debugger attach hook.
//!
//! When a debugger is configured, the operator calls [`DebugHook::attach`]
//! before every step. An interactive debugger can pause there (breakpoints,
//! step-through); the default hook does nothing.

use crate::error::RunError;
use async_trait::async_trait;

/// Point-in-run information handed to the attach hook.
#[derive(Debug, Clone)]
pub struct AttachPoint {
    /// Diagnostic step name (`"<desc>".steps[<i>]`).
    pub step_name: String,
    pub step_index: usize,
    pub desc: Option<String>,
}

/// Hook invoked before each step runs.
#[async_trait]
pub trait DebugHook: Send + Sync {
    async fn attach(&self, point: &AttachPoint) -> Result<(), RunError>;
}

/// Hook that does nothing.
#[derive(Debug, Default)]
pub struct NoopHook;

#[async_trait]
impl DebugHook for NoopHook {
    async fn attach(&self, _point: &AttachPoint) -> Result<(), RunError> {
        Ok(())
    }
}
