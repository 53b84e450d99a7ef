// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command runner.

use crate::error::RunnerKind;
use crate::runner::{RunnerError, RunnerRequest, StepRunner};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;

/// Default cap on a single exec step.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs `exec:` steps through a shell.
///
/// Payload: `{command, shell?, dir?, env?, stdin?, timeout?}`. The recorded
/// entry is `{stdout, stderr, exit_code}`; a non-zero exit code is a result,
/// not an error (use `test:` to assert on it).
#[derive(Debug, Default)]
pub struct ExecRunner;

impl ExecRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepRunner for ExecRunner {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Exec
    }

    async fn run(&self, req: RunnerRequest) -> Result<Value, RunnerError> {
        let payload = req
            .payload
            .as_object()
            .ok_or_else(|| RunnerError::new("exec payload must be a mapping"))?;
        let command = payload
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| RunnerError::new("missing command"))?;
        let shell = payload
            .get("shell")
            .and_then(Value::as_str)
            .unwrap_or("sh");
        let timeout = match payload.get("timeout").and_then(Value::as_str) {
            Some(s) => drill_runbook::parse_duration(s).map_err(|e| RunnerError::new(e.to_string()))?,
            None => DEFAULT_TIMEOUT,
        };

        let mut cmd = tokio::process::Command::new(shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = payload.get("dir").and_then(Value::as_str) {
            cmd.current_dir(dir);
        }
        if let Some(env) = payload.get("env").and_then(Value::as_object) {
            for (key, value) in env {
                cmd.env(key, crate::expr::stringify(value));
            }
        }

        let mut child = cmd.spawn()?;
        if let Some(stdin) = payload.get("stdin").and_then(Value::as_str) {
            if let Some(mut pipe) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                pipe.write_all(stdin.as_bytes()).await?;
            }
        }
        drop(child.stdin.take());

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = req.cancel.cancelled() => {
                return Err(RunnerError::new("canceled"));
            }
            _ = tokio::time::sleep(timeout) => {
                return Err(RunnerError::new(format!("timed out after {:?}", timeout)));
            }
        };

        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": output.status.code().unwrap_or(-1),
        }))
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
