// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runners shipped with the engine.

pub mod exec;
pub mod http;

pub use exec::ExecRunner;
pub use http::HttpRunner;

use crate::error::LoadError;
use crate::runner::StepRunner;
use serde_json::Value;
use std::sync::Arc;

/// Build a runner from a `runners:` configuration entry.
///
/// An `http://`/`https://` target string (or a mapping with a `url` field)
/// yields an HTTP runner. Anything else is unsupported here and must be
/// registered as a custom [`StepRunner`].
pub fn build_runner(name: &str, config: &Value) -> Result<Arc<dyn StepRunner>, LoadError> {
    let target = match config {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        _ => String::new(),
    };
    if target.starts_with("http://") || target.starts_with("https://") {
        let runner = HttpRunner::new(&target).map_err(|e| LoadError::UnsupportedRunner {
            name: name.to_string(),
            target: format!("{}: {}", target, e),
        })?;
        return Ok(Arc::new(runner));
    }
    Err(LoadError::UnsupportedRunner {
        name: name.to_string(),
        target,
    })
}
