// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook parsing (syntactic layer).
//!
//! Files are decoded into `serde_json::Value` trees (YAML by way of
//! [`yaml_to_json`]) and then dissected section by section. Step payloads
//! stay untyped: a step is a mapping whose reserved sections (`if`, `desc`,
//! `loop`, `test`, `dump`, `bind`) are split off and whose single remaining
//! key names the runner to invoke.

use crate::loop_spec::{parse_interval, LoopDef};
use crate::types::{DumpDef, Runbook, StepDef, RESERVED_RUNNER_NAMES, RESERVED_STEP_KEYS};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

/// Supported runbook file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

/// Pick a format from a file extension; `None` for non-runbook files.
pub fn format_for_path(path: &Path) -> Option<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => Some(Format::Yaml),
        Some("json") => Some(Format::Json),
        _ => None,
    }
}

/// Errors from runbook parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("yaml syntax error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json syntax error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("runbook must be a mapping")]
    NotMapping,
    #[error("invalid {section} section: {detail}")]
    InvalidSection { section: String, detail: String },
    #[error("step {step} has multiple runner keys: {keys}")]
    MultipleRunnerKeys { step: String, keys: String },
    #[error("runner name is reserved: {0}")]
    ReservedRunnerName(String),
    #[error("unsupported runbook extension: {0}")]
    UnsupportedExtension(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub(crate) fn invalid_section(section: &str, value: &Value) -> Self {
        Self::InvalidSection {
            section: section.to_string(),
            detail: format!("unexpected value: {}", value),
        }
    }
}

/// Convert a YAML tree to an (insertion-ordered) JSON tree.
///
/// Non-string mapping keys are stringified; tags are dropped, keeping the
/// tagged value.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                map.insert(key, yaml_to_json(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Parse a runbook from a string.
pub fn parse_runbook(content: &str, format: Format) -> Result<Runbook, ParseError> {
    let root = match format {
        Format::Yaml => yaml_to_json(serde_yaml::from_str(content)?),
        Format::Json => serde_json::from_str(content)?,
    };
    from_value(root)
}

/// Parse a runbook file, picking the format from the extension.
pub fn parse_runbook_file(path: &Path) -> Result<Runbook, ParseError> {
    let format = format_for_path(path)
        .ok_or_else(|| ParseError::UnsupportedExtension(path.to_string_lossy().to_string()))?;
    let content = std::fs::read_to_string(path)?;
    let mut book = parse_runbook(&content, format)?;
    book.path = Some(path.to_path_buf());
    Ok(book)
}

fn from_value(root: Value) -> Result<Runbook, ParseError> {
    let Value::Object(map) = root else {
        return Err(ParseError::NotMapping);
    };

    let mut book = Runbook::default();
    for (key, value) in map {
        match key.as_str() {
            "desc" => book.desc = as_string(&value, "desc")?,
            "labels" => book.labels = as_string_list(&value, "labels")?,
            "if" => book.if_cond = Some(as_string(&value, "if")?),
            "needs" => book.needs = parse_needs(&value)?,
            "runners" => book.runners = parse_runners(&value)?,
            "vars" => book.vars = as_object(&value, "vars")?,
            "debug" => book.debug = as_bool(&value, "debug")?,
            "interval" => book.interval = Some(parse_interval(&value, "interval")?),
            "loop" => book.loop_spec = Some(LoopDef::parse(&value)?),
            "concurrency" => book.concurrency = as_string_list(&value, "concurrency")?,
            "force" => book.force = as_bool(&value, "force")?,
            "skipTest" => book.skip_test = as_bool(&value, "skipTest")?,
            "failFast" => book.fail_fast = as_bool(&value, "failFast")?,
            "steps" => parse_steps(&value, &mut book)?,
            other => {
                tracing::warn!(section = other, "ignoring unknown runbook section");
            }
        }
    }
    Ok(book)
}

fn parse_steps(value: &Value, book: &mut Runbook) -> Result<(), ParseError> {
    match value {
        Value::Array(items) => {
            book.use_map = false;
            for (index, item) in items.iter().enumerate() {
                let map = step_mapping(item, &index.to_string())?;
                book.steps.push(parse_step(index, index.to_string(), map)?);
            }
            Ok(())
        }
        Value::Object(items) => {
            book.use_map = true;
            for (index, (key, item)) in items.iter().enumerate() {
                let map = step_mapping(item, key)?;
                book.steps.push(parse_step(index, key.clone(), map)?);
            }
            Ok(())
        }
        other => Err(ParseError::invalid_section("steps", other)),
    }
}

fn step_mapping(value: &Value, key: &str) -> Result<Map<String, Value>, ParseError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| ParseError::InvalidSection {
            section: format!("steps.{}", key),
            detail: "step must be a mapping".to_string(),
        })
}

fn parse_step(index: usize, key: String, mut map: Map<String, Value>) -> Result<StepDef, ParseError> {
    let mut step = StepDef {
        index,
        key: key.clone(),
        ..StepDef::default()
    };

    if let Some(v) = map.shift_remove("if") {
        step.if_cond = Some(as_string(&v, "if")?);
    }
    if let Some(v) = map.shift_remove("desc") {
        step.desc = Some(as_string(&v, "desc")?);
    }
    if let Some(v) = map.shift_remove("loop") {
        step.loop_spec = Some(LoopDef::parse(&v)?);
    }
    if let Some(v) = map.shift_remove("test") {
        step.test_cond = Some(match v {
            Value::Bool(b) => b.to_string(),
            Value::String(s) => s,
            other => return Err(ParseError::invalid_section("test", &other)),
        });
    }
    if let Some(v) = map.shift_remove("dump") {
        step.dump = Some(parse_dump(&v)?);
    }
    if let Some(v) = map.shift_remove("bind") {
        step.bind = Some(as_object(&v, "bind")?);
    }

    let mut remaining: Vec<String> = map.keys().cloned().collect();
    match remaining.len() {
        0 => {}
        1 => {
            let runner_key = remaining.remove(0);
            // map always holds runner_key here
            step.payload = map.shift_remove(&runner_key).unwrap_or(Value::Null);
            step.runner_key = Some(runner_key);
        }
        _ => {
            return Err(ParseError::MultipleRunnerKeys {
                step: key,
                keys: remaining.join(", "),
            })
        }
    }
    Ok(step)
}

fn parse_dump(value: &Value) -> Result<DumpDef, ParseError> {
    match value {
        Value::String(expr) => Ok(DumpDef {
            expr: expr.clone(),
            out: None,
            disable_trailing_newline: false,
        }),
        Value::Object(map) => {
            let expr = map
                .get("expr")
                .and_then(Value::as_str)
                .ok_or_else(|| ParseError::InvalidSection {
                    section: "dump".to_string(),
                    detail: "missing expr".to_string(),
                })?
                .to_string();
            let out = map
                .get("out")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let disable_trailing_newline = map
                .get("disableTrailingNewline")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(DumpDef {
                expr,
                out,
                disable_trailing_newline,
            })
        }
        other => Err(ParseError::invalid_section("dump", other)),
    }
}

fn parse_needs(value: &Value) -> Result<Vec<(String, String)>, ParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid_section("needs", value))?;
    let mut needs = Vec::with_capacity(map.len());
    for (alias, path) in map {
        let path = path
            .as_str()
            .ok_or_else(|| ParseError::invalid_section("needs", value))?;
        needs.push((alias.clone(), path.to_string()));
    }
    Ok(needs)
}

fn parse_runners(value: &Value) -> Result<Map<String, Value>, ParseError> {
    let runners = as_object(value, "runners")?;
    for name in runners.keys() {
        if RESERVED_RUNNER_NAMES.contains(&name.as_str())
            || RESERVED_STEP_KEYS.contains(&name.as_str())
        {
            return Err(ParseError::ReservedRunnerName(name.clone()));
        }
    }
    Ok(runners)
}

fn as_string(value: &Value, section: &str) -> Result<String, ParseError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParseError::invalid_section(section, value))
}

fn as_bool(value: &Value, section: &str) -> Result<bool, ParseError> {
    value
        .as_bool()
        .ok_or_else(|| ParseError::invalid_section(section, value))
}

fn as_object(value: &Value, section: &str) -> Result<Map<String, Value>, ParseError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| ParseError::invalid_section(section, value))
}

fn as_string_list(value: &Value, section: &str) -> Result<Vec<String>, ParseError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| as_string(v, section))
            .collect::<Result<Vec<_>, _>>(),
        other => Err(ParseError::invalid_section(section, other)),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
