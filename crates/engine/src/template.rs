// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `${...}` expression expansion in step inputs.
//!
//! Runner payloads may embed expressions in strings. Before a runner sees
//! its payload, every string is expanded against the store scope: a string
//! that is exactly one placeholder keeps the evaluated value's JSON type,
//! while embedded placeholders are stringified in place.

use crate::expr::{eval, stringify, ExprError};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("constant regex pattern is valid"));

/// Deep-expand `${expr}` placeholders in `input` against `scope`.
///
/// Arrays and objects are walked recursively (object keys are left alone).
/// Non-string scalars pass through unchanged.
pub fn expand(input: &Value, scope: &Value) -> Result<Value, ExprError> {
    match input {
        Value::String(s) => expand_str(s, scope),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| expand(item, scope))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), expand(value, scope)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn expand_str(s: &str, scope: &Value) -> Result<Value, ExprError> {
    // Whole-string placeholder keeps the evaluated type.
    if let Some(caps) = PLACEHOLDER.captures(s) {
        if let Some(whole) = caps.get(0) {
            if whole.start() == 0 && whole.end() == s.len() {
                return eval(&caps[1], scope);
            }
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&s[last..whole.start()]);
        let value = eval(&caps[1], scope)?;
        out.push_str(&stringify(&value));
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
