// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `loop:` section parsing.

use crate::duration::parse_duration;
use crate::parser::ParseError;
use serde_json::Value;
use std::time::Duration;

/// Default iteration cap when `loop:` gives none.
pub const DEFAULT_COUNT: &str = "3";

/// A parsed `loop:` section, used both on steps and on whole runbooks.
///
/// `count` is an expression (it may reference the store) evaluated once at
/// loop entry. With `until` present the loop is a retry loop: it exits early
/// on the first true evaluation and fails if `until` never holds within
/// `count` iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopDef {
    /// Iteration cap expression.
    pub count: String,
    /// Early-exit condition.
    pub until: Option<String>,
    /// Fixed wait between iterations.
    pub interval: Option<Duration>,
    /// Randomized wait range between iterations.
    pub min_interval: Option<Duration>,
    pub max_interval: Option<Duration>,
}

impl Default for LoopDef {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT.to_string(),
            until: None,
            interval: None,
            min_interval: None,
            max_interval: None,
        }
    }
}

impl LoopDef {
    /// Parse from a `loop:` section value.
    ///
    /// Accepts a bare count (`loop: 5`, `loop: "len(vars.targets)"`) or a
    /// mapping with `count`, `until`, `interval`, `minInterval`, `maxInterval`.
    pub fn parse(value: &Value) -> Result<Self, ParseError> {
        match value {
            Value::Number(n) => Ok(Self {
                count: n.to_string(),
                ..Self::default()
            }),
            Value::String(s) => Ok(Self {
                count: s.clone(),
                ..Self::default()
            }),
            Value::Object(map) => {
                let mut def = Self::default();
                for (key, v) in map {
                    match key.as_str() {
                        "count" => {
                            def.count = match v {
                                Value::Number(n) => n.to_string(),
                                Value::String(s) => s.clone(),
                                other => {
                                    return Err(ParseError::invalid_section(
                                        "loop.count",
                                        other,
                                    ))
                                }
                            }
                        }
                        "until" => {
                            def.until = Some(
                                v.as_str()
                                    .ok_or_else(|| ParseError::invalid_section("loop.until", v))?
                                    .to_string(),
                            )
                        }
                        "interval" => def.interval = Some(parse_interval(v, "loop.interval")?),
                        "minInterval" => {
                            def.min_interval = Some(parse_interval(v, "loop.minInterval")?)
                        }
                        "maxInterval" => {
                            def.max_interval = Some(parse_interval(v, "loop.maxInterval")?)
                        }
                        other => {
                            return Err(ParseError::InvalidSection {
                                section: "loop".to_string(),
                                detail: format!("unknown field: {}", other),
                            })
                        }
                    }
                }
                def.validate()?;
                Ok(def)
            }
            other => Err(ParseError::invalid_section("loop", other)),
        }
    }

    fn validate(&self) -> Result<(), ParseError> {
        if self.interval.is_some() && (self.min_interval.is_some() || self.max_interval.is_some()) {
            return Err(ParseError::InvalidSection {
                section: "loop".to_string(),
                detail: "interval and minInterval/maxInterval are mutually exclusive".to_string(),
            });
        }
        if self.min_interval.is_some() != self.max_interval.is_some() {
            return Err(ParseError::InvalidSection {
                section: "loop".to_string(),
                detail: "minInterval and maxInterval must be given together".to_string(),
            });
        }
        if let (Some(min), Some(max)) = (self.min_interval, self.max_interval) {
            if min > max {
                return Err(ParseError::InvalidSection {
                    section: "loop".to_string(),
                    detail: "minInterval exceeds maxInterval".to_string(),
                });
            }
        }
        Ok(())
    }

    /// True when the loop retries until success rather than running a fixed count.
    pub fn is_retry(&self) -> bool {
        self.until.is_some()
    }

    /// Render the interval settings for diagnostics.
    pub fn interval_desc(&self) -> String {
        match (self.interval, self.min_interval, self.max_interval) {
            (Some(i), _, _) => format!("interval: {:?}", i),
            (None, Some(min), Some(max)) => {
                format!("minInterval: {:?}, maxInterval: {:?}", min, max)
            }
            _ => "interval: none".to_string(),
        }
    }
}

pub(crate) fn parse_interval(v: &Value, section: &str) -> Result<Duration, ParseError> {
    match v {
        Value::String(s) => {
            parse_duration(s).map_err(|e| ParseError::InvalidSection {
                section: section.to_string(),
                detail: e.to_string(),
            })
        }
        Value::Number(n) => {
            let secs = n.as_f64().unwrap_or(0.0);
            if secs < 0.0 {
                return Err(ParseError::InvalidSection {
                    section: section.to_string(),
                    detail: "negative interval".to_string(),
                });
            }
            Ok(Duration::from_secs_f64(secs))
        }
        other => Err(ParseError::invalid_section(section, other)),
    }
}

#[cfg(test)]
#[path = "loop_spec_tests.rs"]
mod tests;
