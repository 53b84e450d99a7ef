// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trails: identifier paths for running units.
//!
//! A [`Trail`] names one level of a running unit (runbook, loop iteration,
//! step, hook). A [`Trails`] is the full path from the root runbook down to
//! the unit currently executing. Serialized trails key the stopwatch tree and
//! give capturers a stable address for what is running.

use crate::id::RunbookId;
use serde::{Deserialize, Serialize};

/// What a trail entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailKind {
    Runbook,
    Loop,
    Step,
    BeforeHook,
    AfterHook,
}

crate::simple_display! {
    TrailKind {
        Runbook => "runbook",
        Loop => "loop",
        Step => "step",
        BeforeHook => "before_hook",
        AfterHook => "after_hook",
    }
}

/// One level of a running unit's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trail {
    #[serde(rename = "type")]
    pub kind: TrailKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runbook_id: Option<RunbookId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runbook_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl Trail {
    pub fn runbook(id: RunbookId, path: Option<String>, desc: Option<String>) -> Self {
        Self {
            kind: TrailKind::Runbook,
            runbook_id: Some(id),
            runbook_path: path,
            loop_index: None,
            step_index: None,
            step_key: None,
            hook_index: None,
            desc,
        }
    }

    pub fn loop_iteration(id: RunbookId, index: usize) -> Self {
        Self {
            kind: TrailKind::Loop,
            runbook_id: Some(id),
            runbook_path: None,
            loop_index: Some(index),
            step_index: None,
            step_key: None,
            hook_index: None,
            desc: None,
        }
    }

    pub fn step(id: RunbookId, index: usize, key: Option<String>, desc: Option<String>) -> Self {
        Self {
            kind: TrailKind::Step,
            runbook_id: Some(id),
            runbook_path: None,
            loop_index: None,
            step_index: Some(index),
            step_key: key,
            hook_index: None,
            desc,
        }
    }

    pub fn hook(id: RunbookId, kind: TrailKind, index: usize) -> Self {
        Self {
            kind,
            runbook_id: Some(id),
            runbook_path: None,
            loop_index: None,
            step_index: None,
            step_key: None,
            hook_index: Some(index),
            desc: None,
        }
    }

    /// Compact serialized form used as a stopwatch key.
    pub fn profile_id(&self) -> String {
        // Trail serialization cannot fail: all fields are strings and integers.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Ordered path of trails, outermost runbook first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trails(pub Vec<Trail>);

impl Trails {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, trail: Trail) {
        self.0.push(trail);
    }

    pub fn with(&self, trail: Trail) -> Self {
        let mut next = self.clone();
        next.push(trail);
        next
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stopwatch key path, one id per level.
    pub fn profile_ids(&self) -> Vec<String> {
        self.0.iter().map(Trail::profile_id).collect()
    }

    /// Identifier of the unit at the end of the path.
    ///
    /// Runbook levels contribute their id, nested runbooks are joined with
    /// `/`, and a step level appends `?step=<i>` to the innermost runbook id.
    pub fn unit_id(&self) -> String {
        let mut ids: Vec<String> = Vec::new();
        for trail in &self.0 {
            match trail.kind {
                TrailKind::Runbook => {
                    if let Some(id) = &trail.runbook_id {
                        ids.push(id.to_string());
                    }
                }
                TrailKind::Step => {
                    if let (Some(last), Some(idx)) = (ids.last_mut(), trail.step_index) {
                        last.push_str(&format!("?step={}", idx));
                    }
                }
                _ => {}
            }
        }
        ids.join("/")
    }
}

impl FromIterator<Trail> for Trails {
    fn from_iter<I: IntoIterator<Item = Trail>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "trail_tests.rs"]
mod tests;
