// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook identifier generation.
//!
//! Every operator gets an id at construction time. Freshly built operators
//! carry a random id; once a fleet is loaded, ids are re-derived from the
//! runbook path so that repeated `drill list` / `drill run` invocations agree
//! on which id names which runbook. Users select runbooks by id prefix, so
//! ids must be long enough to make short prefixes unambiguous in practice.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hex id payload.
const ID_LEN: usize = 40;

/// Alphabet for random ids. Hex so random and path-derived ids look alike.
const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Generate a random runbook id.
pub fn random_id() -> RunbookId {
    RunbookId(nanoid::nanoid!(ID_LEN, &HEX))
}

/// Derive a stable runbook id from a runbook path.
///
/// The same path always maps to the same id, which keeps ids stable across
/// invocations as long as the file does not move.
pub fn path_id(path: &str) -> RunbookId {
    let digest = Sha256::digest(path.as_bytes());
    let mut hex = String::with_capacity(ID_LEN);
    for b in digest.iter() {
        if hex.len() >= ID_LEN {
            break;
        }
        hex.push(HEX[(b >> 4) as usize]);
        hex.push(HEX[(b & 0x0f) as usize]);
    }
    hex.truncate(ID_LEN);
    RunbookId(hex)
}

/// Identifier of one runbook (and its operator instances).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunbookId(String);

impl RunbookId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `prefix` is a forward match of this id.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(prefix)
    }

    /// Returns the id truncated to at most `n` characters.
    pub fn short(&self, n: usize) -> &str {
        let end = std::cmp::min(n, self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for RunbookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunbookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunbookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
