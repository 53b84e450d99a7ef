// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal color helpers for run output.

use std::io::IsTerminal;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Determine if color output should be enabled.
///
/// Priority: `NO_COLOR=1` disables → `COLOR=1` forces → TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn paint(code: &str, text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", code, text, RESET)
    } else {
        text.to_string()
    }
}

/// Failed runbooks and error lines.
pub fn red(text: &str) -> String {
    paint(RED, text)
}

/// Successful runbooks.
pub fn green(text: &str) -> String {
    paint(GREEN, text)
}

/// Skipped runbooks.
pub fn yellow(text: &str) -> String {
    paint(YELLOW, text)
}
