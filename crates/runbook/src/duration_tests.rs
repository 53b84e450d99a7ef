// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    ms_200       = { "200ms",  Duration::from_millis(200) },
    secs_30      = { "30s",    Duration::from_secs(30) },
    secs_bare    = { "30",     Duration::from_secs(30) },
    secs_frac    = { "0.5s",   Duration::from_millis(500) },
    mins_5       = { "5m",     Duration::from_secs(300) },
    mins_5min    = { "5min",   Duration::from_secs(300) },
    hours_1h     = { "1h",     Duration::from_secs(3600) },
    ws_leading   = { " 30s ",  Duration::from_secs(30) },
    ws_middle    = { "30 s",   Duration::from_secs(30) },
)]
fn parse_duration_valid(input: &str, expected: Duration) {
    assert_eq!(parse_duration(input).unwrap(), expected);
}

#[yare::parameterized(
    invalid_suffix = { "30x" },
    empty_string   = { "" },
    invalid_number = { "abcs" },
    double_dot     = { "1.2.3s" },
)]
fn parse_duration_invalid(input: &str) {
    assert!(parse_duration(input).is_err());
}
