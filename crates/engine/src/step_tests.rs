// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    list_mode      = { false, "0", 0, None, r#""login".steps[0]"# },
    list_with_loop = { false, "2", 2, Some(3), r#""login".steps[2].loop[3]"# },
    map_mode       = { true, "fetch", 1, None, r#""login".steps.fetch"# },
    map_with_loop  = { true, "fetch", 1, Some(0), r#""login".steps.fetch.loop[0]"# },
)]
fn step_name_formats(
    use_map: bool,
    key: &str,
    index: usize,
    loop_index: Option<usize>,
    expected: &str,
) {
    assert_eq!(step_name("login", use_map, key, index, loop_index), expected);
}

#[test]
fn to_result_defaults_to_skipped() {
    let step = Step::new(StepDef {
        index: 1,
        key: "1".to_string(),
        ..StepDef::default()
    });
    let result = step.to_result("bk0");
    assert_eq!(result.id, "bk0?step=1");
    assert_eq!(result.outcome, Outcome::Skipped);
    assert!(result.err.is_none());
}

#[test]
fn clear_result_keeps_definition() {
    let mut step = Step::new(StepDef {
        index: 0,
        key: "0".to_string(),
        desc: Some("keep me".to_string()),
        ..StepDef::default()
    });
    step.outcome = Some(Outcome::Failure);
    step.err = Some(RunError::Canceled);
    step.elapsed_ms = 12;
    step.clear_result();
    assert!(step.outcome.is_none());
    assert!(step.err.is_none());
    assert_eq!(step.elapsed_ms, 0);
    assert_eq!(step.def.desc.as_deref(), Some("keep me"));
}
