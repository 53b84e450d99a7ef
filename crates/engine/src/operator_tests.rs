// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drill_runbook::{parse_runbook, Format};
use std::sync::atomic::{AtomicUsize, Ordering};

fn operator(yaml: &str) -> Operator {
    operator_with(yaml, OperatorContext::default(), &RunOptions::default())
}

fn operator_with(yaml: &str, ctx: OperatorContext, opts: &RunOptions) -> Operator {
    let book = parse_runbook(yaml, Format::Yaml).unwrap();
    Operator::new(book, RunbookId::from_string("bk-test"), ctx, opts).unwrap()
}

async fn run(op: &mut Operator) -> RunResult {
    op.run(CancellationToken::new()).await
}

fn outcomes(result: &RunResult) -> Vec<Outcome> {
    result.step_results.iter().map(|s| s.outcome).collect()
}

// =============================================================================
// sequential success (bind + test)
// =============================================================================

#[tokio::test]
async fn two_step_bind_then_test_succeeds() {
    let mut op = operator(
        r#"
desc: seq
steps:
  - bind:
      x: "1"
  - test: current.x == 1
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert_eq!(outcomes(&result), vec![Outcome::Success, Outcome::Success]);
    assert!(!result.skipped);
}

#[tokio::test]
async fn store_length_equals_step_count_on_success_and_failure() {
    let mut ok = operator(
        r#"
desc: ok
steps:
  - bind: {a: "1"}
  - bind: {b: "2"}
  - test: true
"#,
    );
    let result = run(&mut ok).await;
    assert!(result.err.is_none());
    assert_eq!(ok.store().len(), 3);

    let mut failing = operator(
        r#"
desc: failing
steps:
  - bind: {a: "1"}
  - test: false
  - bind: {c: "3"}
"#,
    );
    let result = run(&mut failing).await;
    assert!(result.err.is_some());
    assert_eq!(failing.store().len(), 3);
}

#[tokio::test]
async fn previous_refers_to_the_prior_step_entry() {
    let mut op = operator(
        r#"
desc: prev
steps:
  - bind: {token: "'abc'"}
  - if: previous.token == "abc"
    bind: {seen: "true"}
  - test: current.seen == true
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert_eq!(
        outcomes(&result),
        vec![Outcome::Success, Outcome::Success, Outcome::Success]
    );
}

// =============================================================================
// failure propagation and force
// =============================================================================

#[tokio::test]
async fn failure_skips_subsequent_steps() {
    let mut op = operator(
        r#"
desc: failfast
steps:
  - bind: {a: "1"}
  - test: false
  - bind: {b: "2"}
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_some());
    assert_eq!(
        outcomes(&result),
        vec![Outcome::Success, Outcome::Failure, Outcome::Skipped]
    );
    assert_eq!(result.first_failed_step(), Some(1));
}

#[tokio::test]
async fn force_keeps_running_after_failure() {
    let opts = RunOptions {
        force: true,
        ..RunOptions::default()
    };
    let mut op = operator_with(
        r#"
desc: forced
steps:
  - bind: {a: "1"}
  - test: false
  - bind: {b: "2"}
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_some());
    assert_eq!(
        outcomes(&result),
        vec![Outcome::Success, Outcome::Failure, Outcome::Success]
    );
}

#[tokio::test]
async fn step_test_failure_message_names_the_step() {
    let mut op = operator(
        r#"
desc: named
steps:
  - test: 1 == 2
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains(r#"test failed on "named".steps[0]"#), "got: {err}");
    assert!(err.contains("1 == 2"), "trace missing: {err}");
}

// =============================================================================
// if conditions
// =============================================================================

#[tokio::test]
async fn false_if_skips_step_without_failing() {
    let mut op = operator(
        r#"
desc: conditional
steps:
  - if: "false"
    bind: {a: "1"}
  - bind: {b: "2"}
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none());
    assert_eq!(outcomes(&result), vec![Outcome::Skipped, Outcome::Success]);
}

#[tokio::test]
async fn top_level_false_if_skips_whole_book_and_hooks() {
    let before_calls = Arc::new(AtomicUsize::new(0));
    let after_calls = Arc::new(AtomicUsize::new(0));
    let before = Arc::clone(&before_calls);
    let after = Arc::clone(&after_calls);
    let opts = RunOptions::default()
        .with_before_hook(Arc::new(move || {
            before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .with_after_hook(Arc::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    let mut op = operator_with(
        r#"
desc: disabled
if: "false"
steps:
  - bind: {a: "1"}
  - bind: {b: "2"}
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none());
    assert!(result.skipped);
    assert_eq!(outcomes(&result), vec![Outcome::Skipped, Outcome::Skipped]);
    assert_eq!(op.store().len(), 2);
    assert_eq!(before_calls.load(Ordering::SeqCst), 0);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// hooks
// =============================================================================

#[tokio::test]
async fn before_hook_error_aborts_without_running_steps_or_after_hooks() {
    let after_calls = Arc::new(AtomicUsize::new(0));
    let after = Arc::clone(&after_calls);
    let opts = RunOptions::default()
        .with_before_hook(Arc::new(|| Err("setup failed".to_string())))
        .with_after_hook(Arc::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    let mut op = operator_with(
        r#"
desc: hooks
steps:
  - bind: {a: "1"}
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("before hook error: setup failed"), "got: {err}");
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn after_hook_error_overrides_step_error() {
    let opts = RunOptions::default()
        .with_after_hook(Arc::new(|| Err("teardown failed".to_string())));
    let mut op = operator_with(
        r#"
desc: hooks
steps:
  - test: false
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("after hook error: teardown failed"), "got: {err}");
    assert!(!err.contains("test failed"), "after hook must override: {err}");
}

#[tokio::test]
async fn after_hooks_run_on_step_failure() {
    let after_calls = Arc::new(AtomicUsize::new(0));
    let after = Arc::clone(&after_calls);
    let opts = RunOptions::default().with_after_hook(Arc::new(move || {
        after.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    let mut op = operator_with(
        r#"
desc: hooks
steps:
  - test: false
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_some());
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// loops
// =============================================================================

#[tokio::test]
async fn loop_until_exits_on_first_true_evaluation() {
    let mut op = operator(
        r#"
desc: poll
vars:
  n: 0
steps:
  - loop:
      count: 5
      until: current.n >= 3
    bind:
      n: vars.n + 1
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert_eq!(outcomes(&result), vec![Outcome::Success]);
    // Exactly three iterations ran; only the terminal one persists.
    assert_eq!(op.store().len(), 1);
    assert_eq!(op.store().latest().unwrap()["n"], serde_json::json!(3));
    assert_eq!(op.store().bind_vars["n"], serde_json::json!(3));
}

#[tokio::test]
async fn loop_without_until_runs_exactly_count_iterations() {
    let mut op = operator(
        r#"
desc: fixed
vars:
  n: 0
steps:
  - loop: 4
    bind:
      n: vars.n + 1
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none());
    assert_eq!(op.store().bind_vars["n"], serde_json::json!(4));
    assert_eq!(op.store().len(), 1);
}

#[tokio::test]
async fn exhausted_retry_loop_fails_with_trace() {
    let mut op = operator(
        r#"
desc: poll
vars:
  n: 0
steps:
  - loop:
      count: 2
      until: current.n >= 10
    bind:
      n: vars.n + 1
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(
        err.contains(r#"retry loop failed on "poll".steps[0].loop (count: 2"#),
        "got: {err}"
    );
    assert!(err.contains("(current.n >= 10) is not true"), "got: {err}");
    assert!(err.contains("current.n => 2"), "trace missing: {err}");
    assert_eq!(outcomes(&result), vec![Outcome::Failure]);
}

#[tokio::test]
async fn loop_index_is_cleared_after_the_loop() {
    let mut op = operator(
        r#"
desc: cleanup
vars:
  n: 0
steps:
  - loop: 2
    bind:
      n: vars.n + 1
  - test: loop == null
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert!(op.store().loop_index.is_none());
}

// =============================================================================
// exec runner through the operator
// =============================================================================

#[tokio::test]
async fn exec_step_records_output_for_later_steps() {
    let mut op = operator(
        r#"
desc: shell
steps:
  - exec:
      command: echo hello
  - test: current.exit_code == 0 && current.stdout == "hello\n"
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

#[tokio::test]
async fn exec_failure_wraps_with_step_name() {
    let mut op = operator(
        r#"
desc: shell
steps:
  - exec:
      missing_command_key: true
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(
        err.contains(r#"exec command failed on "shell".steps[0]"#),
        "got: {err}"
    );
}

#[tokio::test]
async fn payload_placeholders_are_expanded() {
    let mut op = operator(
        r#"
desc: expanded
vars:
  word: drill
steps:
  - exec:
      command: echo ${vars.word}
  - test: current.stdout == "drill\n"
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

// =============================================================================
// invalid steps / skip_test
// =============================================================================

#[tokio::test]
async fn step_with_no_runner_at_all_is_invalid() {
    let mut op = operator(
        r#"
desc: empty step
steps:
  - desc: does nothing
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("invalid runner"), "got: {err}");
}

#[tokio::test]
async fn unknown_runner_key_fails_at_construction() {
    let book = parse_runbook(
        r#"
desc: unknown
steps:
  - ghost:
      payload: 1
"#,
        Format::Yaml,
    )
    .unwrap();
    let err = Operator::new(
        book,
        RunbookId::from_string("bk-x"),
        OperatorContext::default(),
        &RunOptions::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, LoadError::UnknownRunner { name, .. } if name == "ghost"));
}

#[tokio::test]
async fn skip_test_skips_test_without_failing_the_step() {
    let opts = RunOptions {
        skip_test: true,
        ..RunOptions::default()
    };
    let mut op = operator_with(
        r#"
desc: skipping
steps:
  - bind: {a: "1"}
    test: "false"
  - test: "false"
"#,
        OperatorContext::default(),
        &opts,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    // Step 0 still ran its bind; step 1 had nothing left to run.
    assert_eq!(outcomes(&result), vec![Outcome::Success, Outcome::Skipped]);
}

// =============================================================================
// map mode
// =============================================================================

#[tokio::test]
async fn map_mode_records_entries_by_key() {
    let mut op = operator(
        r#"
desc: keyed
steps:
  login:
    bind: {token: "'t-1'"}
  check:
    test: steps.login.token == "t-1"
"#,
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert_eq!(result.step_results[0].key, "login");
    assert_eq!(result.step_results[1].key, "check");
}

#[tokio::test]
async fn map_mode_failure_message_uses_the_key() {
    let mut op = operator(
        r#"
desc: keyed
steps:
  verify:
    test: "false"
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains(r#""keyed".steps.verify"#), "got: {err}");
}

// =============================================================================
// needs / publish
// =============================================================================

#[tokio::test]
async fn needs_values_come_from_the_waitmap() {
    let ctx = OperatorContext::default();
    let mut published = Map::new();
    published.insert("token".to_string(), serde_json::json!("t-42"));
    ctx.wm.set(
        "dep.yml",
        Published {
            bind_vars: published,
        },
    );
    let mut op = operator_with(
        r#"
desc: dependent
needs:
  auth: dep.yml
steps:
  - test: needs.auth.token == "t-42"
"#,
        ctx,
        &RunOptions::default(),
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

#[tokio::test]
async fn dependency_with_no_outputs_resolves_to_null() {
    let ctx = OperatorContext::default();
    ctx.wm.set("dep.yml", Published::default());
    let mut op = operator_with(
        r#"
desc: dependent
needs:
  auth: dep.yml
steps:
  - test: needs.auth == null
"#,
        ctx,
        &RunOptions::default(),
    );
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

#[tokio::test]
async fn operator_publishes_even_when_failing() {
    let ctx = OperatorContext::default();
    let wm = ctx.wm.clone();
    let mut op = operator_with(
        r#"
desc: failing publisher
steps:
  - bind: {partial: "'yes'"}
  - test: "false"
"#,
        ctx,
        &RunOptions::default(),
    );
    let result = run(&mut op).await;
    assert!(result.err.is_some());
    let published = wm.get(&op.book_path_or_id()).unwrap();
    assert_eq!(published.bind_vars["partial"], serde_json::json!("yes"));
}

// =============================================================================
// cancellation
// =============================================================================

#[tokio::test]
async fn cancelled_run_skips_remaining_steps() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut op = operator(
        r#"
desc: canceled
steps:
  - bind: {a: "1"}
  - bind: {b: "2"}
"#,
    );
    let result = op.run(cancel).await;
    let err = result.err.unwrap();
    assert!(err.contains("run canceled"), "got: {err}");
    assert_eq!(outcomes(&result), vec![Outcome::Skipped, Outcome::Skipped]);
}

// =============================================================================
// runner definition steps
// =============================================================================

#[tokio::test]
async fn runner_definition_registers_a_runner_for_later_steps() {
    let book = parse_runbook(
        r#"
desc: dynamic
steps:
  - runner:
      name: api
      url: http://127.0.0.1:1
  - api:
      path: /health
"#,
        Format::Yaml,
    )
    .unwrap();
    // Construction succeeds: "api" resolves at run time.
    let mut op = Operator::new(
        book,
        RunbookId::from_string("bk-d"),
        OperatorContext::default(),
        &RunOptions::default(),
    )
    .unwrap();
    let result = run(&mut op).await;
    // The request itself fails (nothing listens on port 1), but it must be
    // an http error on step 1, not an invalid-runner error.
    let err = result.err.unwrap();
    assert!(err.contains("http request failed on"), "got: {err}");
    assert_eq!(
        outcomes(&result),
        vec![Outcome::Success, Outcome::Failure]
    );
}

// =============================================================================
// book-level loop
// =============================================================================

#[tokio::test]
async fn book_level_loop_reruns_the_body() {
    let ctx = OperatorContext::default();
    let kv = ctx.kv.clone();
    kv.set("count", serde_json::json!(0));
    let mut op = operator_with(
        r#"
desc: looped book
loop: 3
steps:
  - bind: {tick: "kv.count"}
"#,
        ctx,
        &RunOptions::default(),
    );
    // Each pass clears and re-records the single step.
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    assert_eq!(op.store().len(), 1);
}

#[tokio::test]
async fn book_level_retry_loop_reports_like_step_loops() {
    let mut op = operator(
        r#"
desc: never
loop:
  count: 2
  until: vars.ready == true
steps:
  - bind: {attempt: "'again'"}
"#,
    );
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("retry loop failed on"), "got: {err}");
    assert!(err.contains("(vars.ready == true) is not true"), "got: {err}");
}

// =============================================================================
// include
// =============================================================================

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn operator_from_file(path: &Path) -> Operator {
    let book = parse_runbook_file(path).unwrap();
    Operator::new(
        book,
        RunbookId::from_string("bk-outer"),
        OperatorContext::default(),
        &RunOptions::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn include_runs_the_nested_book_and_exposes_its_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(
        tmp.path(),
        "child.yml",
        r#"
desc: child
steps:
  - bind: {token: "'inner-t'"}
"#,
    );
    let outer = write_file(
        tmp.path(),
        "outer.yml",
        r#"
desc: outer
steps:
  - include: child.yml
  - test: current.vars.token == "inner-t"
"#,
    );
    let mut op = operator_from_file(&outer);
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
    let included = &result.step_results[0].included_run_results;
    assert_eq!(included.len(), 1);
    assert!(included[0].included);
    assert!(!included[0].failed());
}

#[tokio::test]
async fn include_passes_vars_to_the_nested_book() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(
        tmp.path(),
        "child.yml",
        r#"
desc: child
vars:
  who: default
steps:
  - test: vars.who == "caller"
"#,
    );
    let outer = write_file(
        tmp.path(),
        "outer.yml",
        r#"
desc: outer
steps:
  - include:
      path: child.yml
      vars:
        who: caller
"#,
    );
    let mut op = operator_from_file(&outer);
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

#[tokio::test]
async fn include_failure_fails_the_outer_step() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(
        tmp.path(),
        "child.yml",
        r#"
desc: child
steps:
  - test: "false"
"#,
    );
    let outer = write_file(
        tmp.path(),
        "outer.yml",
        r#"
desc: outer
steps:
  - include: child.yml
  - bind: {after: "1"}
"#,
    );
    let mut op = operator_from_file(&outer);
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("include failed on"), "got: {err}");
    assert_eq!(
        outcomes(&result),
        vec![Outcome::Failure, Outcome::Skipped]
    );
    // The nested result is preserved for reporting.
    assert!(result.step_results[0].included_run_results[0].failed());
}

#[tokio::test]
async fn include_outside_the_book_root_requires_a_scope() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(
        tmp.path(),
        "shared.yml",
        "desc: shared\nsteps:\n  - bind: {x: \"1\"}\n",
    );
    std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
    let outer = write_file(
        tmp.path(),
        "sub/outer.yml",
        "desc: outer\nsteps:\n  - include: ../shared.yml\n",
    );

    // Denied without the scope.
    let mut op = operator_from_file(&outer);
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("read:parent"), "got: {err}");

    // Allowed with it.
    let book = parse_runbook_file(&outer).unwrap();
    let opts = RunOptions {
        scopes: vec![crate::options::SCOPE_READ_PARENT.to_string()],
        ..RunOptions::default()
    };
    let mut op = Operator::new(
        book,
        RunbookId::from_string("bk-outer"),
        OperatorContext::default(),
        &opts,
    )
    .unwrap();
    let result = run(&mut op).await;
    assert!(result.err.is_none(), "err: {:?}", result.err);
}

#[tokio::test]
async fn include_missing_file_is_an_include_error() {
    let tmp = tempfile::tempdir().unwrap();
    let outer = write_file(
        tmp.path(),
        "outer.yml",
        r#"
desc: outer
steps:
  - include: ghost.yml
"#,
    );
    let mut op = operator_from_file(&outer);
    let result = run(&mut op).await;
    let err = result.err.unwrap();
    assert!(err.contains("include failed on"), "got: {err}");
}

// =============================================================================
// normalize
// =============================================================================

#[yare::parameterized(
    plain      = { "books/a.yml", "books/a.yml" },
    parent     = { "books/../a.yml", "a.yml" },
    nested     = { "books/./sub/../a.yml", "books/a.yml" },
    above_root = { "../a.yml", "../a.yml" },
)]
fn normalize_resolves_dots(input: &str, expected: &str) {
    assert_eq!(normalize(Path::new(input)), PathBuf::from(expected));
}
