// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator: one runtime instance of a runbook.
//!
//! An operator owns its parsed book, its registered runners, and the store
//! that accumulates step results. `run` is the minimum unit for a single
//! runbook: it waits on `needs:` dependencies, drives the step sequence
//! (optionally wrapped in a book-level loop), and publishes its outputs to
//! the waitmap exactly once on every return path. Operators are never
//! reused across runs; a repeated run rebuilds a fresh operator from the
//! same book.

use crate::capture::Capturers;
use crate::debugger::{AttachPoint, DebugHook};
use crate::error::{LoadError, RunError, RunnerKind};
use crate::expr::{eval, eval_cond, eval_count, eval_with_trace};
use crate::options::{Hook, RunOptions};
use crate::result::RunResult;
use crate::runner::{RunnerRequest, StepRunner};
use crate::runners::{build_runner, ExecRunner};
use crate::step::{step_name, Step};
use crate::store::{Store, OUTCOME_KEY, ROOT_KEYS};
use crate::template::expand;
use drill_core::{random_id, Kv, Outcome, RunbookId, Stopwatch, Trail, TrailKind, Trails, WaitMap};
use drill_runbook::{parse_runbook_file, LoopDef, Runbook, StepDef};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Store contents a finished runbook hands to its dependents.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub bind_vars: Map<String, Value>,
}

/// Shared fleet back-channels handed to every operator.
#[derive(Clone, Default)]
pub struct OperatorContext {
    pub wm: WaitMap<Published>,
    pub sw: Stopwatch,
    pub kv: Kv,
    pub capturers: Capturers,
    pub debugger: Option<Arc<dyn DebugHook>>,
}

/// A resolved `needs:` entry.
#[derive(Debug, Clone)]
struct Need {
    alias: String,
    path: String,
}

pub struct Operator {
    id: RunbookId,
    desc: String,
    labels: Vec<String>,
    book_path: String,
    root: PathBuf,
    if_cond: Option<String>,
    interval: Duration,
    loop_spec: Option<LoopDef>,
    concurrency: Vec<String>,
    use_map: bool,
    force: bool,
    fail_fast: bool,
    skip_test: bool,
    debug: bool,
    included: bool,
    load_only: bool,
    skipped: bool,
    runners: HashMap<String, Arc<dyn StepRunner>>,
    has_runner_def_step: bool,
    steps: Vec<Step>,
    store: Store,
    needs: Vec<Need>,
    ctx: OperatorContext,
    scopes: Vec<String>,
    before_hooks: Vec<Hook>,
    after_hooks: Vec<Hook>,
    parent_trails: Trails,
    loop_index: Option<usize>,
}

impl Operator {
    /// Build an operator for a top-level runbook.
    pub fn new(
        book: Runbook,
        id: RunbookId,
        ctx: OperatorContext,
        opts: &RunOptions,
    ) -> Result<Self, LoadError> {
        Self::build(book, id, ctx, opts, false, Trails::new(), Map::new())
    }

    fn build(
        book: Runbook,
        id: RunbookId,
        ctx: OperatorContext,
        opts: &RunOptions,
        included: bool,
        parent_trails: Trails,
        extra_vars: Map<String, Value>,
    ) -> Result<Self, LoadError> {
        let book_path = book.path_str();
        let root = book
            .path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut runners: HashMap<String, Arc<dyn StepRunner>> = HashMap::new();
        runners.insert("exec".to_string(), Arc::new(ExecRunner::new()));
        for (name, runner) in &opts.runners {
            runners.insert(name.clone(), Arc::clone(runner));
        }
        for (name, config) in &book.runners {
            if runners.contains_key(name) {
                continue;
            }
            match build_runner(name, config) {
                Ok(runner) => {
                    runners.insert(name.clone(), runner);
                }
                Err(e) if opts.load_only => {
                    tracing::warn!(book = %book_path, runner = %name, error = %e, "skipping runner");
                }
                Err(e) => return Err(e),
            }
        }

        let has_runner_def_step = book
            .steps
            .iter()
            .any(|s| s.runner_key.as_deref() == Some("runner"));

        if !opts.load_only {
            for def in &book.steps {
                if let Some(key) = &def.runner_key {
                    let reserved = matches!(key.as_str(), "exec" | "include" | "runner");
                    if !reserved && !runners.contains_key(key) && !has_runner_def_step {
                        return Err(LoadError::UnknownRunner {
                            path: book_path.clone(),
                            name: key.clone(),
                        });
                    }
                }
            }
        }

        let needs = book
            .needs
            .iter()
            .map(|(alias, rel)| Need {
                alias: alias.clone(),
                path: normalize(&root.join(rel)).to_string_lossy().to_string(),
            })
            .collect();

        let mut vars = book.vars.clone();
        for (key, value) in extra_vars {
            vars.insert(key, value);
        }
        let store = Store::new(book.use_map, vars, ctx.kv.clone());

        Ok(Self {
            id,
            desc: book.desc.clone(),
            labels: book.labels.clone(),
            book_path,
            root,
            if_cond: book.if_cond.clone(),
            interval: book.interval.unwrap_or(Duration::ZERO),
            loop_spec: book.loop_spec.clone(),
            concurrency: book.concurrency.clone(),
            use_map: book.use_map,
            force: book.force || opts.force,
            fail_fast: book.fail_fast || opts.fail_fast,
            skip_test: book.skip_test || opts.skip_test,
            debug: book.debug || opts.debug,
            included,
            load_only: opts.load_only,
            skipped: false,
            runners,
            has_runner_def_step,
            steps: book.steps.iter().cloned().map(Step::new).collect(),
            store,
            needs,
            ctx,
            scopes: opts.scopes.clone(),
            before_hooks: opts.before_hooks.clone(),
            after_hooks: opts.after_hooks.clone(),
            parent_trails,
            loop_index: None,
        })
    }

    pub fn id(&self) -> &RunbookId {
        &self.id
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn book_path(&self) -> &str {
        &self.book_path
    }

    /// Waitmap key: the book path, falling back to the id for in-memory books.
    pub fn book_path_or_id(&self) -> String {
        if self.book_path.is_empty() {
            self.id.to_string()
        } else {
            self.book_path.clone()
        }
    }

    pub fn concurrency(&self) -> &[String] {
        &self.concurrency
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn skipped(&self) -> bool {
        self.skipped
    }

    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }

    /// Paths of runbooks this operator depends on.
    pub fn needs_paths(&self) -> Vec<String> {
        self.needs.iter().map(|n| n.path.clone()).collect()
    }

    /// Paths of runbooks included by steps (best effort, unexpanded payloads).
    pub fn include_paths(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.def.runner_key.as_deref() == Some("include"))
            .filter_map(|s| match &s.def.payload {
                Value::String(p) => Some(p.clone()),
                Value::Object(map) => map
                    .get("path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|rel| normalize(&self.root.join(rel)).to_string_lossy().to_string())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Close registered runners. Non-force close leaves detached (test
    /// injected) runners alone; close errors are swallowed.
    pub async fn close(&self, force: bool) {
        for runner in self.runners.values() {
            if !force && runner.detached_target() {
                continue;
            }
            let _ = runner.close().await;
        }
    }

    /// Identifier path of this operator (including parents, for includes).
    pub fn trails(&self) -> Trails {
        let mut trails = self.parent_trails.clone();
        trails.push(Trail::runbook(
            self.id.clone(),
            Some(self.book_path.clone()).filter(|p| !p.is_empty()),
            Some(self.desc.clone()).filter(|d| !d.is_empty()),
        ));
        if let Some(j) = self.loop_index {
            trails.push(Trail::loop_iteration(self.id.clone(), j));
        }
        trails
    }

    fn step_trails(&self, i: usize) -> Trails {
        let mut trails = self.trails();
        let def = &self.steps[i].def;
        trails.push(Trail::step(
            self.id.clone(),
            i,
            Some(def.key.clone()).filter(|_| self.use_map),
            def.desc.clone(),
        ));
        if let Some(j) = self.steps[i].loop_index {
            trails.push(Trail::loop_iteration(self.id.clone(), j));
        }
        trails
    }

    /// Run this runbook once: wait for dependencies, execute, publish.
    ///
    /// Boxed explicitly (rather than `async fn`) because `run` recurses
    /// through `run_include`; an opaque `impl Future` return type can't
    /// have its `Send`-ness proven across that cycle.
    pub fn run(
        &mut self,
        cancel: CancellationToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = RunResult> + Send + '_>> {
        Box::pin(async move {
            let begin = Instant::now();
            let trails = self.trails();
            let span = self.ctx.sw.start(trails.profile_ids());
            self.ctx
                .capturers
                .capture_start(&trails, &self.book_path, &self.desc);

            let outcome = if self.load_only {
                Err(RunError::Config(
                    "this runbook is not allowed to run".to_string(),
                ))
            } else {
                match self.wait_needs(&cancel).await {
                    Err(e) => Err(e),
                    Ok(()) => {
                        if self.loop_spec.is_some() {
                            self.run_loop(&cancel).await
                        } else {
                            self.run_internal(&cancel).await
                        }
                    }
                }
            };
            drop(span);

            let err = outcome.err().map(|e| RunError::Book {
                path: self.book_path_or_id(),
                source: Box::new(e),
            });
            let result = self.build_result(err.as_ref(), begin.elapsed());

            // Publish exactly once, on every return path.
            self.ctx.wm.set(
                &self.book_path_or_id(),
                Published {
                    bind_vars: self.store.bind_vars.clone(),
                },
            );

            self.ctx.capturers.capture_result(&trails, &result);
            self.ctx
                .capturers
                .capture_end(&trails, &self.book_path, &self.desc);
            result
        })
    }

    async fn wait_needs(&mut self, cancel: &CancellationToken) -> Result<(), RunError> {
        let needs = self.needs.clone();
        for need in needs {
            let rx = self.ctx.wm.subscribe(&need.path);
            let value = tokio::select! {
                _ = cancel.cancelled() => return Err(RunError::Canceled),
                res = rx => match res {
                    Ok(published) if !published.bind_vars.is_empty() => {
                        Value::Object(published.bind_vars)
                    }
                    _ => Value::Null,
                },
            };
            self.store.needs_vars.insert(need.alias, value);
        }
        Ok(())
    }

    /// One pass over a book-level `loop:`.
    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), RunError> {
        let result = self.run_loop_inner(cancel).await;
        self.loop_index = None;
        result
    }

    async fn run_loop_inner(&mut self, cancel: &CancellationToken) -> Result<(), RunError> {
        let Some(spec) = self.loop_spec.clone() else {
            return self.run_internal(cancel).await;
        };
        let count = eval_count(&spec.count, &self.store.scope())?;
        let retry = spec.is_retry();
        let mut success = !retry;
        let mut trace = String::new();
        let mut iter_err: Option<RunError> = None;
        let mut j = 0;
        while j < count {
            if cancel.is_cancelled() {
                return Err(RunError::Canceled);
            }
            if j > 0 {
                sleep_loop_interval(&spec).await;
                for runner in self.runners.values() {
                    if let Err(e) = runner.renew().await {
                        return Err(RunError::Config(format!("failed to renew runner: {}", e)));
                    }
                }
            }
            self.loop_index = Some(j);
            let trails = self.trails();
            self.ctx.capturers.set_current_trails(&trails);
            let res = {
                let _span = self.ctx.sw.start(trails.profile_ids());
                self.run_internal(cancel).await
            };
            let outcome = match &res {
                Err(e) => {
                    iter_err = RunError::join(
                        iter_err,
                        Some(RunError::Config(format!("loop[{}]: {}", j, e))),
                    );
                    Outcome::Failure
                }
                Ok(()) => {
                    if self.skipped {
                        Outcome::Skipped
                    } else {
                        Outcome::Success
                    }
                }
            };
            if let Some(until) = &spec.until {
                let mut scope = self.store.scope();
                scope[OUTCOME_KEY] = json!(outcome.to_string());
                let traced = eval_with_trace(until, &scope)?;
                if traced.output_as_bool() {
                    success = true;
                    break;
                }
                trace = traced.format_tree();
            }
            j += 1;
        }
        if !success {
            return Err(RunError::Loop {
                step: self.book_path_or_id(),
                count,
                interval: spec.interval_desc(),
                until: spec.until.clone().unwrap_or_default(),
                trace,
            });
        }
        if !retry {
            if let Some(err) = iter_err {
                return Err(err);
            }
        }
        Ok(())
    }

    /// One pass of the runbook body.
    async fn run_internal(&mut self, cancel: &CancellationToken) -> Result<(), RunError> {
        self.clear_results();
        self.store.clear_steps();
        self.skipped = false;

        // Top-level if: a skipped runbook runs no hooks at all.
        if let Some(cond) = self.if_cond.clone() {
            if !eval_cond(&cond, &self.cond_scope())? {
                self.skip();
                return Ok(());
            }
        }

        let before_hooks = self.before_hooks.clone();
        for (i, hook) in before_hooks.iter().enumerate() {
            let trails = self
                .trails()
                .with(Trail::hook(self.id.clone(), TrailKind::BeforeHook, i));
            let _span = self.ctx.sw.start(trails.profile_ids());
            if let Err(msg) = (**hook)() {
                return Err(RunError::BeforeHook(msg));
            }
        }

        let mut run_err: Option<RunError> = None;
        let mut failed = false;
        for i in 0..self.steps.len() {
            if cancel.is_cancelled() && !failed {
                failed = true;
                run_err = RunError::join(run_err, Some(RunError::Canceled));
            }
            if failed && !self.force {
                self.steps[i].outcome = Some(Outcome::Skipped);
                self.record_not_run(i);
                self.attach_outcome(Outcome::Skipped);
                continue;
            }
            let begin = Instant::now();
            let res = self.run_step(i, cancel).await;
            self.steps[i].elapsed_ms = begin.elapsed().as_millis() as u64;
            match res {
                Err(e) if e.is_skip() => {
                    self.steps[i].outcome = Some(Outcome::Skipped);
                    self.record_not_run(i);
                    self.attach_outcome(Outcome::Skipped);
                }
                Err(e) => {
                    self.steps[i].outcome = Some(Outcome::Failure);
                    self.steps[i].err = Some(e.clone());
                    self.record_not_run(i);
                    self.attach_outcome(Outcome::Failure);
                    run_err = RunError::join(run_err, Some(e));
                    failed = true;
                }
                Ok(()) => {
                    self.steps[i].outcome = Some(Outcome::Success);
                    self.record_not_run(i);
                    self.attach_outcome(Outcome::Success);
                }
            }
        }

        // After hooks run even when a step failed; their error overrides.
        let after_hooks = self.after_hooks.clone();
        for (i, hook) in after_hooks.iter().enumerate() {
            let trails = self
                .trails()
                .with(Trail::hook(self.id.clone(), TrailKind::AfterHook, i));
            let _span = self.ctx.sw.start(trails.profile_ids());
            if let Err(msg) = (**hook)() {
                run_err = Some(RunError::AfterHook(msg));
            }
        }

        match run_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_step(&mut self, i: usize, cancel: &CancellationToken) -> Result<(), RunError> {
        let def = self.steps[i].def.clone();
        let name = self.step_name(i);

        if let Some(debugger) = self.ctx.debugger.clone() {
            debugger
                .attach(&AttachPoint {
                    step_name: name.clone(),
                    step_index: i,
                    desc: def.desc.clone(),
                })
                .await?;
        }

        let trails = self.step_trails(i);
        self.ctx.capturers.set_current_trails(&trails);
        let span = self.ctx.sw.start(trails.profile_ids());

        if i != 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }

        if let Some(cond) = &def.if_cond {
            if !eval_cond(cond, &self.cond_scope())? {
                let what = def
                    .desc
                    .clone()
                    .or_else(|| def.runner_key.clone())
                    .unwrap_or_default();
                self.debug_echo(&format!("Skip {:?} on {}", what, name), YELLOW);
                return Err(RunError::StepSkipped);
            }
        }
        if let Some(what) = def.desc.as_deref().or(def.runner_key.as_deref()) {
            self.debug_echo(&format!("Run {:?} on {}", what, name), CYAN);
        }
        drop(span);

        if let Some(spec) = def.loop_spec.clone() {
            let result = self.run_step_loop(i, &spec, cancel).await;
            self.store.loop_index = None;
            self.steps[i].loop_index = None;
            result
        } else {
            self.step_fn(i, cancel).await
        }
    }

    async fn run_step_loop(
        &mut self,
        i: usize,
        spec: &LoopDef,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let count = eval_count(&spec.count, &self.store.scope())?;
        let retry = spec.is_retry();
        let mut success = !retry;
        let mut trace = String::new();
        let mut j = 0;
        while j < count {
            if cancel.is_cancelled() {
                return Err(RunError::Canceled);
            }
            if j > 0 {
                sleep_loop_interval(spec).await;
            }
            self.store.loop_index = Some(j);
            self.steps[i].loop_index = Some(j);
            let trails = self.step_trails(i);
            self.ctx.capturers.set_current_trails(&trails);
            let res = {
                let _span = self.ctx.sw.start(trails.profile_ids());
                self.step_fn(i, cancel).await
            };
            if let Err(e) = res {
                return Err(RunError::LoopIteration {
                    source: Box::new(e),
                });
            }
            if let Some(until) = &spec.until {
                let traced = eval_with_trace(until, &self.current_scope())?;
                if traced.output_as_bool() {
                    success = true;
                    break;
                }
                trace = traced.format_tree();
            }
            j += 1;
        }
        if !success {
            let name = step_name(
                &self.desc,
                self.use_map,
                &self.steps[i].def.key,
                i,
                None,
            );
            return Err(RunError::Loop {
                step: name,
                count,
                interval: spec.interval_desc(),
                until: spec.until.clone().unwrap_or_default(),
                trace,
            });
        }
        Ok(())
    }

    /// One iteration of one step: the chosen runner, then the `dump`,
    /// `bind` and `test` sub-runners in that order.
    async fn step_fn(&mut self, i: usize, cancel: &CancellationToken) -> Result<(), RunError> {
        let def = self.steps[i].def.clone();
        let name = self.step_name(i);
        let mut ran = false;

        if let Some(runner_key) = &def.runner_key {
            match runner_key.as_str() {
                "include" => {
                    self.run_include(i, &def, &name, cancel).await?;
                    ran = true;
                }
                "runner" => {
                    self.define_runner(&def, &name)?;
                    self.record_entry(i, Value::Object(Map::new()));
                    ran = true;
                }
                key => {
                    let Some(runner) = self.runners.get(key).cloned() else {
                        return Err(RunError::InvalidRunner(name.clone()));
                    };
                    let payload = expand(&def.payload, &self.cond_scope())?;
                    let value = runner
                        .run(RunnerRequest {
                            payload,
                            step_name: name.clone(),
                            cancel: cancel.clone(),
                        })
                        .await
                        .map_err(|e| RunError::Runner {
                            kind: runner.kind(),
                            step: name.clone(),
                            message: e.to_string(),
                        })?;
                    if let Some(cookies) = value.get("cookies").and_then(Value::as_object) {
                        self.store.record_cookies(cookies.clone());
                    }
                    self.record_entry(i, value);
                    ran = true;
                }
            }
        }

        if let Some(dump) = &def.dump {
            self.debug_echo(&format!("Run \"dump\" on {}", name), CYAN);
            self.run_dump(dump).map_err(|message| RunError::Runner {
                kind: RunnerKind::Dump,
                step: name.clone(),
                message,
            })?;
            ran = true;
        }

        if let Some(bind) = &def.bind {
            self.debug_echo(&format!("Run \"bind\" on {}", name), CYAN);
            let scope = self.current_scope();
            let mut bound = Map::new();
            for (var, expr_value) in bind {
                if ROOT_KEYS.contains(&var.as_str()) {
                    return Err(RunError::Runner {
                        kind: RunnerKind::Bind,
                        step: name.clone(),
                        message: format!("cannot bind reserved name: {}", var),
                    });
                }
                let value = match expr_value {
                    Value::String(expr) => eval(expr, &scope)?,
                    other => expand(other, &scope)?,
                };
                self.store.bind_vars.insert(var.clone(), value.clone());
                bound.insert(var.clone(), value);
            }
            if !ran {
                // A bind-only step records its bindings as the step entry.
                self.record_entry(i, Value::Object(bound));
            }
            ran = true;
        }

        if let Some(cond) = &def.test_cond {
            if self.skip_test {
                self.debug_echo(&format!("Skip \"test\" on {}", name), YELLOW);
                if !ran {
                    return Err(RunError::StepSkipped);
                }
            } else {
                self.debug_echo(&format!("Run \"test\" on {}", name), CYAN);
                let traced = eval_with_trace(cond, &self.current_scope())?;
                if !traced.output_as_bool() {
                    return Err(RunError::Runner {
                        kind: RunnerKind::Test,
                        step: name.clone(),
                        message: format!("condition is not true\n{}", traced.format_tree()),
                    });
                }
                ran = true;
            }
        }

        if !ran {
            return Err(RunError::InvalidRunner(name));
        }
        if self.store.len() <= i {
            self.record_entry(i, Value::Object(Map::new()));
        }
        Ok(())
    }

    async fn run_include(
        &mut self,
        i: usize,
        def: &StepDef,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let include_err = |message: String| RunError::Runner {
            kind: RunnerKind::Include,
            step: name.to_string(),
            message,
        };

        let payload = expand(&def.payload, &self.cond_scope())?;
        let (rel_path, vars) = match &payload {
            Value::String(path) => (path.clone(), Map::new()),
            Value::Object(map) => {
                let path = map
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| include_err("missing path".to_string()))?;
                let vars = map
                    .get("vars")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                (path.to_string(), vars)
            }
            other => {
                return Err(include_err(format!("invalid include config: {}", other)));
            }
        };

        let full_path = normalize(&self.root.join(&rel_path));
        if escapes_root(&full_path, &self.root)
            && !self.scopes.iter().any(|s| s == crate::options::SCOPE_READ_PARENT)
        {
            return Err(include_err(format!(
                "including {} requires the {} scope",
                full_path.display(),
                crate::options::SCOPE_READ_PARENT
            )));
        }
        let book = parse_runbook_file(&full_path).map_err(|e| include_err(e.to_string()))?;

        // Included runbooks get their own waitmap; dependency results that
        // the fleet has already published are surfaced, everything else
        // resolves to null instead of blocking a nested run.
        let mut child_ctx = self.ctx.clone();
        child_ctx.wm = WaitMap::new();

        let opts = RunOptions {
            skip_test: self.skip_test,
            force: self.force,
            debug: self.debug,
            scopes: self.scopes.clone(),
            ..RunOptions::default()
        };
        let mut child = Operator::build(
            book,
            random_id(),
            child_ctx.clone(),
            &opts,
            true,
            self.step_trails(i),
            vars,
        )
        .map_err(|e| include_err(e.to_string()))?;

        for path in child.needs_paths() {
            let published = self.ctx.wm.get(&path).unwrap_or_default();
            child_ctx.wm.set(&path, published);
        }

        let result = child.run(cancel.clone()).await;

        let entry = json!({
            "vars": Value::Object(child.store.bind_vars.clone()),
            "steps": child.store.steps_value(),
        });
        self.record_entry(i, entry);
        let failed = result.failed();
        let err_text = result.err.clone();
        self.steps[i].included_run_results.push(result);
        if failed {
            return Err(RunError::Included(Box::new(include_err(
                err_text.unwrap_or_default(),
            ))));
        }
        Ok(())
    }

    fn define_runner(&mut self, def: &StepDef, name: &str) -> Result<(), RunError> {
        let definition_err = |message: String| RunError::Runner {
            kind: RunnerKind::RunnerDefinition,
            step: name.to_string(),
            message,
        };
        let payload = expand(&def.payload, &self.cond_scope())?;
        let map = payload
            .as_object()
            .ok_or_else(|| definition_err("runner definition must be a mapping".to_string()))?;
        let runner_name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| definition_err("missing name".to_string()))?;
        let runner =
            build_runner(runner_name, &payload).map_err(|e| definition_err(e.to_string()))?;
        self.runners.insert(runner_name.to_string(), runner);
        Ok(())
    }

    fn run_dump(&self, dump: &drill_runbook::DumpDef) -> Result<(), String> {
        let value = eval(&dump.expr, &self.current_scope()).map_err(|e| e.to_string())?;
        let mut rendered =
            serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
        if !dump.disable_trailing_newline {
            rendered.push('\n');
        }
        match &dump.out {
            Some(path) => {
                std::fs::write(self.root.join(path), rendered).map_err(|e| e.to_string())
            }
            None => {
                print!("{}", rendered);
                Ok(())
            }
        }
    }

    // === recording ===

    fn record_entry(&mut self, _i: usize, value: Value) {
        if matches!(self.store.loop_index, Some(j) if j > 0) {
            // Only the terminal loop iteration persists.
            self.store.remove_latest();
        }
        let idx = self.store.len();
        let key = self
            .steps
            .get(idx)
            .map(|s| s.def.key.clone())
            .unwrap_or_else(|| idx.to_string());
        self.store.record(key, value);
    }

    fn record_not_run(&mut self, i: usize) {
        if self.store.len() == i + 1 {
            return;
        }
        self.record_entry(i, Value::Object(Map::new()));
    }

    fn attach_outcome(&mut self, outcome: Outcome) {
        self.store
            .record_to_latest(OUTCOME_KEY, json!(outcome.to_string()));
        let partial = self.build_result(None, Duration::ZERO);
        self.ctx
            .capturers
            .capture_result_by_step(&self.trails(), &partial);
    }

    fn skip(&mut self) {
        self.debug_echo(&format!("Skip {:?}", self.desc), YELLOW);
        self.skipped = true;
        for i in 0..self.steps.len() {
            self.steps[i].outcome = Some(Outcome::Skipped);
            self.record_not_run(i);
            self.attach_outcome(Outcome::Skipped);
        }
    }

    fn clear_results(&mut self) {
        for step in &mut self.steps {
            step.clear_result();
        }
    }

    fn build_result(&self, err: Option<&RunError>, elapsed: Duration) -> RunResult {
        RunResult {
            id: self.id.to_string(),
            book_path: self.book_path_or_id(),
            desc: self.desc.clone(),
            labels: self.labels.clone(),
            included: self.included,
            err: err.map(|e| e.to_string()),
            skipped: self.skipped,
            elapsed_ms: elapsed.as_millis() as u64,
            step_results: self
                .steps
                .iter()
                .map(|s| s.to_result(self.id.as_str()))
                .collect(),
        }
    }

    // === scopes ===

    /// Scope for conditions evaluated before this step records anything:
    /// `previous` is the most recently recorded entry.
    fn cond_scope(&self) -> Value {
        let mut scope = self.store.scope();
        scope["included"] = json!(self.included);
        scope["previous"] = self.store.latest().cloned().unwrap_or(Value::Null);
        scope
    }

    /// Scope for `test:`, `bind:` and `loop.until:`: `current` is the
    /// latest entry, `previous` the one before it.
    fn current_scope(&self) -> Value {
        let mut scope = self.store.scope();
        scope["included"] = json!(self.included);
        scope["previous"] = self.store.previous().cloned().unwrap_or(Value::Null);
        scope["current"] = self.store.latest().cloned().unwrap_or(Value::Null);
        scope
    }

    fn step_name(&self, i: usize) -> String {
        step_name(
            &self.desc,
            self.use_map,
            &self.steps[i].def.key,
            i,
            self.store.loop_index,
        )
    }

    fn debug_echo(&self, text: &str, color: &str) {
        tracing::debug!(book = %self.book_path_or_id(), "{}", text);
        if self.debug {
            eprintln!("{}{}{}", color, text, RESET);
        }
    }
}

async fn sleep_loop_interval(spec: &LoopDef) {
    if let Some(interval) = spec.interval {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        return;
    }
    if let (Some(min), Some(max)) = (spec.min_interval, spec.max_interval) {
        let wait = if max > min {
            use rand::Rng;
            let span = (max - min).as_millis() as u64;
            min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
        } else {
            min
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// True when `path` points outside `root`'s directory tree.
fn escapes_root(path: &Path, root: &Path) -> bool {
    let root = normalize(root);
    if root.as_os_str().is_empty() {
        return path.starts_with("..");
    }
    !path.starts_with(&root)
}

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir.as_os_str());
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[path = "operator_tests.rs"]
mod tests;
