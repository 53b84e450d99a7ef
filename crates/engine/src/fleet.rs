// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet planner: load a set of runbooks, resolve their `needs:` graph,
//! select a subset, and schedule the selected operators.
//!
//! The fleet owns parsed books, not operators. Every invocation of
//! [`Fleet::run_all`] builds fresh operators from the books (ids are
//! preserved), so repeated runs always start from a clean state. Selection
//! applies, in order: shuffle, shard, sample, random-with-replacement, and
//! finally the `needs:` linearization that puts every dependency before its
//! dependents.

use crate::capture::Capturers;
use crate::concurrency::ConcGroup;
use crate::debugger::DebugHook;
use crate::error::{Error, LoadError, RunError};
use crate::expr::eval_cond;
use crate::operator::{normalize, Operator, OperatorContext};
use crate::options::RunOptions;
use crate::result::FleetResult;
use drill_core::{path_id, Kv, RunbookId, Stopwatch, WaitMap};
use drill_runbook::{find_runbooks, parse_runbook_file, Runbook};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Maximum depth of the `needs:` chain.
pub const MAX_NEEDS_DEPTH: usize = 10;

/// Listing entry for one loaded runbook.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub id: String,
    pub path: String,
    pub desc: String,
    pub labels: Vec<String>,
    pub number_of_steps: usize,
}

pub struct Fleet {
    /// Every parsed book, dependencies included, keyed by normalized path.
    library: HashMap<String, Runbook>,
    /// Stable ids derived from paths.
    ids: HashMap<String, RunbookId>,
    /// Top-level selection after filters, in run order.
    selected: Vec<String>,
    opts: RunOptions,
    kv: Kv,
    sw: Stopwatch,
    capturers: Capturers,
    debugger: Option<Arc<dyn DebugHook>>,
    run_count: AtomicU64,
    results: Mutex<Vec<FleetResult>>,
}

impl Fleet {
    /// Load runbooks matching `pattern` and resolve their dependency graph.
    ///
    /// Environment variables `DRILL_RUN` (path regex), `DRILL_ID` (id
    /// prefixes) and `DRILL_LABEL` (label expression) fill in filters the
    /// caller did not set explicitly.
    pub fn load(pattern: &str, mut opts: RunOptions) -> Result<Self, LoadError> {
        apply_env(&mut opts);

        let files = find_runbooks(pattern)?;
        let mut library: HashMap<String, Runbook> = HashMap::new();
        let mut top: Vec<String> = Vec::new();
        for (path, _format) in files {
            let key = normalize(&path).to_string_lossy().to_string();
            let book = parse_runbook_file(&path)?;
            top.push(key.clone());
            library.insert(key, book);
        }

        // Traverse needs:, loading dependency books into the library.
        let mut queue: Vec<(String, usize)> = top.iter().map(|p| (p.clone(), 0)).collect();
        while let Some((path, depth)) = queue.pop() {
            if depth > MAX_NEEDS_DEPTH {
                return Err(LoadError::NeedsTooDeep(MAX_NEEDS_DEPTH));
            }
            let needs = library
                .get(&path)
                .map(book_needs)
                .unwrap_or_default();
            for need_path in needs {
                if library.contains_key(&need_path) {
                    continue;
                }
                let book = parse_runbook_file(Path::new(&need_path))?;
                library.insert(need_path.clone(), book);
                queue.push((need_path, depth + 1));
            }
        }

        let ids: HashMap<String, RunbookId> =
            library.keys().map(|p| (p.clone(), path_id(p))).collect();

        // Exclude books that another loaded book includes.
        if opts.skip_included {
            let mut included: HashSet<String> = HashSet::new();
            for (path, book) in &library {
                for include in book_includes(path, book) {
                    included.insert(include);
                }
            }
            top.retain(|p| {
                let keep = !included.contains(p);
                if !keep {
                    tracing::debug!(book = %p, "skipping: included from another runbook");
                }
                keep
            });
        }

        // DRILL_RUN / --run
        if let Some(pattern) = &opts.run_match {
            let re = Regex::new(pattern)?;
            top.retain(|p| {
                let keep = re.is_match(p);
                if !keep {
                    tracing::debug!(book = %p, filter = %re, "skipping: does not match run filter");
                }
                keep
            });
        }

        // DRILL_LABEL / --label
        if !opts.run_labels.is_empty() {
            let cond = label_cond(&opts.run_labels);
            let mut kept = Vec::with_capacity(top.len());
            for path in top {
                let labels = library
                    .get(&path)
                    .map(|b| b.labels.clone())
                    .unwrap_or_default();
                let matched = eval_cond(&cond, &label_env(&labels))
                    .map_err(|e| LoadError::Label(e.to_string()))?;
                if matched {
                    kept.push(path);
                } else {
                    tracing::debug!(book = %path, cond = %cond, "skipping: labels do not match");
                }
            }
            top = kept;
        }

        // DRILL_ID / --id: keep user order; otherwise sort stably.
        if !opts.run_ids.is_empty() {
            top = select_by_ids(&top, &ids, &opts.run_ids)?;
        } else {
            top.sort_by(|a, b| {
                let desc_a = library.get(a).map(|x| x.desc.as_str()).unwrap_or("");
                let desc_b = library.get(b).map(|x| x.desc.as_str()).unwrap_or("");
                (a.as_str(), desc_a).cmp(&(b.as_str(), desc_b))
            });
        }

        let sw = Stopwatch::new();
        if !opts.profile {
            sw.disable();
        }
        let mut capturers = Capturers::default();
        if opts.debug {
            capturers.push(Arc::new(crate::capture::TracingCapturer));
        }

        Ok(Self {
            library,
            ids,
            selected: top,
            opts,
            kv: Kv::new(),
            sw,
            capturers,
            debugger: None,
            run_count: AtomicU64::new(0),
            results: Mutex::new(Vec::new()),
        })
    }

    /// Attach a debugger hook invoked before each step.
    pub fn with_debugger(mut self, debugger: Arc<dyn DebugHook>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    /// Attach an extra capturer.
    pub fn with_capturer(mut self, capturer: Arc<dyn crate::capture::Capturer>) -> Self {
        self.capturers.push(capturer);
        self
    }

    pub fn set_kv(&self, key: impl Into<String>, value: Value) {
        self.kv.set(key, value);
    }

    pub fn get_kv(&self, key: &str) -> Option<Value> {
        self.kv.get(key)
    }

    pub fn del_kv(&self, key: &str) {
        self.kv.del(key);
    }

    pub fn clear_kv(&self) {
        self.kv.clear();
    }

    /// Selected top-level runbooks, in run order (before needs expansion).
    pub fn list(&self) -> Vec<ListEntry> {
        self.selected
            .iter()
            .filter_map(|path| {
                let book = self.library.get(path)?;
                Some(ListEntry {
                    id: self
                        .ids
                        .get(path)
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    path: path.clone(),
                    desc: book.desc.clone(),
                    labels: book.labels.clone(),
                    number_of_steps: book.number_of_steps(),
                })
            })
            .collect()
    }

    /// Result of the most recent run.
    pub fn result(&self) -> Option<FleetResult> {
        self.results.lock().last().cloned()
    }

    /// Write the profile tree as JSON.
    pub fn dump_profile(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        match self.sw.report() {
            Some(report) => serde_json::to_writer(writer, &report)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no profile",
            )),
        }
    }

    /// The run order for the next invocation: selection transforms applied,
    /// then the `needs:` linearization.
    pub fn select(&self) -> Result<Vec<String>, LoadError> {
        let _rc = self.run_count.fetch_add(1, Ordering::SeqCst);
        let mut paths = self.selected.clone();

        if let Some(seed) = self.opts.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            paths.shuffle(&mut rng);
        }
        if let Some((shard_n, shard_index)) = self.opts.shard {
            if shard_n > 0 {
                paths = paths
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| i % shard_n == shard_index)
                    .map(|(_, p)| p)
                    .collect();
            }
        }
        if let Some(sample) = self.opts.sample {
            if sample > 0 && sample < paths.len() {
                let mut rng = rand::thread_rng();
                let mut pool = paths;
                let mut picked = Vec::with_capacity(sample);
                for _ in 0..sample {
                    let idx = rng.gen_range(0..pool.len());
                    picked.push(pool.swap_remove(idx));
                }
                paths = picked;
            }
        }
        let mut with_replacement = false;
        if let Some(random) = self.opts.random {
            if random > 0 && !paths.is_empty() {
                with_replacement = true;
                let mut rng = rand::thread_rng();
                let pool = paths.clone();
                paths = (0..random)
                    .map(|_| pool[rng.gen_range(0..pool.len())].clone())
                    .collect();
            }
        }

        sort_with_needs(&paths, &self.library, with_replacement)
    }

    /// Run the selected set once.
    ///
    /// Operators run as independent tasks bounded by `concurrent_max` and
    /// their `concurrency:` tags. On cancellation (external or `failFast`)
    /// outstanding tasks get `wait_timeout` to finish.
    pub async fn run_all(&self, cancel: CancellationToken) -> Result<FleetResult, Error> {
        if self.opts.load_only {
            return Err(LoadError::LoadOnly.into());
        }
        // A failFast operator cancels this child token without touching the
        // caller's token.
        let cancel = cancel.child_token();
        let order = self.select()?;
        let total = order.len();

        let ctx = OperatorContext {
            wm: WaitMap::new(),
            sw: self.sw.clone(),
            kv: self.kv.clone(),
            capturers: self.capturers.clone(),
            debugger: self.debugger.clone(),
        };

        // Build all operators up front so construction errors surface
        // before anything runs.
        let mut operators = Vec::with_capacity(order.len());
        for path in &order {
            let Some(book) = self.library.get(path).cloned() else {
                continue;
            };
            let id = self
                .ids
                .get(path)
                .cloned()
                .unwrap_or_else(|| path_id(path));
            operators.push(Operator::new(book, id, ctx.clone(), &self.opts)?);
        }

        let group = Arc::new(ConcGroup::new(self.opts.concurrent_max));
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for mut op in operators {
            if cancel.is_cancelled() {
                break;
            }
            let tags = op.concurrency().to_vec();
            let task_group = Arc::clone(&group);
            let task_wm = ctx.wm.clone();
            let task_cancel = cancel.clone();
            let task_results = Arc::clone(&results);
            tasks.spawn(async move {
                // Wait for dependency publications before taking a slot, so
                // a dependent never holds capacity while its dependency is
                // still queued.
                for path in op.needs_paths() {
                    let rx = task_wm.subscribe(&path);
                    tokio::select! {
                        _ = task_cancel.cancelled() => return,
                        _ = rx => {}
                    }
                }
                let permit = tokio::select! {
                    permit = task_group.acquire(&tags) => permit,
                    _ = task_cancel.cancelled() => return,
                };
                if task_cancel.is_cancelled() {
                    return;
                }
                let _permit = permit;
                let result = op.run(task_cancel.clone()).await;
                op.close(false).await;
                let abort = result.failed() && op.fail_fast();
                task_results.lock().push(result);
                if abort {
                    task_cancel.cancel();
                }
            });
        }

        // Await completion; after a cancel, grant the grace period.
        let mut wait_err: Option<RunError> = None;
        loop {
            if cancel.is_cancelled() {
                let drain = async {
                    while tasks.join_next().await.is_some() {}
                };
                if tokio::time::timeout(self.opts.wait_timeout, drain)
                    .await
                    .is_err()
                {
                    tasks.abort_all();
                    wait_err = Some(RunError::WaitTimeout(self.opts.wait_timeout));
                }
                break;
            }
            tokio::select! {
                joined = tasks.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {}
            }
        }

        // Close the waitmap exactly once per run.
        ctx.wm.close();

        let result = FleetResult {
            total,
            run_results: results.lock().clone(),
        };
        self.results.lock().push(result.clone());
        match wait_err {
            Some(err) => Err(err.into()),
            None => Ok(result),
        }
    }
}

/// Resolved dependency paths of a book, relative to its directory.
fn book_needs(book: &Runbook) -> Vec<String> {
    let root = book
        .path
        .as_ref()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    book.needs
        .iter()
        .map(|(_, rel)| normalize(&root.join(rel)).to_string_lossy().to_string())
        .collect()
}

/// Paths of books included by steps (unexpanded payloads, best effort).
fn book_includes(path: &str, book: &Runbook) -> Vec<String> {
    let root = Path::new(path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    book.steps
        .iter()
        .filter(|s| s.runner_key.as_deref() == Some("include"))
        .filter_map(|s| match &s.payload {
            Value::String(p) => Some(p.clone()),
            Value::Object(map) => map.get("path").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .map(|rel| normalize(&root.join(rel)).to_string_lossy().to_string())
        .collect()
}

/// Keep only paths whose id matches a requested prefix, in prefix order.
fn select_by_ids(
    top: &[String],
    ids: &HashMap<String, RunbookId>,
    prefixes: &[String],
) -> Result<Vec<String>, LoadError> {
    let mut ordered: Vec<String> = Vec::new();
    for prefix in prefixes {
        let matched: Vec<&String> = top
            .iter()
            .filter(|p| {
                ids.get(*p)
                    .map(|id| id.has_prefix(prefix))
                    .unwrap_or(false)
            })
            .collect();
        if matched.len() > 1 {
            return Err(LoadError::AmbiguousId(prefixes.to_vec()));
        }
        if let Some(path) = matched.first() {
            if !ordered.contains(*path) {
                ordered.push((*path).clone());
            }
        }
    }
    if ordered.is_empty() {
        return Err(LoadError::NoIdMatch(prefixes.to_vec()));
    }
    Ok(ordered)
}

/// Linearize the selection so every dependency precedes its dependents.
///
/// Entries injected as dependencies are deduplicated by path; with
/// `with_replacement` the top-level picks themselves are kept as repeats.
fn sort_with_needs(
    paths: &[String],
    library: &HashMap<String, Runbook>,
    with_replacement: bool,
) -> Result<Vec<String>, LoadError> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for path in paths {
        if with_replacement {
            for need in library.get(path).map(book_needs).unwrap_or_default() {
                visit_needs(&need, library, 1, &mut seen, &mut out)?;
            }
            seen.insert(path.clone());
            out.push(path.clone());
        } else {
            visit_needs(path, library, 0, &mut seen, &mut out)?;
        }
    }
    Ok(out)
}

fn visit_needs(
    path: &str,
    library: &HashMap<String, Runbook>,
    depth: usize,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
) -> Result<(), LoadError> {
    if depth > MAX_NEEDS_DEPTH {
        return Err(LoadError::NeedsTooDeep(MAX_NEEDS_DEPTH));
    }
    if seen.contains(path) {
        return Ok(());
    }
    // Dependency cycles terminate at the depth cap.
    for need in library.get(path).map(book_needs).unwrap_or_default() {
        visit_needs(&need, library, depth + 1, seen, out)?;
    }
    if seen.insert(path.to_string()) {
        out.push(path.to_string());
    }
    Ok(())
}

fn apply_env(opts: &mut RunOptions) {
    if opts.run_match.is_none() {
        if let Ok(value) = std::env::var("DRILL_RUN") {
            if !value.is_empty() {
                opts.run_match = Some(value);
            }
        }
    }
    if opts.run_ids.is_empty() {
        if let Ok(value) = std::env::var("DRILL_ID") {
            opts.run_ids = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    if opts.run_labels.is_empty() {
        if let Ok(value) = std::env::var("DRILL_LABEL") {
            if !value.is_empty() {
                opts.run_labels = vec![value];
            }
        }
    }
    if opts.scopes.is_empty() {
        if let Ok(value) = std::env::var("DRILL_SCOPES") {
            opts.scopes = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

/// Reversible replacement making label tokens valid identifiers.
fn replace_label_token(token: &str) -> String {
    token
        .replace('-', "___hyphen___")
        .replace('/', "___slash___")
        .replace('.', "___dot___")
        .replace(':', "___colon___")
}

/// Scope for label expressions: each label becomes a truthy member of
/// `labels`.
fn label_env(labels: &[String]) -> Value {
    let mut members = serde_json::Map::new();
    for label in labels {
        members.insert(replace_label_token(label), json!(true));
    }
    json!({ "labels": members })
}

/// Join label expressions into one condition. Labels combine with `or`;
/// within a label, `and` / `or` / `not` (and `!` sugar) work on label names.
fn label_cond(labels: &[String]) -> String {
    if labels.is_empty() {
        return "true".to_string();
    }
    let mut cond = String::new();
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            cond.push_str(" or ");
        }
        let label = label.replace('!', "not ");
        cond.push('(');
        let mut first = true;
        for token in label.split_whitespace() {
            if !first {
                cond.push(' ');
            }
            first = false;
            match token {
                "not" | "or" | "and" => cond.push_str(token),
                name => {
                    cond.push_str("labels.");
                    cond.push_str(&replace_label_token(name));
                }
            }
        }
        cond.push(')');
    }
    cond
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
