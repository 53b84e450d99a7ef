// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! drill: run scenario runbooks against real systems.

mod color;
mod output;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use drill_engine::{Fleet, RunOptions};
use drill_runbook::parse_duration;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drill", version, about = "Run scenario runbooks against real systems")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run runbooks matching a path pattern
    Run(RunArgs),
    /// List runbooks matching a path pattern without running them
    List(ListArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path pattern (file, directory, or glob)
    pattern: String,
    /// Maximum number of concurrently running runbooks
    #[arg(long, default_value_t = 1)]
    concurrent: usize,
    /// Shuffle the run order with the given seed
    #[arg(long)]
    shuffle: Option<u64>,
    /// Number of shards
    #[arg(long)]
    shard_n: Option<usize>,
    /// Index of the shard to run
    #[arg(long, default_value_t = 0)]
    shard_index: usize,
    /// Run this many runbooks sampled without replacement
    #[arg(long)]
    sample: Option<usize>,
    /// Run this many runbooks picked with replacement
    #[arg(long)]
    random: Option<usize>,
    /// Label expression filter (repeatable, also DRILL_LABEL)
    #[arg(long)]
    label: Vec<String>,
    /// Id prefix filter (repeatable, also DRILL_ID)
    #[arg(long)]
    id: Vec<String>,
    /// Path regex filter (also DRILL_RUN)
    #[arg(long = "run")]
    run_match: Option<String>,
    /// Grant a runner-visibility scope, e.g. read:parent (repeatable, also
    /// DRILL_SCOPES)
    #[arg(long = "scope")]
    scopes: Vec<String>,
    /// Skip `test:` sections without failing their steps
    #[arg(long)]
    skip_test: bool,
    /// Keep running steps after a failure
    #[arg(long)]
    force: bool,
    /// Abort the whole run when any runbook fails
    #[arg(long)]
    fail_fast: bool,
    /// Echo step activity to stderr
    #[arg(long)]
    debug: bool,
    /// Exclude runbooks included by another selected runbook
    #[arg(long)]
    skip_included: bool,
    /// Write a run profile (JSON) to this path
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Grace period for subtasks after cancellation (e.g. "10s")
    #[arg(long, default_value = "10s")]
    wait_timeout: String,
    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Path pattern (file, directory, or glob)
    pattern: String,
    /// Label expression filter (repeatable)
    #[arg(long)]
    label: Vec<String>,
    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::List(args) => list(args)?,
    };
    std::process::exit(code);
}

async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)
        .map_err(|e| anyhow::anyhow!("invalid --wait-timeout: {}", e))?;
    let opts = RunOptions {
        concurrent_max: args.concurrent,
        shuffle_seed: args.shuffle,
        shard: args.shard_n.map(|n| (n, args.shard_index)),
        sample: args.sample,
        random: args.random,
        run_match: args.run_match,
        run_ids: args.id,
        run_labels: args.label,
        scopes: args.scopes,
        skip_test: args.skip_test,
        force: args.force,
        fail_fast: args.fail_fast,
        debug: args.debug,
        profile: args.profile.is_some(),
        skip_included: args.skip_included,
        wait_timeout,
        ..RunOptions::default()
    };

    let fleet = Fleet::load(&args.pattern, opts)
        .with_context(|| format!("failed to load runbooks: {}", args.pattern))?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, waiting for running scenarios");
            signal_cancel.cancel();
        }
    });

    let result = fleet.run_all(cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for run_result in &result.run_results {
            println!("{}", output::result_line(run_result));
        }
        for failed in result.failed() {
            eprintln!("{}", output::failure_report(failed));
        }
        println!("{}", output::summary(&result));
    }

    if let Some(path) = &args.profile {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create profile file: {}", path.display()))?;
        fleet.dump_profile(&mut file).context("failed to write profile")?;
    }

    Ok(if result.has_failure() { 1 } else { 0 })
}

fn list(args: ListArgs) -> anyhow::Result<i32> {
    let opts = RunOptions {
        load_only: true,
        run_labels: args.label,
        ..RunOptions::default()
    };
    let fleet = Fleet::load(&args.pattern, opts)
        .with_context(|| format!("failed to load runbooks: {}", args.pattern))?;
    let entries = fleet.list();
    if args.json {
        let rendered: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "path": e.path,
                    "desc": e.desc,
                    "labels": e.labels,
                    "steps": e.number_of_steps,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        for entry in &entries {
            let labels = if entry.labels.is_empty() {
                String::new()
            } else {
                format!(" [{}]", entry.labels.join(", "))
            };
            println!(
                "{}  {} ({} steps){}",
                &entry.id[..entry.id.len().min(8)],
                entry.path,
                entry.number_of_steps,
                labels
            );
        }
    }
    Ok(0)
}
