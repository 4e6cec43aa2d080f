//! trajlens - CLI for inspecting AI coding-agent evaluation transcripts
//!
//! Lists logs in the configured store, parses individual transcripts into
//! structured trajectories, and aggregates per-model pass rates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use trajlens_core::types::Trajectory;
use trajlens_core::{AggregateSummary, Aggregator, Config, FsLogStore, LogReader, ModelNormalizer};

#[derive(Parser)]
#[command(name = "trajlens")]
#[command(about = "Inspect and aggregate AI agent evaluation transcripts")]
#[command(version)]
struct Args {
    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Override the log store directory from config
    #[arg(long)]
    store_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List log files in the store
    List,
    /// Parse one log into a structured trajectory
    Parse {
        /// Log filename, e.g. gpt-4o_counsellor-chat_task-1.log
        filename: String,
    },
    /// Aggregate per-model pass rates across the whole store
    Aggregate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        trajlens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("trajlens starting");

    let root = args
        .store_root
        .clone()
        .unwrap_or_else(|| config.store.root.clone());
    let store = Arc::new(FsLogStore::new(root));
    let normalizer = ModelNormalizer::with_defaults();
    let json = match args.format.as_str() {
        "json" => true,
        "text" => false,
        other => anyhow::bail!("unknown format '{}', expected text or json", other),
    };

    match args.command {
        Command::List => {
            let reader = LogReader::new(store, normalizer, config.store.fetch_timeout());
            let files = reader.list().await.context("failed to list log store")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                println!("No log files found.");
            } else {
                for file in files {
                    println!("{:>10}  {}", file.size_bytes, file.filename);
                }
            }
        }
        Command::Parse { filename } => {
            let reader = LogReader::new(store, normalizer, config.store.fetch_timeout());
            let trajectory = reader
                .load(&filename)
                .await
                .with_context(|| format!("failed to load {}", filename))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trajectory)?);
            } else {
                print_trajectory(&trajectory);
            }
        }
        Command::Aggregate => {
            let aggregator = Aggregator::new(
                store,
                normalizer,
                config.aggregate.concurrency,
                config.store.fetch_timeout(),
            );
            let summary = aggregator.run().await.context("aggregation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
    }

    Ok(())
}

fn print_trajectory(t: &Trajectory) {
    println!("Task:       {}", t.task_name);
    println!("Model:      {}", t.model_name);
    println!("Iterations: {}", t.total_iterations);
    println!("Tool calls: {}", t.tool_calls);
    println!("Errors:     {}", t.errors);
    println!("Tests:      {}/{} passed", t.tests_passed, t.total_tests);
    if let Some(duration) = &t.duration {
        println!("Duration:   {}", duration);
    }
    println!(
        "Verdict:    {}",
        if t.final_success { "PASS" } else { "FAIL" }
    );

    if !t.test_results.is_empty() {
        println!("\nTest results:");
        for result in &t.test_results {
            println!("  {:4}  {}", result.status.as_str(), result.full_name);
        }
    }

    if let Some(diffs) = &t.final_diffs {
        println!("\nChanged files:");
        for file in &diffs.files_changed {
            println!("  {}", file);
        }
    }

    for (label, baseline) in [
        ("oracle", t.oracle_baseline.as_deref()),
        ("null-agent", t.nullagent_baseline.as_deref()),
    ] {
        if let Some(b) = baseline {
            println!(
                "\nBaseline ({}): {}/{} tests, {}",
                label,
                b.tests_passed,
                b.total_tests,
                if b.final_success { "PASS" } else { "FAIL" }
            );
        }
    }
}

fn print_summary(summary: &AggregateSummary) {
    println!("Per task:");
    print_counts(&summary.per_task);
    println!("\nPer test case (discounted):");
    print_counts(&summary.per_test_case);
    if summary.skipped > 0 {
        println!("\nSkipped {} unreadable log(s)", summary.skipped);
    }
}

fn print_counts(counts: &std::collections::BTreeMap<String, trajlens_core::ModelCounts>) {
    if counts.is_empty() {
        println!("  (no agent runs found)");
        return;
    }
    for (model, c) in counts {
        let rate = if c.total > 0 {
            100.0 * f64::from(c.pass) / f64::from(c.total)
        } else {
            0.0
        };
        println!("  {:<24} {:>4}/{:<4} ({:>5.1}%)", model, c.pass, c.total, rate);
    }
}
