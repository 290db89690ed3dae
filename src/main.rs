//! `depmatrix` — inventory dependency versions across repositories.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load the run manifest ([`config::load_manifest`]).
//! 3. Build the analyzer registry and orchestrator ([`analyzer`], [`orchestrator`]).
//! 4. Fan jobs out over the worker pool; a progress bar follows completion
//!    events ([`progress`]).
//! 5. Render the aggregated report ([`report`]) as a terminal matrix or JSON.
//! 6. Exit `0` (all jobs analyzed) or `1` (at least one job errored).

mod analyzer;
mod cli;
mod config;
mod error;
mod models;
mod orchestrator;
mod progress;
mod provider;
mod report;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use analyzer::AnalyzerRegistry;
use cli::{Cli, ReportFormat};
use orchestrator::Orchestrator;
use progress::{ProgressEvent, ProgressReceiver};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let manifest = config::load_manifest(&cli.config)?;
    let jobs = manifest.jobs(std::env::var("DEPMATRIX_TOKEN").ok().as_deref());

    if jobs.is_empty() {
        eprintln!("No repositories listed in {}", cli.config.display());
        std::process::exit(1);
    }

    let tracked = if cli.packages.is_empty() {
        manifest.packages.clone()
    } else {
        cli.packages.clone()
    };
    let concurrency = cli
        .concurrency
        .or(manifest.concurrency)
        .unwrap_or_else(num_cpus::get);

    let cancel = CancellationToken::new();
    if let Some(secs) = cli.timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            cancel.cancel();
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (sender, receiver) = progress::channel();
    let orchestrator = Orchestrator::new(AnalyzerRegistry::with_builtin())
        .with_concurrency(concurrency)
        .with_tracked_packages(tracked)
        .with_cancellation(cancel)
        .with_progress(sender);

    let bar = if cli.quiet {
        None
    } else {
        Some(spawn_progress_bar(jobs.len() as u64, receiver))
    };

    let matrix = orchestrator.run(jobs).await;

    // Dropping the orchestrator closes the event channel and lets the
    // progress task finish.
    drop(orchestrator);
    if let Some(bar) = bar {
        let _ = bar.await;
    }

    let report_format = match &cli.output {
        Some(_) => ReportFormat::Json,
        None => cli.report.clone(),
    };

    match report_format {
        ReportFormat::Terminal => {
            report::terminal::render(&matrix, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&matrix)?;
            match &cli.output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{}", json),
            }
        }
    }

    if matrix.summary.error_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Follow completion events with an `indicatif` bar; failed jobs are echoed
/// above the bar as they land.
fn spawn_progress_bar(total: u64, mut receiver: ProgressReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::JobStarted { slug } => {
                    pb.set_message(slug);
                }
                ProgressEvent::JobFinished { slug, error, .. } => {
                    if let Some(err) = error {
                        pb.println(format!("  {} {}: {}", "✗".red(), slug, err));
                    }
                    pb.inc(1);
                }
            }
        }

        pb.finish_with_message("Done");
    })
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
