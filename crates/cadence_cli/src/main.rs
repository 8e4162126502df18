//! Cadence CLI - run enter/exit sequence scenarios from the terminal
//!
//! Loads a scenario file, builds the scope tree it describes and drives the
//! sequences on a tokio runtime, printing every visibility change:
//!
//! ```text
//! cadence run scenarios/page.toml --exit
//! cadence check scenarios/page.toml
//! ```

mod scenario;

use anyhow::Result;
use cadence_sequence::{RunOutcome, SequenceHost};
use clap::{Parser, Subcommand};
use scenario::Scenario;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

/// Run and inspect enter/exit sequence scenarios
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Run and inspect enter/exit sequence scenarios")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the enter sequence of every scope and print the timeline
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Run the cascaded exit after entering
        #[arg(long)]
        exit: bool,

        /// Hide everything at once instead of in reverse order
        #[arg(long, requires = "exit")]
        all: bool,

        /// Pause between enter and exit (ms)
        #[arg(long, default_value = "500")]
        hold_ms: u64,

        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario and print per-scope estimates
    Check {
        /// Scenario file
        scenario: PathBuf,
    },
}

/// One line of timeline output
#[derive(Debug, Serialize)]
struct TimelineEvent<'a> {
    t_ms: u128,
    scope: &'a str,
    index: i32,
    label: &'a str,
    visible: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            exit,
            all,
            hold_ms,
            json,
        } => {
            let scenario = Scenario::load(&scenario)?;
            run(&scenario, exit.then_some(all), hold_ms, json).await
        }
        Commands::Check { scenario } => {
            let loaded = Scenario::load(&scenario)?;
            check(&loaded)?;
            println!("{}: ok", scenario.display());
            Ok(())
        }
    }
}

/// Enter every scope concurrently, then optionally exit from the top
async fn run(scenario: &Scenario, exit: Option<bool>, hold_ms: u64, json: bool) -> Result<()> {
    let roots = scenario.build()?;
    let start = Instant::now();

    let mut watchers = JoinSet::new();
    for scope in roots.iter().flat_map(|r| r.walk()) {
        for item in &scope.items {
            let mut rx = item.item.visibility().subscribe();
            let path = scope.path.clone();
            let label = item.label.clone();
            let index = item.item.index();
            watchers.spawn(async move {
                while rx.changed().await.is_ok() {
                    let visible = *rx.borrow_and_update();
                    print_event(
                        &TimelineEvent {
                            t_ms: start.elapsed().as_millis(),
                            scope: &path,
                            index,
                            label: &label,
                            visible,
                        },
                        json,
                    );
                }
            });
        }
    }

    let hosts: Vec<SequenceHost> = roots
        .iter()
        .flat_map(|r| r.walk())
        .map(|s| s.scope.host().clone())
        .collect();
    tracing::info!(scopes = hosts.len(), "running enter sequences");
    let mut entering = JoinSet::new();
    for host in hosts {
        entering.spawn(async move { host.enter().await });
    }
    while let Some(joined) = entering.join_next().await {
        joined??;
    }

    if let Some(all) = exit {
        tokio::time::sleep(Duration::from_millis(hold_ms)).await;
        tracing::info!(all, "running exit sequences");
        for root in &roots {
            if root.scope.host().exit(all).await? == RunOutcome::Busy {
                tracing::warn!(scope = %root.path, "exit skipped, scope busy");
            }
        }
    }

    // Let watchers print the final changes before shutting them down
    tokio::task::yield_now().await;
    watchers.shutdown().await;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "done");
    Ok(())
}

fn print_event(event: &TimelineEvent<'_>, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(err) => tracing::warn!(error = %err, "failed to encode event"),
        }
    } else {
        println!(
            "[+{:>6}ms] {:<20} {:>4} {:<16} {}",
            event.t_ms,
            event.scope,
            event.index,
            event.label,
            if event.visible { "shown" } else { "hidden" }
        );
    }
}

fn check(scenario: &Scenario) -> Result<()> {
    let roots = scenario.build()?;
    for scope in roots.iter().flat_map(|r| r.walk()) {
        let host = scope.scope.host();
        println!(
            "{:<24} items={:<3} children={:<2} enter~{}ms",
            scope.path,
            host.registry().len(),
            scope.children.len(),
            scope.estimated_enter_ms(),
        );
    }
    Ok(())
}
