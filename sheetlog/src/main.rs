//! sheetlog - spreadsheet interaction logger
//!
//! Captures spreadsheet interactions and delivers them in batches to a log
//! collector. The `run` command drives the delivery client from a replayed
//! host: JSON lines on stdin stand in for the spreadsheet application.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/sheetlog/sheetlog.log.<date> (~/.local/state/sheetlog/)
//! - Config: $XDG_CONFIG_HOME/sheetlog/config.toml (~/.config/sheetlog/config.toml)

mod console;
mod replay;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheetlog_core::delivery::{
    now_millis, DeliveryClient, HttpTransport, Payload, ProbeRequest, Transport,
};
use sheetlog_core::{Config, Error};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;

use crate::console::ConsoleStatus;
use crate::replay::{ReplayHost, ReplayLine};

#[derive(Parser)]
#[command(name = "sheetlog")]
#[command(about = "Log spreadsheet interactions to a collector")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/sheetlog/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (debug-level log file)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the effective delivery configuration
    Status,

    /// Check once whether the collector is reachable
    Probe,

    /// Replay host notifications from stdin and deliver them
    Run,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    let log_guard =
        sheetlog_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(command = command_name(&args.command), "sheetlog starting");

    match args.command {
        Command::Status => {
            cmd_status(&config, log_guard.path());
            Ok(ExitCode::SUCCESS)
        }
        Command::Probe => block_on_local(cmd_probe(config)),
        Command::Run => block_on_local(cmd_run(config)),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Status => "status",
        Command::Probe => "probe",
        Command::Run => "run",
    }
}

/// Run `future` on a single-threaded runtime inside a `LocalSet`.
fn block_on_local<F>(future: F) -> Result<ExitCode>
where
    F: std::future::Future<Output = Result<ExitCode>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;
    let result = LocalSet::new().block_on(&runtime, future);
    // a blocking stdin read may still be pending after Ctrl-C
    runtime.shutdown_background();
    result
}

fn cmd_status(config: &Config, log_file: &Path) {
    let delivery = &config.delivery;
    let retry = &delivery.retry;

    println!("Delivery Configuration");
    println!("======================");
    println!();
    println!("Endpoint:        {}", delivery.endpoint_url);
    println!("Batch interval:  {}ms", delivery.batch_interval_ms);
    println!("Poll interval:   {}ms", delivery.poll_interval_ms);
    println!("Throttle window: {}ms", delivery.throttle_window_ms);
    println!("Request timeout: {}ms", delivery.request_timeout_ms);
    println!(
        "Large ranges:    over {} cells, {}x{} sample",
        delivery.large_range_cell_limit, delivery.sample_size, delivery.sample_size
    );
    println!(
        "Invalid certs:   {}",
        if delivery.accept_invalid_certs {
            "accepted"
        } else {
            "rejected"
        }
    );
    println!();
    println!("Retry Schedule");
    println!("--------------");
    println!(
        "Tier 1: every {}ms for {}ms",
        retry.tier1_interval_ms, retry.tier1_duration_ms
    );
    println!(
        "Tier 2: every {}ms for {}ms",
        retry.tier2_interval_ms, retry.tier2_duration_ms
    );
    println!("Tier 3: every {}ms", retry.tier3_interval_ms);
    println!();
    println!("Log file:        {}", log_file.display());
}

async fn cmd_probe(config: Config) -> Result<ExitCode> {
    let transport =
        HttpTransport::new(&config.delivery).context("failed to create transport")?;
    let payload = Payload::Probe(ProbeRequest::new(now_millis()));

    let outcome = tokio::time::timeout(config.delivery.request_timeout(), transport.send(&payload))
        .await
        .unwrap_or_else(|_| Err(Error::Timeout(config.delivery.request_timeout())));

    match outcome {
        Ok(()) => {
            println!("Collector reachable at {}", transport.endpoint_url());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Probe failed");
            println!("Collector unreachable at {}: {}", transport.endpoint_url(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_run(config: Config) -> Result<ExitCode> {
    let transport =
        HttpTransport::new(&config.delivery).context("failed to create transport")?;
    let host = ReplayHost::new();
    let client = DeliveryClient::with_status_sink(
        config.delivery,
        transport,
        host.clone(),
        ConsoleStatus::new(),
    )
    .context("failed to create delivery client")?;

    client.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ReplayLine>(line) {
            Ok(ReplayLine::Notification(notification)) => {
                if host.accept(&notification) {
                    client.notify(notification);
                }
            }
            Ok(ReplayLine::State(update)) => host.apply(update),
            Err(e) => {
                tracing::warn!(error = %e, "Unrecognized input line");
                eprintln!("Skipping unrecognized input: {}", e);
            }
        }
        // let the client react before the next line
        tokio::task::yield_now().await;
    }

    client.shutdown().await;

    let stats = client.stats();
    println!();
    println!(
        "Delivered {} event(s) in {} batch(es), {} failed batch(es), {} pending",
        stats.events_sent,
        stats.batches_sent,
        stats.batches_failed,
        client.pending_count()
    );
    tracing::info!(
        events_sent = stats.events_sent,
        batches_sent = stats.batches_sent,
        pending = client.pending_count(),
        "sheetlog finished"
    );
    Ok(ExitCode::SUCCESS)
}
