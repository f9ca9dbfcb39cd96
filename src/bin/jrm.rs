//! jrm - memory usage of a JVM process and its children
//!
//! Prints one line per new sample. Values are bytes; `-1` means no data,
//! `-2` means nothing new since the last sample (JSON output only).
//!
//! # Usage
//!
//! ```bash
//! # Watch one process
//! jrm watch 4242
//!
//! # Watch a launcher and everything it spawned, as JSON lines
//! jrm watch 4242 --children --json
//!
//! # List descendants
//! jrm children 4242
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jrm_core::{Config, Platform, NO_DATA, SAME_DATA};
use jrm_sampler::{descendants, spawn_poller, MetricSample, MonitorSession, UnsupportedAttach};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the sample channel shared by all pollers.
const SAMPLE_BUFFER: usize = 256;

/// jrm - TTL-gated memory sampling
#[derive(Parser, Debug)]
#[command(name = "jrm", version, about)]
struct Args {
    /// Config file (defaults to <config dir>/jrm/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a process until interrupted
    Watch {
        /// Process to watch
        pid: u32,

        /// Also watch every descendant of PID
        #[arg(long)]
        children: bool,

        /// UI tick in milliseconds
        #[arg(long, default_value_t = 250)]
        tick_ms: u64,

        /// Print every sample as a JSON line
        #[arg(long)]
        json: bool,

        /// Show metrics hidden by default
        #[arg(long)]
        all: bool,
    },
    /// List the descendants of a process
    Children {
        /// Root process
        pid: u32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Children { pid } => {
            for child in descendants(pid) {
                println!("{child}");
            }
            Ok(())
        }
        Command::Watch {
            pid,
            children,
            tick_ms,
            json,
            all,
        } => {
            let config = load_config(args.config)?;
            let opts = WatchOptions {
                pid,
                children,
                tick: Duration::from_millis(tick_ms.max(1)),
                json,
                all,
            };
            run_watch(config, opts)
        }
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let path = match explicit.or_else(Config::default_path) {
        Some(path) => path,
        None => return Ok(Config::default()),
    };
    Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

struct WatchOptions {
    pid: u32,
    children: bool,
    tick: Duration,
    json: bool,
    all: bool,
}

#[tokio::main]
async fn run_watch(config: Config, opts: WatchOptions) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("jrm=info".parse()?)
                .add_directive("jrm_core=info".parse()?)
                .add_directive("jrm_sampler=info".parse()?),
        )
        .init();

    let Some(platform) = Platform::current() else {
        bail!("Unsupported platform: only Linux and Windows can be sampled");
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = opts.pid,
        platform = %platform,
        profile = ?config.profile,
        "jrm starting"
    );

    let mut pids = vec![opts.pid];
    if opts.children {
        let root = opts.pid;
        let found = tokio::task::spawn_blocking(move || descendants(root))
            .await
            .context("Descendant lookup failed")?;
        pids.extend(found);
    }

    let session = Arc::new(MonitorSession::new(config, Arc::new(UnsupportedAttach)));
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let (tx, mut rx) = mpsc::channel(SAMPLE_BUFFER);
    let mut pollers = Vec::with_capacity(pids.len());

    for pid in pids {
        let builder = Arc::clone(&session);
        let metrics = tokio::task::spawn_blocking(move || builder.create_metrics(pid, platform))
            .await
            .context("Building metrics failed")?;
        if opts.all {
            metrics.iter().for_each(|m| m.enable());
        }
        pollers.push(spawn_poller(metrics, opts.tick, tx.clone(), cancel_token.clone()));
    }
    drop(tx);

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            sample = rx.recv() => match sample {
                Some(sample) => print_sample(&sample, opts.json),
                None => break,
            },
        }
    }

    cancel_token.cancel();
    for poller in pollers {
        if let Err(e) = poller.await {
            warn!(error = %e, "Poller task failed");
        }
    }

    let session_for_shutdown = Arc::clone(&session);
    tokio::task::spawn_blocking(move || session_for_shutdown.shutdown())
        .await
        .context("Session shutdown failed")?;

    info!(pid = process::id(), "jrm stopped");
    Ok(())
}

fn print_sample(sample: &MetricSample, json: bool) {
    if json {
        match serde_json::to_string(sample) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to encode sample"),
        }
        return;
    }

    let value = match sample.value {
        SAME_DATA => return,
        NO_DATA => "n/a".to_string(),
        bytes => format_bytes(bytes),
    };
    println!(
        "{} pid={} {}={}",
        sample.at.format("%H:%M:%S%.3f"),
        sample.pid,
        sample.metric,
        value
    );
}

fn format_bytes(bytes: i64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!("{:.1} MiB", bytes as f64 / MIB)
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
