use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use coreburn::config::{parse_duration, parse_thread_count, CoreburnConfig, LoggingConfig};
use coreburn::stress::{format_summary, RunReport, RunStatus};
use coreburn::StopToken;

#[derive(Parser)]
#[command(
    name = "coreburn",
    about = "Burn-in CPU load generator: integer, floating-point and memory stress on every core",
    version,
    long_about = None
)]
struct Cli {
    /// Worker thread count (default: one per logical core)
    #[arg(allow_negative_numbers = true)]
    threads: Option<String>,

    /// Config file (default: $COREBURN_CONFIG, then /etc/coreburn/coreburn.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Integer phase iterations per cycle
    #[arg(long)]
    integer_iterations: Option<u64>,

    /// Floating-point phase iterations per cycle
    #[arg(long)]
    float_iterations: Option<u64>,

    /// Scratch buffer length per worker, in 32-bit elements
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Idle pause at the end of each cycle, in milliseconds
    #[arg(long)]
    idle_ms: Option<u64>,

    /// Stop after this long (e.g. 30s, 10m, 2h). Runs until interrupted if unset.
    #[arg(long)]
    duration: Option<String>,

    /// Double the idle pause
    #[arg(long)]
    modulate: bool,

    /// Lower worker priority by this niceness increment (0-19)
    #[arg(long, allow_negative_numbers = true)]
    nice: Option<i32>,

    /// Serve the status API on this address
    #[arg(long, env = "COREBURN_STATUS_BIND")]
    status_bind: Option<SocketAddr>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Layer command-line values over the file/default configuration.
    fn apply(&self, config: &mut CoreburnConfig) -> Result<()> {
        let stress = &mut config.stress;
        if let Some(raw) = &self.threads {
            stress.thread_count = Some(parse_thread_count(raw)?);
        }
        if let Some(n) = self.integer_iterations {
            stress.integer_iterations = n;
        }
        if let Some(n) = self.float_iterations {
            stress.float_iterations = n;
        }
        if let Some(n) = self.buffer_size {
            stress.buffer_size = n;
        }
        if let Some(ms) = self.idle_ms {
            stress.idle_ms = ms;
        }
        if self.modulate {
            stress.modulate = true;
        }
        if let Some(n) = self.nice {
            stress.niceness = Some(n);
        }
        if let Some(addr) = self.status_bind {
            config.status.bind = Some(addr);
        }
        if self.log_json {
            config.logging.json = true;
        }
        Ok(())
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Stop the run on Ctrl-C, or SIGTERM on Unix.
fn spawn_signal_listener(stop: StopToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::warn!("interrupt received, stopping workers");
        stop.stop();
    });
}

fn print_report(report: &RunReport) {
    println!("\ncoreburn CPU Stress Report");
    println!("Run: {}", report.run_id);
    println!("{:<10} | Cycles", "Worker");
    println!("{:-<10}-|-{:-<12}", "", "");
    for w in &report.workers {
        println!("{:<10} | {}", w.index, w.cycles);
    }
    println!("\n{}", format_summary(report));
    if report.status == RunStatus::Incomplete {
        println!("  -> Recommendation: run longer so every worker completes a full cycle.");
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CoreburnConfig::resolve(cli.config.as_deref())?;
    cli.apply(&mut config)?;
    init_tracing(&config.logging);

    // Reject bad input before a single worker exists.
    config.stress.validate()?;
    let limit = cli.duration.as_deref().map(parse_duration).transpose()?;

    let stop = StopToken::new();
    spawn_signal_listener(stop.clone());

    let report = coreburn::serve(&config, stop, limit).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}
