//! coreburn -- burn-in CPU load generator.
//!
//! Saturates integer ALUs, floating-point units and memory bandwidth on every
//! logical core (or a chosen number of threads) until stopped. The library
//! exposes a start/stop/heartbeat contract for orchestrators; the binary wraps
//! it with a CLI, signal handling and an optional status API.

pub mod api;
pub mod config;
pub mod error;
pub mod host;
pub mod stress;

pub use config::{CoreburnConfig, StressConfig};
pub use error::StressError;
pub use stress::{start, RunReport, StopToken, StressHandle};

use anyhow::Result;

/// Run a full CPU stress session: start workers, optionally serve the status
/// API, and wait until `stop` fires or the configured duration elapses.
///
/// `limit` overrides `config.stress.duration_secs` when given.
pub async fn serve(
    config: &CoreburnConfig,
    stop: StopToken,
    limit: Option<std::time::Duration>,
) -> Result<RunReport> {
    let host = host::HostInfo::collect();
    tracing::info!(
        cpu = %host.cpu_brand,
        cores = host.logical_cores,
        temperature_c = ?host.temperature_c,
        "host detected"
    );

    config.stress.validate()?;
    let workers = stress::resolve_worker_count(config.stress.thread_count)?;
    host.check_footprint(workers, config.stress.buffer_bytes());

    let listener = match config.status.bind {
        Some(addr) => Some(api::bind(addr).await?),
        None => None,
    };

    let handle = stress::start_with(&config.stress, stop)?;

    let status_task = listener.map(|listener| {
        let state = api::state::AppState::for_run(
            &handle,
            host.clone(),
            config.stress.idle_duration(),
        );
        let stop = handle.stop_token();
        tokio::spawn(async move {
            let served = api::serve(listener, state).await;
            if let Err(e) = &served {
                tracing::error!(error = %e, "status API failed, stopping run");
                stop.stop();
            }
            served
        })
    });

    let limit = limit.or_else(|| config.stress.duration());
    let report = tokio::task::spawn_blocking(move || handle.run_until(limit)).await??;

    if let Some(task) = status_task {
        match task.await {
            Ok(served) => served?,
            Err(e) => tracing::error!(error = %e, "status API task panicked"),
        }
    }
    Ok(report)
}
