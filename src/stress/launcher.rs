//! Thread pool launcher: resolves the worker count, spawns one OS thread per
//! worker, and owns the handles until the run is joined.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::heartbeat::{Heartbeat, HeartbeatSnapshot};
use super::report::{format_summary, RunReport};
use super::stop::StopToken;
use super::worker::{worker_main, WorkerSettings, WorkerSummary};
use crate::config::StressConfig;
use crate::error::StressError;

/// How often [`StressHandle::run_until`] checks for a stop or deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Logical cores the OS reports, never less than one.
pub fn detected_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Effective worker count: the override when given, else one per logical core.
pub fn resolve_worker_count(requested: Option<usize>) -> Result<usize, StressError> {
    match requested {
        Some(0) => Err(StressError::config(
            "thread_count",
            "must be a positive integer, got 0",
        )),
        Some(n) => Ok(n),
        None => Ok(detected_cores()),
    }
}

/// A running stress session.
///
/// Dropping the handle without calling [`StressHandle::shutdown`] or
/// [`StressHandle::join`] leaves the workers running detached.
#[derive(Debug)]
pub struct StressHandle {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    stop: StopToken,
    heartbeat: Arc<Heartbeat>,
    threads: Vec<JoinHandle<Result<WorkerSummary, StressError>>>,
}

/// Validate `config` and spawn its workers with a fresh stop token.
pub fn start(config: &StressConfig) -> Result<StressHandle, StressError> {
    start_with(config, StopToken::new())
}

/// Like [`start`], but workers obey a caller-supplied token.
pub fn start_with(config: &StressConfig, stop: StopToken) -> Result<StressHandle, StressError> {
    config.validate()?;
    let workers = resolve_worker_count(config.thread_count)?;
    let settings = WorkerSettings::from(config);
    let heartbeat = Arc::new(Heartbeat::new(workers));
    let run_id = Uuid::new_v4();

    info!(
        %run_id,
        workers,
        buffer_bytes = config.buffer_bytes(),
        integer_iterations = config.integer_iterations,
        float_iterations = config.float_iterations,
        idle_ms = settings.idle.as_millis() as u64,
        "starting CPU stress"
    );

    let mut threads = Vec::with_capacity(workers);
    for index in 0..workers {
        let spawned = thread::Builder::new()
            .name(format!("coreburn-{index}"))
            .spawn({
                let settings = settings.clone();
                let stop = stop.clone();
                let heartbeat = heartbeat.clone();
                move || worker_main(index, settings, stop, heartbeat)
            });

        match spawned {
            Ok(handle) => threads.push(handle),
            Err(source) => {
                error!(worker = index, error = %source, "failed to spawn worker, stopping run");
                stop.stop();
                for handle in threads {
                    let _ = handle.join();
                }
                return Err(StressError::Spawn {
                    worker: index,
                    source,
                });
            }
        }
    }

    Ok(StressHandle {
        run_id,
        started_at: Utc::now(),
        stop,
        heartbeat,
        threads,
    })
}

/// Blocking launcher contract: start, then wait for every worker to exit.
///
/// Returns only once `stop` fires (or a worker fails).
pub fn run(config: &StressConfig, stop: StopToken) -> Result<RunReport, StressError> {
    start_with(config, stop)?.join()
}

impl StressHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Shared liveness board, for pollers that outlive a borrow of the handle.
    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        self.heartbeat.clone()
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        self.heartbeat.snapshot()
    }

    /// Ask every worker to stop. Returns immediately.
    pub fn stop(&self) {
        if !self.stop.is_stopped() {
            info!(run_id = %self.run_id, "stop requested");
        }
        self.stop.stop();
    }

    /// True while at least one worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.threads.iter().any(|h| !h.is_finished())
    }

    /// Wait for every worker to exit and collect the outcome.
    ///
    /// All workers are joined even when one fails; the error of the lowest
    /// failing worker index is returned.
    pub fn join(self) -> Result<RunReport, StressError> {
        let mut summaries = Vec::with_capacity(self.threads.len());
        let mut failure: Option<StressError> = None;

        for (index, handle) in self.threads.into_iter().enumerate() {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(StressError::WorkerPanicked { worker: index }),
            };
            match outcome {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            error!(run_id = %self.run_id, error = %e, "CPU stress failed");
            return Err(e);
        }

        let report = RunReport::new(self.run_id, self.started_at, Utc::now(), summaries);
        info!(run_id = %self.run_id, "{}", format_summary(&report));
        Ok(report)
    }

    /// Block until the token is stopped, every worker has exited, or `limit`
    /// has elapsed; then stop and join.
    pub fn run_until(self, limit: Option<Duration>) -> Result<RunReport, StressError> {
        let deadline = limit.map(|d| Instant::now() + d);
        loop {
            if self.stop.is_stopped() || !self.is_running() {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!(run_id = %self.run_id, "duration limit reached");
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.shutdown()
    }

    /// Stop and join.
    pub fn shutdown(self) -> Result<RunReport, StressError> {
        self.stop();
        self.join()
    }

    /// Block until every worker has reported a running phase, or `timeout`.
    pub fn wait_until_running(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.heartbeat.running_workers() == self.worker_count() {
                return true;
            }
            if self.stop.is_stopped() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        warn!(
            run_id = %self.run_id,
            running = self.heartbeat.running_workers(),
            workers = self.worker_count(),
            "not every worker reported in"
        );
        false
    }
}
