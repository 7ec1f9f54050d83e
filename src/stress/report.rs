//! Outcome of a finished stress run and its human-readable summary.
//!
//! This is a load generator, not a benchmark: the report says whether every
//! worker actually cycled, never how fast.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::worker::WorkerSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every worker completed at least one full cycle.
    Pass,
    /// The run was stopped before some worker finished a single cycle.
    Incomplete,
}

/// Final report of a run that shut down cleanly.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub total_cycles: u64,
    pub workers: Vec<WorkerSummary>,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        mut workers: Vec<WorkerSummary>,
    ) -> Self {
        workers.sort_by_key(|w| w.index);
        let status = if !workers.is_empty() && workers.iter().all(|w| w.cycles > 0) {
            RunStatus::Pass
        } else {
            RunStatus::Incomplete
        };
        Self {
            run_id,
            started_at,
            finished_at,
            status,
            total_cycles: workers.iter().map(|w| w.cycles).sum(),
            workers,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// One-line summary for logs and the terminal.
pub fn format_summary(report: &RunReport) -> String {
    let status = match report.status {
        RunStatus::Pass => "PASS",
        RunStatus::Incomplete => "INCOMPLETE",
    };
    let n = report.workers.len();
    format!(
        "CPU stress {}: {} worker{}, {} cycle{} in {:.1}s",
        status,
        n,
        if n == 1 { "" } else { "s" },
        report.total_cycles,
        if report.total_cycles == 1 { "" } else { "s" },
        report.elapsed_secs(),
    )
}
