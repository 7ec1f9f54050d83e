//! CPU load engine.
//!
//! One OS thread per worker, each cycling through integer, floating-point
//! and memory phases with a short idle pause, until told to stop. Workers
//! share nothing but the stop token and their own heartbeat slot.

pub mod heartbeat;
pub mod launcher;
pub mod phases;
pub mod report;
pub mod stop;
pub mod worker;

pub use heartbeat::{Heartbeat, HeartbeatSnapshot, WorkerStatus};
pub use launcher::{
    detected_cores, resolve_worker_count, run, start, start_with, StressHandle,
};
pub use report::{format_summary, RunReport, RunStatus};
pub use stop::StopToken;
pub use worker::{Phase, WorkerSummary};
