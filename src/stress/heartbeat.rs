//! Worker liveness counters.
//!
//! Each [`WorkerBeat`] is written only by its own worker and read by whoever
//! polls the run, so relaxed atomics are enough: the poller wants a recent
//! value, not a consistent cut across workers.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::worker::Phase;

/// Liveness state of one worker.
#[derive(Debug)]
pub struct WorkerBeat {
    phase: AtomicU8,
    cycles: AtomicU64,
    last_beat_ms: AtomicU64,
}

impl WorkerBeat {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
            cycles: AtomicU64::new(0),
            last_beat_ms: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}

/// Liveness board for a whole run: one slot per worker.
#[derive(Debug)]
pub struct Heartbeat {
    started: Instant,
    workers: Vec<WorkerBeat>,
}

impl Heartbeat {
    pub fn new(workers: usize) -> Self {
        Self {
            started: Instant::now(),
            workers: (0..workers).map(|_| WorkerBeat::new()).collect(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, index: usize) -> Option<&WorkerBeat> {
        self.workers.get(index)
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Record that `index` entered `phase`.
    pub(crate) fn enter(&self, index: usize, phase: Phase) {
        if let Some(beat) = self.workers.get(index) {
            beat.phase.store(phase as u8, Ordering::Relaxed);
            beat.last_beat_ms.store(self.now_ms(), Ordering::Relaxed);
        }
    }

    /// Record that `index` finished a full cycle.
    pub(crate) fn cycle_done(&self, index: usize) {
        if let Some(beat) = self.workers.get(index) {
            beat.cycles.fetch_add(1, Ordering::Relaxed);
            beat.last_beat_ms.store(self.now_ms(), Ordering::Relaxed);
        }
    }

    /// Total cycles completed across all workers.
    pub fn total_cycles(&self) -> u64 {
        self.workers.iter().map(WorkerBeat::cycles).sum()
    }

    /// Number of workers currently inside the phase cycle.
    pub fn running_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.phase().is_running())
            .count()
    }

    /// True when every worker is cycling and has beaten within `max_silence`.
    pub fn is_alive(&self, max_silence: Duration) -> bool {
        let now = self.now_ms();
        let window = max_silence.as_millis() as u64;
        !self.workers.is_empty()
            && self.workers.iter().all(|w| {
                w.phase().is_running()
                    && now.saturating_sub(w.last_beat_ms.load(Ordering::Relaxed)) <= window
            })
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        let now = self.now_ms();
        let workers = self
            .workers
            .iter()
            .enumerate()
            .map(|(index, w)| WorkerStatus {
                index,
                phase: w.phase(),
                cycles: w.cycles(),
                silent_ms: now.saturating_sub(w.last_beat_ms.load(Ordering::Relaxed)),
            })
            .collect();

        HeartbeatSnapshot {
            uptime_ms: now,
            running: self.running_workers(),
            total_cycles: self.total_cycles(),
            workers,
        }
    }
}

/// Point-in-time view of a run, safe to serialize and hand to an orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatSnapshot {
    pub uptime_ms: u64,
    pub running: usize,
    pub total_cycles: u64,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub index: usize,
    pub phase: Phase,
    pub cycles: u64,
    /// Milliseconds since this worker last reported.
    pub silent_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_not_alive() {
        let hb = Heartbeat::new(3);
        assert_eq!(hb.worker_count(), 3);
        assert_eq!(hb.running_workers(), 0);
        assert!(!hb.is_alive(Duration::from_secs(60)));
        assert!(hb.snapshot().workers.iter().all(|w| w.phase == Phase::Starting));
    }

    #[test]
    fn test_empty_board_is_never_alive() {
        assert!(!Heartbeat::new(0).is_alive(Duration::from_secs(60)));
    }

    #[test]
    fn test_enter_and_cycle_done_update_snapshot() {
        let hb = Heartbeat::new(2);
        hb.enter(0, Phase::Integer);
        hb.enter(1, Phase::MemoryAdd);
        hb.cycle_done(1);
        hb.cycle_done(1);

        assert!(hb.is_alive(Duration::from_secs(60)));

        let snap = hb.snapshot();
        assert_eq!(snap.running, 2);
        assert_eq!(snap.total_cycles, 2);
        assert_eq!(snap.workers[0].phase, Phase::Integer);
        assert_eq!(snap.workers[1].phase, Phase::MemoryAdd);
        assert_eq!(snap.workers[1].cycles, 2);
    }

    #[test]
    fn test_stopped_worker_is_not_alive() {
        let hb = Heartbeat::new(2);
        hb.enter(0, Phase::Float);
        hb.enter(1, Phase::Stopped);
        assert!(!hb.is_alive(Duration::from_secs(60)));
        assert_eq!(hb.running_workers(), 1);
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let hb = Heartbeat::new(1);
        hb.enter(5, Phase::Integer);
        hb.cycle_done(5);
        assert_eq!(hb.total_cycles(), 0);
        assert!(hb.worker(5).is_none());
    }

    #[test]
    fn test_snapshot_serializes_phase_names() {
        let hb = Heartbeat::new(1);
        hb.enter(0, Phase::Idle);
        let json = serde_json::to_value(hb.snapshot()).unwrap();
        assert_eq!(json["workers"][0]["phase"], "idle");
        assert_eq!(json["running"], 1);
    }
}
