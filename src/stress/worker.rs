//! The per-thread worker loop.
//!
//! A worker owns its registers, accumulator and scratch buffer outright and
//! cycles Integer -> Float -> MemoryWrite -> MemoryAdd -> Idle until its
//! [`StopToken`] fires. The token is checked before every phase.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error};

use super::heartbeat::Heartbeat;
use super::phases::{
    float_phase, integer_phase, FloatAccumulator, FloatOperands, IntegerRegisters, ScratchBuffer,
};
use super::stop::StopToken;
use crate::config::StressConfig;
use crate::error::StressError;

/// Where a worker is in its cycle.
///
/// `Starting`, `Stopped` and `Failed` bracket the loop and are only ever
/// reported through the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Integer = 1,
    Float = 2,
    MemoryWrite = 3,
    MemoryAdd = 4,
    Idle = 5,
    Stopped = 6,
    Failed = 7,
}

impl Phase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Integer,
            2 => Self::Float,
            3 => Self::MemoryWrite,
            4 => Self::MemoryAdd,
            5 => Self::Idle,
            6 => Self::Stopped,
            7 => Self::Failed,
            _ => Self::Starting,
        }
    }

    /// Successor in the cycle. Terminal states map to themselves.
    pub fn next(self) -> Self {
        match self {
            Self::Starting | Self::Idle => Self::Integer,
            Self::Integer => Self::Float,
            Self::Float => Self::MemoryWrite,
            Self::MemoryWrite => Self::MemoryAdd,
            Self::MemoryAdd => Self::Idle,
            Self::Stopped => Self::Stopped,
            Self::Failed => Self::Failed,
        }
    }

    /// True for the five in-cycle phases.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::MemoryWrite | Self::MemoryAdd | Self::Idle
        )
    }
}

/// Per-worker copy of the tunables.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub integer_iterations: u64,
    pub float_iterations: u64,
    pub buffer_size: usize,
    pub idle: Duration,
    pub float: FloatOperands,
    pub niceness: Option<i32>,
}

impl From<&StressConfig> for WorkerSettings {
    fn from(cfg: &StressConfig) -> Self {
        Self {
            integer_iterations: cfg.integer_iterations,
            float_iterations: cfg.float_iterations,
            buffer_size: cfg.buffer_size,
            idle: cfg.idle_duration(),
            float: FloatOperands::with_threshold(cfg.float_threshold),
            niceness: cfg.niceness,
        }
    }
}

/// What a worker reports once it has stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub index: usize,
    pub cycles: u64,
}

/// One worker's exclusively owned state.
#[derive(Debug)]
pub struct Worker {
    index: usize,
    settings: WorkerSettings,
    registers: IntegerRegisters,
    accumulator: FloatAccumulator,
    buffer: ScratchBuffer,
    cycles: u64,
}

impl Worker {
    /// Allocate the scratch buffer. Fails fast, naming the worker, if the
    /// allocation is refused.
    pub fn new(index: usize, settings: WorkerSettings) -> Result<Self, StressError> {
        let buffer = ScratchBuffer::allocate(settings.buffer_size).map_err(|_| {
            StressError::ResourceExhaustion {
                worker: index,
                bytes: settings.buffer_size.saturating_mul(std::mem::size_of::<i32>()),
            }
        })?;

        Ok(Self {
            index,
            settings,
            registers: IntegerRegisters::default(),
            accumulator: FloatAccumulator::default(),
            buffer,
            cycles: 0,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn buffer(&self) -> &ScratchBuffer {
        &self.buffer
    }

    /// Execute one phase. Returns `false` if the stop token interrupted it.
    pub fn run_phase(&mut self, phase: Phase, stop: &StopToken) -> bool {
        match phase {
            Phase::Integer => {
                integer_phase(&mut self.registers, self.settings.integer_iterations);
            }
            Phase::Float => {
                float_phase(
                    &mut self.accumulator,
                    &self.settings.float,
                    self.settings.float_iterations,
                );
            }
            Phase::MemoryWrite => self.buffer.write_pass(),
            Phase::MemoryAdd => self.buffer.add_pass(),
            Phase::Idle => return stop.sleep(self.settings.idle),
            Phase::Starting | Phase::Stopped | Phase::Failed => {}
        }
        true
    }

    /// Run one full cycle. Returns `false` if it was cut short by a stop.
    pub fn run_cycle(&mut self, stop: &StopToken, heartbeat: &Heartbeat) -> bool {
        let mut phase = Phase::Integer;
        loop {
            if stop.is_stopped() {
                return false;
            }
            heartbeat.enter(self.index, phase);
            if !self.run_phase(phase, stop) {
                return false;
            }
            if phase == Phase::Idle {
                self.cycles += 1;
                heartbeat.cycle_done(self.index);
                return true;
            }
            phase = phase.next();
        }
    }

    /// Cycle until stopped. The scratch buffer is freed when `self` drops.
    pub fn run(mut self, stop: &StopToken, heartbeat: &Heartbeat) -> WorkerSummary {
        while self.run_cycle(stop, heartbeat) {}
        WorkerSummary {
            index: self.index,
            cycles: self.cycles,
        }
    }
}

/// Marks the worker failed and stops the run if its thread unwinds.
struct PanicGuard<'a> {
    index: usize,
    stop: &'a StopToken,
    heartbeat: &'a Heartbeat,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(worker = self.index, "worker panicked, stopping run");
            self.heartbeat.enter(self.index, Phase::Failed);
            self.stop.stop();
        }
    }
}

/// Thread entry point used by the launcher.
///
/// A setup failure stops the whole run rather than leaving it short a worker.
pub(crate) fn worker_main(
    index: usize,
    settings: WorkerSettings,
    stop: StopToken,
    heartbeat: Arc<Heartbeat>,
) -> Result<WorkerSummary, StressError> {
    let _guard = PanicGuard {
        index,
        stop: &stop,
        heartbeat: heartbeat.as_ref(),
    };

    lower_priority(index, settings.niceness);

    let worker = match Worker::new(index, settings) {
        Ok(w) => w,
        Err(e) => {
            error!(worker = index, error = %e, "worker setup failed, stopping run");
            heartbeat.enter(index, Phase::Failed);
            stop.stop();
            return Err(e);
        }
    };

    debug!(worker = index, "worker started");
    let summary = worker.run(&stop, &heartbeat);
    heartbeat.enter(index, Phase::Stopped);
    debug!(worker = index, cycles = summary.cycles, "worker stopped");
    Ok(summary)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
fn lower_priority(index: usize, niceness: Option<i32>) {
    let Some(increment) = niceness else {
        return;
    };
    match apply_niceness(increment) {
        Ok(now) => debug!(worker = index, niceness = now, "worker priority lowered"),
        Err(err) => tracing::warn!(worker = index, error = %err, "failed to lower worker priority"),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
fn lower_priority(index: usize, niceness: Option<i32>) {
    if niceness.is_some() {
        tracing::warn!(worker = index, "niceness is not supported on this platform, ignoring");
    }
}

#[cfg(target_os = "linux")]
fn errno_slot() -> *mut libc::c_int {
    // SAFETY: returns the calling thread's errno slot; always valid.
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
fn errno_slot() -> *mut libc::c_int {
    // SAFETY: returns the calling thread's errno slot; always valid.
    unsafe { libc::__error() }
}

/// Add `increment` to the calling thread's niceness, returning the new value.
///
/// nice(2) returns -1 both on failure and when -1 is the new niceness, so
/// errno is cleared first and consulted afterwards.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
fn apply_niceness(increment: i32) -> std::io::Result<i32> {
    let errno = errno_slot();
    // SAFETY: errno is thread-local and nice(2) only touches the scheduling
    // priority of the calling thread.
    let (rc, code) = unsafe {
        *errno = 0;
        let rc = libc::nice(increment);
        (rc, *errno)
    };
    if rc == -1 && code != 0 {
        return Err(std::io::Error::from_raw_os_error(code));
    }
    Ok(rc)
}
