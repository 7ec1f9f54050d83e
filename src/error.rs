//! Error taxonomy for the CPU load engine.

use thiserror::Error;

/// Everything that can stop a stress run from starting or finishing cleanly.
///
/// External termination (signal, OOM killer) is not modelled here: all worker
/// state is thread-local and transient, so there is nothing left to clean up.
#[derive(Debug, Error)]
pub enum StressError {
    /// A configuration value was rejected. No worker has been started.
    #[error("invalid {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// A worker could not allocate its scratch buffer.
    #[error("worker {worker} could not allocate its {bytes}-byte scratch buffer")]
    ResourceExhaustion { worker: usize, bytes: usize },

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked before reaching its stop point.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl StressError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Index of the worker this error belongs to, if any.
    pub fn worker(&self) -> Option<usize> {
        match self {
            Self::Configuration { .. } => None,
            Self::ResourceExhaustion { worker, .. }
            | Self::Spawn { worker, .. }
            | Self::WorkerPanicked { worker } => Some(*worker),
        }
    }
}
