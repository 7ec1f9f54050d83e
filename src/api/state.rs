use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::host::{HostInfo, LoadSampler};
use crate::stress::{Heartbeat, StopToken, StressHandle};

/// Floor for the heartbeat silence a worker may show and still count as alive.
const MIN_LIVENESS_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub heartbeat: Arc<Heartbeat>,
    pub stop: StopToken,
    pub host: HostInfo,
    pub load: Arc<LoadSampler>,
    pub liveness_window: Duration,
}

impl AppState {
    /// Build status state for a running session. `idle` is the per-cycle
    /// pause; a worker may legitimately stay silent for that long.
    pub fn for_run(handle: &StressHandle, host: HostInfo, idle: Duration) -> Self {
        Self {
            run_id: handle.run_id(),
            started_at: handle.started_at(),
            heartbeat: handle.heartbeat(),
            stop: handle.stop_token(),
            host,
            load: Arc::new(LoadSampler::new()),
            liveness_window: MIN_LIVENESS_WINDOW.max(idle * 2),
        }
    }
}
