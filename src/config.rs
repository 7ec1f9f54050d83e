//! TOML configuration for coreburn.
//!
//! Layered like the rest of the suite's tools: an explicit path, then the
//! `COREBURN_CONFIG` environment variable, then `/etc/coreburn/coreburn.toml`,
//! then compiled-in defaults. CLI flags are applied on top by `main.rs`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StressError;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "COREBURN_CONFIG";

/// System-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/coreburn/coreburn.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the coreburn process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreburnConfig {
    #[serde(default)]
    pub stress: StressConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreburnConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded coreburn configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. `explicit` (a `--config` argument). Errors here are fatal.
    /// 2. The path in `COREBURN_CONFIG`.
    /// 3. `/etc/coreburn/coreburn.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "COREBURN_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Stress
// ---------------------------------------------------------------------------

/// Tunables for the CPU load engine.
///
/// Every numeric option must be positive; see [`StressConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Worker count. `None` means one worker per logical core.
    pub thread_count: Option<usize>,
    /// Iterations of the integer phase per cycle.
    pub integer_iterations: u64,
    /// Iterations of the floating-point phase per cycle.
    pub float_iterations: u64,
    /// Scratch buffer length in `i32` elements.
    pub buffer_size: usize,
    /// Pause at the end of every cycle, in milliseconds.
    pub idle_ms: u64,
    /// Float accumulator reset threshold.
    pub float_threshold: f32,
    /// Double the idle pause.
    pub modulate: bool,
    /// Lower each worker's scheduling priority by this much (Unix only).
    pub niceness: Option<i32>,
    /// Stop automatically after this many seconds. `None` runs until stopped.
    pub duration_secs: Option<u64>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            thread_count: None,
            integer_iterations: 1_000_000,
            float_iterations: 1_000_000,
            buffer_size: 1_048_576,
            idle_ms: 10,
            float_threshold: 100.0,
            modulate: false,
            niceness: None,
            duration_secs: None,
        }
    }
}

impl StressConfig {
    /// Reject anything that would produce a misconfigured run.
    pub fn validate(&self) -> Result<(), StressError> {
        if self.thread_count == Some(0) {
            return Err(StressError::config(
                "thread_count",
                "must be a positive integer, got 0",
            ));
        }
        positive("integer_iterations", self.integer_iterations)?;
        positive("float_iterations", self.float_iterations)?;
        positive("buffer_size", self.buffer_size as u64)?;
        positive("idle_ms", self.idle_ms)?;
        if !self.float_threshold.is_finite() || self.float_threshold <= 0.0 {
            return Err(StressError::config(
                "float_threshold",
                format!("must be a finite positive number, got {}", self.float_threshold),
            ));
        }
        if let Some(n) = self.niceness {
            if !(0..=19).contains(&n) {
                return Err(StressError::config(
                    "niceness",
                    format!("must be between 0 and 19, got {n}"),
                ));
            }
        }
        if self.duration_secs == Some(0) {
            return Err(StressError::config("duration_secs", "must be positive, got 0"));
        }
        Ok(())
    }

    /// Effective idle pause, including the `modulate` doubling.
    pub fn idle_duration(&self) -> Duration {
        let base = Duration::from_millis(self.idle_ms);
        if self.modulate {
            base * 2
        } else {
            base
        }
    }

    /// Optional run time limit.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Bytes a single worker's scratch buffer occupies.
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_size.saturating_mul(std::mem::size_of::<i32>())
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), StressError> {
    if value == 0 {
        return Err(StressError::config(field, "must be positive, got 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Status surface
// ---------------------------------------------------------------------------

/// Optional HTTP status listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Address for the status listener. Disabled when unset.
    pub bind: Option<SocketAddr>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Parse the positional thread-count argument.
///
/// Anything other than a positive integer is a configuration error: silently
/// coercing it would hide a misconfigured burn-in.
pub fn parse_thread_count(raw: &str) -> Result<usize, StressError> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(StressError::config(
            "thread_count",
            format!("must be a positive integer, got {raw:?}"),
        )),
        Ok(n) => Ok(n),
    }
}

/// Parse a human duration: `500ms`, `30s`, `10m`, `2h`, or bare seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, StressError> {
    let s = raw.trim();
    let (digits, unit_ms) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else {
        (s, 1_000)
    };

    let invalid = || {
        StressError::config(
            "duration",
            format!("expected e.g. 30s, 10m or 500ms, got {raw:?}"),
        )
    };
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    let ms = value.checked_mul(unit_ms).ok_or_else(invalid)?;
    if ms == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(ms))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
