//! Host facts reported beside a stress run: cores, CPU model, memory, load
//! and SoC temperature.

use std::fs;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use sysinfo::System;
use tracing::{debug, warn};

/// Thermal zone most boards expose the CPU/SoC sensor on.
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub logical_cores: usize,
    pub cpu_brand: String,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    /// 1-minute load average.
    pub load_one: f64,
    pub temperature_c: Option<f64>,
}

impl HostInfo {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpu_brand = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "Unknown CPU".to_string());

        let temperature_c = match get_cpu_temp() {
            Ok(t) => Some(t),
            Err(e) => {
                debug!(error = %e, "no SoC temperature available");
                None
            }
        };

        Self {
            logical_cores: crate::stress::detected_cores(),
            cpu_brand,
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
            load_one: System::load_average().one,
            temperature_c,
        }
    }

    /// Warn when `workers` scratch buffers of `buffer_bytes` would not fit in
    /// available memory. Returns whether the footprint fits.
    pub fn check_footprint(&self, workers: usize, buffer_bytes: usize) -> bool {
        let needed = (workers as u64).saturating_mul(buffer_bytes as u64);
        if self.available_memory_bytes > 0 && needed > self.available_memory_bytes {
            warn!(
                needed_bytes = needed,
                available_bytes = self.available_memory_bytes,
                workers,
                "scratch buffers exceed available memory, workers may fail to allocate"
            );
            return false;
        }
        true
    }
}

/// Live load figures, re-read on every status request.
#[derive(Debug, Clone, Serialize)]
pub struct LiveLoad {
    /// Busy share of all CPUs since the previous sample, 0-100.
    pub cpu_usage_percent: f32,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
    pub temperature_c: Option<f64>,
}

/// Keeps the `System` between samples; CPU usage is a delta against the
/// previous refresh.
pub struct LoadSampler {
    sys: Mutex<System>,
}

impl LoadSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self {
            sys: Mutex::new(sys),
        }
    }

    pub fn sample(&self) -> LiveLoad {
        let cpu_usage_percent = {
            let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
            sys.refresh_cpu_usage();
            sys.global_cpu_usage()
        };
        let load = System::load_average();

        LiveLoad {
            cpu_usage_percent,
            load_one: load.one,
            load_five: load.five,
            load_fifteen: load.fifteen,
            temperature_c: get_cpu_temp().ok(),
        }
    }
}

impl Default for LoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Read current SoC temperature in degrees Celsius.
pub fn get_cpu_temp() -> Result<f64> {
    let raw = fs::read_to_string(THERMAL_ZONE).context("Failed to read thermal zone")?;
    parse_millidegrees(&raw)
}

fn parse_millidegrees(raw: &str) -> Result<f64> {
    let milli: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("unexpected thermal reading {raw:?}"))?;
    Ok(milli / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(available: u64) -> HostInfo {
        HostInfo {
            logical_cores: 4,
            cpu_brand: "Cortex-A76".to_string(),
            total_memory_bytes: available * 2,
            available_memory_bytes: available,
            load_one: 0.0,
            temperature_c: None,
        }
    }

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("48250\n").unwrap(), 48.25);
        assert!(parse_millidegrees("hot").is_err());
    }

    #[test]
    fn test_footprint_check() {
        let h = host(64 * 1024 * 1024);
        assert!(h.check_footprint(4, 4 * 1024 * 1024));
        assert!(!h.check_footprint(64, 4 * 1024 * 1024));
    }

    #[test]
    fn test_unknown_memory_never_warns() {
        assert!(host(0).check_footprint(usize::MAX, usize::MAX));
    }

    #[test]
    fn test_collect_reports_at_least_one_core() {
        let h = HostInfo::collect();
        assert!(h.logical_cores >= 1);
        assert!(!h.cpu_brand.is_empty());
    }

    #[test]
    fn test_sampler_reports_usage_in_percent() {
        let sampler = LoadSampler::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let load = sampler.sample();
        assert!(load.cpu_usage_percent.is_finite());
        assert!((0.0..=100.0).contains(&load.cpu_usage_percent));
        assert!(load.load_one >= 0.0);
    }
}
