//! OS-level view of the worker pool. Kept in its own test binary so no other
//! test's workers share the process while threads are counted.

#![cfg(target_os = "linux")]

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use coreburn::stress;
use coreburn::StressConfig;

/// Threads of this process whose name marks them as stress workers.
fn worker_threads() -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir("/proc/self/task")
        .unwrap()
        .filter_map(|entry| fs::read_to_string(entry.ok()?.path().join("comm")).ok())
        .map(|comm| comm.trim().to_string())
        .filter(|comm| comm.starts_with("coreburn-"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_os_sees_exactly_requested_worker_threads() {
    assert!(worker_threads().is_empty());

    let config = StressConfig {
        thread_count: Some(3),
        integer_iterations: 2_000,
        float_iterations: 2_000,
        buffer_size: 1_024,
        idle_ms: 1,
        ..Default::default()
    };
    let handle = stress::start(&config).unwrap();
    assert!(handle.wait_until_running(Duration::from_secs(10)));

    assert_eq!(
        worker_threads(),
        vec!["coreburn-0", "coreburn-1", "coreburn-2"]
    );

    handle.shutdown().unwrap();
    // A joined thread can linger in /proc for a moment while the kernel reaps it.
    let deadline = Instant::now() + Duration::from_secs(5);
    while !worker_threads().is_empty() {
        assert!(Instant::now() < deadline, "worker threads outlived shutdown");
        thread::sleep(Duration::from_millis(10));
    }
}
