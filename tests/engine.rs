//! Library-level tests of the start/stop/heartbeat contract.

use std::thread;
use std::time::{Duration, Instant};

use coreburn::stress::phases::{integer_phase, IntegerRegisters, ScratchBuffer};
use coreburn::stress::{self, Phase, RunStatus};
use coreburn::{StopToken, StressConfig, StressError};

fn light(threads: usize) -> StressConfig {
    StressConfig {
        thread_count: Some(threads),
        integer_iterations: 5_000,
        float_iterations: 5_000,
        buffer_size: 4_096,
        idle_ms: 2,
        ..Default::default()
    }
}

#[test]
fn test_start_heartbeat_stop() {
    let handle = stress::start(&light(4)).unwrap();
    assert_eq!(handle.worker_count(), 4);
    assert!(handle.wait_until_running(Duration::from_secs(10)));
    assert!(handle.is_running());

    // Every worker keeps cycling.
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.snapshot().workers.iter().any(|w| w.cycles < 2) {
        assert!(Instant::now() < deadline, "workers did not cycle");
        thread::sleep(Duration::from_millis(10));
    }
    assert!(handle.heartbeat().is_alive(Duration::from_secs(5)));

    let heartbeat = handle.heartbeat();
    let report = handle.shutdown().unwrap();
    assert_eq!(report.status, RunStatus::Pass);
    assert_eq!(report.workers.len(), 4);
    assert!(report.workers.iter().all(|w| w.cycles >= 2));
    assert!((0..4).all(|i| heartbeat.worker(i).unwrap().phase() == Phase::Stopped));
    assert!(!heartbeat.is_alive(Duration::from_secs(5)));
}

#[test]
fn test_invalid_thread_counts_never_start() {
    assert!(matches!(
        stress::start(&light(0)),
        Err(StressError::Configuration { field: "thread_count", .. })
    ));

    for raw in ["0", "-1", "four"] {
        assert!(coreburn::config::parse_thread_count(raw).is_err());
    }
}

#[test]
fn test_default_worker_count_follows_cores() {
    let cfg = StressConfig {
        thread_count: None,
        ..light(1)
    };
    let handle = stress::start(&cfg).unwrap();
    assert_eq!(handle.worker_count(), stress::detected_cores());
    handle.shutdown().unwrap();
}

#[test]
fn test_shared_stop_token_drives_blocking_run() {
    let stop = StopToken::new();
    let remote = stop.clone();
    let runner = thread::spawn(move || stress::run(&light(2), remote));

    thread::sleep(Duration::from_millis(150));
    stop.stop();

    let report = runner.join().unwrap().unwrap();
    assert_eq!(report.workers.len(), 2);
}

#[test]
fn test_long_idle_does_not_delay_shutdown() {
    let cfg = StressConfig {
        idle_ms: 60_000,
        ..light(2)
    };
    let handle = stress::start(&cfg).unwrap();
    assert!(handle.wait_until_running(Duration::from_secs(10)));

    let start = Instant::now();
    let report = handle.shutdown().unwrap();
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(report.status, RunStatus::Incomplete);
}

#[test]
fn test_parallel_workers_keep_private_state() {
    // Same phase sequence on several threads at once; each thread's registers
    // and buffer must end where a lone run would.
    fn cycle(len: usize) -> (u32, Vec<i32>) {
        let mut regs = IntegerRegisters::default();
        let result = integer_phase(&mut regs, 10_000);
        let mut buf = ScratchBuffer::allocate(len).unwrap();
        buf.write_pass();
        buf.add_pass();
        (result, buf.as_slice().to_vec())
    }

    let lens = [1usize, 2, 1_024, 65_536];
    let alone: Vec<_> = lens.iter().map(|&len| cycle(len)).collect();

    let together: Vec<_> = lens
        .iter()
        .map(|&len| thread::spawn(move || cycle(len)))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(alone, together);
    for (len, (_, data)) in lens.iter().zip(&together) {
        let expected: Vec<i32> = (0..*len)
            .map(|i| (i as i32 * 2).wrapping_add(((i + 1) % len) as i32 * 2))
            .collect();
        assert_eq!(data, &expected, "len {len}");
    }
}
