// tests/engine_tests.rs
//
// Threaded end-to-end tests: a real worker thread producing through the
// exchange while the test plays the consumer context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use spectrum_engine::exchange::Exchange;
use spectrum_engine::sampler::ToneSource;
use spectrum_engine::{EngineConfig, SpectrumEngine, SpectrumHandle, SpectrumSnapshot};

fn start_tone_engine(freq: f32) -> (SpectrumEngine, SpectrumHandle) {
    let config = EngineConfig::default(); // 40 kHz, N = 512
    let source = ToneSource::new(40_000, freq, 0.5);
    SpectrumEngine::start(config, Box::new(source)).expect("engine start")
}

fn wait_for_snapshot(handle: &SpectrumHandle, timeout: Duration) -> Option<SpectrumSnapshot> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(snap) = handle.snapshot() {
            return Some(snap);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    None
}

fn dominant_bin(snap: &SpectrumSnapshot) -> usize {
    snap.magnitude
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0.0f32), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc })
        .0
}

#[test]
fn test_end_to_end_tone_scenario() {
    // 40 kHz / 512 -> 78.125 Hz bins; 1000 Hz must dominate bin 13 +/- 1.
    let (mut engine, handle) = start_tone_engine(1000.0);
    assert!((handle.bin_width_hz() - 78.125).abs() < 1e-3);
    assert_eq!(handle.fft_size(), 512);
    assert_eq!(handle.sample_rate(), 40_000);

    // Let the gain loop settle over a few frames.
    let mut last = None;
    for _ in 0..10 {
        if let Some(snap) = wait_for_snapshot(&handle, Duration::from_secs(2)) {
            last = Some(snap);
        }
    }
    let snap = last.expect("no snapshot produced");
    let bin = dominant_bin(&snap);
    assert!((bin as isize - 13).abs() <= 1, "dominant bin {}", bin);

    engine.stop();
    let status = handle.status();
    assert!(status.cycles > 0);
    assert_eq!(status.processed_samples, status.cycles * 512);
}

#[test]
fn test_snapshot_products_are_consistently_sized() {
    let (mut engine, handle) = start_tone_engine(2000.0);
    let config = EngineConfig::default();
    let snap = wait_for_snapshot(&handle, Duration::from_secs(2)).expect("no snapshot");
    assert_eq!(snap.magnitude.len(), 256);
    assert_eq!(snap.oscilloscope.len(), config.display_width);
    assert_eq!(snap.envelope.len(), config.display_width);
    assert_eq!(snap.waterfall.len(), config.waterfall_height);
    assert!(snap.waterfall.iter().all(|row| row.len() == config.display_width));
    assert!(snap
        .waterfall
        .iter()
        .flatten()
        .all(|&l| l < config.waterfall_levels));
    engine.stop();
}

#[test]
fn test_take_clears_ready_until_next_cycle() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    wait_for_snapshot(&handle, Duration::from_secs(2)).expect("no snapshot");
    // Taken: an immediate re-take may race the next publish, but pausing
    // the producer makes the ready flag stay down.
    handle.set_processing_active(false);
    std::thread::sleep(Duration::from_millis(50));
    while handle.snapshot().is_some() {}
    assert!(!handle.is_data_ready());
    assert!(handle.snapshot().is_none());

    handle.set_processing_active(true);
    assert!(wait_for_snapshot(&handle, Duration::from_secs(2)).is_some());
    engine.stop();
}

#[test]
fn test_fft_size_validation_table() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    for bad in [0u16, 1, 2, 16, 31, 500, 513, 8192] {
        assert!(!handle.set_fft_size(bad), "{} should be rejected", bad);
        assert_eq!(handle.fft_size(), 512, "size changed after rejecting {}", bad);
    }
    assert!(handle.set_fft_size(256));
    assert_eq!(handle.fft_size(), 256);
    engine.stop();
}

#[test]
fn test_resize_mid_stream_never_shows_mixed_sizes() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    wait_for_snapshot(&handle, Duration::from_secs(2)).expect("no snapshot");

    assert!(handle.set_fft_size(1024));
    // From this point on, every visible snapshot must be fully 1024-sized.
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut saw_new_size = false;
    while Instant::now() < deadline {
        if let Some(snap) = handle.snapshot() {
            assert_eq!(snap.magnitude.len(), 512, "old-size snapshot leaked through");
            saw_new_size = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(saw_new_size, "no snapshot after resize");
    assert!((handle.bin_width_hz() - 39.0625).abs() < 1e-3);
    engine.stop();
}

#[test]
fn test_sample_rate_swap_updates_bin_width() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    assert!(handle.set_sample_rate(48_000.0));
    assert_eq!(handle.sample_rate(), 48_000);
    assert!((handle.bin_width_hz() - 93.75).abs() < 1e-3);
    assert!(!handle.set_sample_rate(0.0));
    assert!(!handle.set_sample_rate(-1.0));
    assert_eq!(handle.sample_rate(), 48_000);
    engine.stop();
}

#[test]
fn test_pause_stops_publishing_without_teardown() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    wait_for_snapshot(&handle, Duration::from_secs(2)).expect("no snapshot");

    handle.set_processing_active(false);
    std::thread::sleep(Duration::from_millis(50));
    while handle.snapshot().is_some() {}
    let cycles_at_pause = handle.status().cycles;
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.status().cycles, cycles_at_pause, "cycles ran while paused");

    handle.set_processing_active(true);
    assert!(wait_for_snapshot(&handle, Duration::from_secs(2)).is_some());
    assert!(handle.status().cycles > cycles_at_pause);
    engine.stop();
}

#[test]
fn test_overrun_flags_are_clearable() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    wait_for_snapshot(&handle, Duration::from_secs(2)).expect("no snapshot");
    handle.clear_overruns();
    let status = handle.status();
    assert!(!status.capture_overrun);
    assert!(!status.transform_overrun);
    engine.stop();
}

#[test]
fn test_racing_producer_never_tears_a_snapshot() {
    // Every product in `stamped` carries the cycle number; a take that
    // overlaps a publish must still see all four agreeing.
    fn stamped(cycle: u64) -> SpectrumSnapshot {
        SpectrumSnapshot {
            cycle,
            magnitude: vec![cycle as f32; 64],
            oscilloscope: vec![cycle as f32; 16],
            envelope: vec![cycle as f32; 16],
            waterfall: vec![vec![(cycle % 250) as u8; 16]; 4],
        }
    }

    let t = Duration::from_millis(50);
    let exchange = Arc::new(Exchange::new(64));
    let producer = {
        let exchange = exchange.clone();
        std::thread::spawn(move || {
            for cycle in 0..20_000u64 {
                exchange.publish(&stamped(cycle), t);
            }
        })
    };

    let mut takes = 0u64;
    let mut last_cycle = 0u64;
    while !producer.is_finished() || exchange.is_ready(t) {
        if let Some(snap) = exchange.take(t) {
            takes += 1;
            let c = snap.cycle as f32;
            assert!(snap.magnitude.iter().all(|&v| v == c));
            assert!(snap.oscilloscope.iter().all(|&v| v == c));
            assert!(snap.envelope.iter().all(|&v| v == c));
            let lvl = (snap.cycle % 250) as u8;
            assert!(snap.waterfall.iter().flatten().all(|&v| v == lvl));
            // Latest wins: cycles only move forward.
            assert!(snap.cycle >= last_cycle, "cycle went backwards");
            last_cycle = snap.cycle;
        }
    }
    producer.join().unwrap();
    assert!(takes > 0, "consumer never saw a snapshot");
}

#[test]
fn test_gain_reference_is_accepted_while_running() {
    let (mut engine, handle) = start_tone_engine(1000.0);
    handle.set_gain_reference(0.5);
    assert!(wait_for_snapshot(&handle, Duration::from_secs(2)).is_some());
    handle.set_gain_reference(2.0);
    assert!(wait_for_snapshot(&handle, Duration::from_secs(2)).is_some());
    engine.stop();
}
