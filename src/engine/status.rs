// src/engine/status.rs

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lock-free status bridge. The worker writes after every cycle, any other
/// thread reads whenever it likes. f32 values travel as their bit pattern
/// in an AtomicU32.
pub struct StatusCells {
    timestamp_ms: AtomicU64,
    processed_samples: AtomicU64,
    cycles: AtomicU64,
    cpu_usage_bits: AtomicU32,
    capture_overrun: AtomicBool,
    transform_overrun: AtomicBool,
}

/// One coherent-enough status read. Fields are sampled individually from
/// the atomics; that is fine for diagnostics, which is all this is for.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStatus {
    /// Wall-clock time of the last completed cycle, ms since the epoch.
    pub timestamp_ms: u64,
    pub processed_samples: u64,
    pub cycles: u64,
    /// Last cycle's processing time as a percentage of its frame period.
    pub cpu_usage_pct: f32,
    /// Sticky: samples were dropped on the capture side.
    pub capture_overrun: bool,
    /// Sticky: a cycle missed its budget or its publish was dropped.
    pub transform_overrun: bool,
}

impl StatusCells {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            timestamp_ms: AtomicU64::new(0),
            processed_samples: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            cpu_usage_bits: AtomicU32::new(0),
            capture_overrun: AtomicBool::new(false),
            transform_overrun: AtomicBool::new(false),
        })
    }

    pub fn record_cycle(&self, samples: u64, cpu_usage_pct: f32) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.timestamp_ms.store(now_ms, Ordering::Relaxed);
        self.processed_samples.fetch_add(samples, Ordering::Relaxed);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.cpu_usage_bits
            .store(cpu_usage_pct.to_bits(), Ordering::Relaxed);
    }

    pub fn flag_capture_overrun(&self) {
        self.capture_overrun.store(true, Ordering::Relaxed);
    }

    pub fn flag_transform_overrun(&self) {
        self.transform_overrun.store(true, Ordering::Relaxed);
    }

    /// Overrun flags stay set until the consumer decides to clear them.
    pub fn clear_overruns(&self) {
        self.capture_overrun.store(false, Ordering::Relaxed);
        self.transform_overrun.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatus {
        EngineStatus {
            timestamp_ms: self.timestamp_ms.load(Ordering::Relaxed),
            processed_samples: self.processed_samples.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            cpu_usage_pct: f32::from_bits(self.cpu_usage_bits.load(Ordering::Relaxed)),
            capture_overrun: self.capture_overrun.load(Ordering::Relaxed),
            transform_overrun: self.transform_overrun.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle_accumulates() {
        let cells = StatusCells::new();
        cells.record_cycle(512, 12.5);
        cells.record_cycle(512, 30.0);
        let status = cells.snapshot();
        assert_eq!(status.processed_samples, 1024);
        assert_eq!(status.cycles, 2);
        assert!((status.cpu_usage_pct - 30.0).abs() < 1e-6);
        assert!(status.timestamp_ms > 0);
    }

    #[test]
    fn test_overrun_flags_are_sticky() {
        let cells = StatusCells::new();
        cells.flag_capture_overrun();
        cells.flag_transform_overrun();
        assert!(cells.snapshot().capture_overrun);
        assert!(cells.snapshot().transform_overrun);
        cells.record_cycle(1, 0.0);
        assert!(cells.snapshot().capture_overrun);
        cells.clear_overruns();
        let status = cells.snapshot();
        assert!(!status.capture_overrun && !status.transform_overrun);
    }
}
