// src/exchange.rs

use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

/// One complete cycle's worth of visualization products. Everything in a
/// snapshot derives from the same frame; the cycle number stamps that.
#[derive(Debug, Clone, Default)]
pub struct SpectrumSnapshot {
    pub cycle: u64,
    /// One-sided normalized magnitude, length N/2.
    pub magnitude: Vec<f32>,
    /// Decimated time-domain trace, display width.
    pub oscilloscope: Vec<f32>,
    /// Peak-hold envelope trace, display width.
    pub envelope: Vec<f32>,
    /// Quantized spectral history, height x width, newest row first.
    pub waterfall: Vec<Vec<u8>>,
}

struct Slot {
    ready: bool,
    /// N/2 a publish must carry to be accepted. Reconfiguration moves this
    /// first, so a snapshot computed under the old size can never become
    /// visible afterwards.
    expected_half: usize,
    snapshot: SpectrumSnapshot,
}

/// The producer/consumer boundary. A single mutex-guarded slot holding the
/// most recent complete snapshot; "latest wins", intermediate cycles
/// between consumer reads are lost, never queued.
///
/// Both sides bound their wait: lock acquisition spins on `try_lock` until
/// a deadline and then gives up. A producer that gives up drops the cycle's
/// results; a consumer that gives up reports no new data.
pub struct Exchange {
    slot: Mutex<Slot>,
}

impl Exchange {
    pub fn new(expected_half: usize) -> Self {
        Self {
            slot: Mutex::new(Slot {
                ready: false,
                expected_half,
                snapshot: SpectrumSnapshot::default(),
            }),
        }
    }

    fn lock_with_deadline(&self, timeout: Duration) -> Option<std::sync::MutexGuard<'_, Slot>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.slot.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::yield_now();
                }
                // A panicked peer cannot produce more data; treat as timeout.
                Err(TryLockError::Poisoned(_)) => return None,
            }
        }
    }

    /// Producer side. Copies the snapshot in and sets the ready flag.
    /// Returns false if the lock could not be acquired in time or the
    /// snapshot's dimensions are stale (mid-reconfiguration).
    pub fn publish(&self, snapshot: &SpectrumSnapshot, timeout: Duration) -> bool {
        let Some(mut guard) = self.lock_with_deadline(timeout) else {
            return false;
        };
        if snapshot.magnitude.len() != guard.expected_half {
            return false;
        }
        guard.snapshot.clone_from(snapshot);
        guard.ready = true;
        true
    }

    /// Consumer side: take the latest snapshot and clear the ready flag.
    /// `None` means no new data since the last take, or the lock wait
    /// timed out; stale or partially written data is never returned.
    pub fn take(&self, timeout: Duration) -> Option<SpectrumSnapshot> {
        let mut guard = self.lock_with_deadline(timeout)?;
        if !guard.ready {
            return None;
        }
        guard.ready = false;
        Some(guard.snapshot.clone())
    }

    /// Non-destructive probe.
    pub fn is_ready(&self, timeout: Duration) -> bool {
        self.lock_with_deadline(timeout)
            .map(|guard| guard.ready)
            .unwrap_or(false)
    }

    /// Invalidate the published snapshot and require future publishes to
    /// carry the new spectrum length. Called on transform-size changes
    /// before the producer has rebuilt its buffers.
    pub fn set_expected_half(&self, expected_half: usize, timeout: Duration) -> bool {
        let Some(mut guard) = self.lock_with_deadline(timeout) else {
            return false;
        };
        guard.expected_half = expected_half;
        guard.ready = false;
        true
    }

    /// Occupy the slot lock for `dur`, standing in for a wedged peer.
    #[cfg(test)]
    pub(crate) fn hold_lock_for(&self, dur: Duration) {
        let _guard = self.slot.lock().unwrap();
        std::thread::sleep(dur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(50);

    fn stamped(cycle: u64, half: usize) -> SpectrumSnapshot {
        SpectrumSnapshot {
            cycle,
            magnitude: vec![cycle as f32; half],
            oscilloscope: vec![cycle as f32; 8],
            envelope: vec![cycle as f32; 8],
            waterfall: vec![vec![(cycle % 250) as u8; 8]; 4],
        }
    }

    #[test]
    fn test_take_without_publish_is_none() {
        let ex = Exchange::new(16);
        assert!(ex.take(T).is_none());
        assert!(!ex.is_ready(T));
    }

    #[test]
    fn test_publish_take_round_trip() {
        let ex = Exchange::new(16);
        assert!(ex.publish(&stamped(7, 16), T));
        assert!(ex.is_ready(T));
        let snap = ex.take(T).unwrap();
        assert_eq!(snap.cycle, 7);
        assert_eq!(snap.magnitude.len(), 16);
        // Ready was cleared by the take.
        assert!(ex.take(T).is_none());
    }

    #[test]
    fn test_latest_wins() {
        let ex = Exchange::new(16);
        for cycle in 0..5 {
            assert!(ex.publish(&stamped(cycle, 16), T));
        }
        assert_eq!(ex.take(T).unwrap().cycle, 4);
    }

    #[test]
    fn test_snapshot_products_are_from_one_cycle() {
        let ex = Exchange::new(16);
        for cycle in 0..32 {
            assert!(ex.publish(&stamped(cycle, 16), T));
            if let Some(snap) = ex.take(T) {
                let c = snap.cycle as f32;
                assert!(snap.magnitude.iter().all(|&v| v == c));
                assert!(snap.oscilloscope.iter().all(|&v| v == c));
                assert!(snap.envelope.iter().all(|&v| v == c));
                let lvl = (snap.cycle % 250) as u8;
                assert!(snap.waterfall.iter().flatten().all(|&v| v == lvl));
            }
        }
    }

    #[test]
    fn test_stale_size_publish_is_rejected() {
        let ex = Exchange::new(16);
        assert!(ex.publish(&stamped(1, 16), T));
        assert!(ex.set_expected_half(32, T));
        // Old snapshot was invalidated.
        assert!(ex.take(T).is_none());
        // Publishes with the old size are refused.
        assert!(!ex.publish(&stamped(2, 16), T));
        assert!(ex.take(T).is_none());
        // The new size goes through.
        assert!(ex.publish(&stamped(3, 32), T));
        assert_eq!(ex.take(T).unwrap().magnitude.len(), 32);
    }
}
