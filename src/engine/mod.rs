// src/engine/mod.rs

pub mod pipeline;
pub mod status;

pub use pipeline::Pipeline;
pub use status::{EngineStatus, StatusCells};

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{is_valid_fft_size, EngineConfig};
use crate::exchange::{Exchange, SpectrumSnapshot};
use crate::sampler::SampleSource;

/// Samples pulled from the source per worker iteration.
const CHUNK: usize = 1024;
/// Consumer-side bound on exchange lock waits.
const CONSUMER_LOCK_TIMEOUT: Duration = Duration::from_millis(5);

/// Control fields shared between the worker and every handle. Configuration
/// changes are staged here and applied by the worker between cycles, so the
/// hot path never takes a lock for them.
struct SharedControl {
    active: AtomicBool,
    stop: AtomicBool,
    fft_size: AtomicUsize,
    sample_rate_bits: AtomicU32,
    gain_reference_bits: AtomicU32,
    /// Staged transform size; 0 means none pending.
    pending_fft_size: AtomicUsize,
    /// Staged sample rate as f32 bits; 0 means none pending.
    pending_sample_rate_bits: AtomicU32,
}

/// Owns the capture-context worker thread. Construct once before first use;
/// dropping it (or calling `stop`) shuts the worker down and joins it.
pub struct SpectrumEngine {
    shared: Arc<SharedControl>,
    worker: Option<thread::JoinHandle<()>>,
}

/// Consumer-context surface: snapshot reads, status, pause/resume and
/// runtime reconfiguration. Cheap to clone; all clones talk to the same
/// engine.
#[derive(Clone)]
pub struct SpectrumHandle {
    exchange: Arc<Exchange>,
    status: Arc<StatusCells>,
    shared: Arc<SharedControl>,
}

impl SpectrumEngine {
    /// Build the pipeline for `config`, move `source` onto a dedicated
    /// worker thread and start processing.
    pub fn start(
        config: EngineConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<(SpectrumEngine, SpectrumHandle)> {
        config.validate()?;

        let exchange = Arc::new(Exchange::new(config.fft_size / 2));
        let status = StatusCells::new();
        let shared = Arc::new(SharedControl {
            active: AtomicBool::new(true),
            stop: AtomicBool::new(false),
            fft_size: AtomicUsize::new(config.fft_size),
            sample_rate_bits: AtomicU32::new(config.sample_rate.to_bits()),
            gain_reference_bits: AtomicU32::new(1.0f32.to_bits()),
            pending_fft_size: AtomicUsize::new(0),
            pending_sample_rate_bits: AtomicU32::new(0),
        });

        let pipeline = Pipeline::new(&config, exchange.clone(), status.clone());
        let worker = thread::Builder::new()
            .name("spectrum-worker".into())
            .spawn({
                let shared = shared.clone();
                move || worker_loop(pipeline, source, shared)
            })?;

        let engine = SpectrumEngine {
            shared: shared.clone(),
            worker: Some(worker),
        };
        let handle = SpectrumHandle {
            exchange,
            status,
            shared,
        };
        Ok((engine, handle))
    }

    /// Stop the worker and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SpectrumEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SpectrumHandle {
    /// Latest complete snapshot, or `None` when nothing new was published
    /// since the last take. Taking clears the ready flag.
    pub fn snapshot(&self) -> Option<SpectrumSnapshot> {
        self.exchange.take(CONSUMER_LOCK_TIMEOUT)
    }

    /// Non-destructive probe for new data.
    pub fn is_data_ready(&self) -> bool {
        self.exchange.is_ready(CONSUMER_LOCK_TIMEOUT)
    }

    pub fn fft_size(&self) -> u16 {
        self.shared.fft_size.load(Ordering::Relaxed) as u16
    }

    pub fn sample_rate(&self) -> u32 {
        f32::from_bits(self.shared.sample_rate_bits.load(Ordering::Relaxed)).round() as u32
    }

    pub fn bin_width_hz(&self) -> f32 {
        let rate = f32::from_bits(self.shared.sample_rate_bits.load(Ordering::Relaxed));
        rate / self.shared.fft_size.load(Ordering::Relaxed) as f32
    }

    pub fn is_processing_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Pause/resume the whole pipeline without tearing down any buffers.
    pub fn set_processing_active(&self, active: bool) {
        self.shared.active.store(active, Ordering::Relaxed);
    }

    /// Request a new transform size. Rejects anything that is not a power
    /// of two inside the allowed range and leaves the running configuration
    /// untouched. On success the published snapshot is invalidated at once:
    /// a read straight after this returns either "no data" or a snapshot
    /// fully sized for the new N, never a mix.
    pub fn set_fft_size(&self, fft_size: u16) -> bool {
        let n = fft_size as usize;
        if !is_valid_fft_size(n) {
            log::warn!("engine: rejected transform size {}", n);
            return false;
        }
        if n == self.shared.fft_size.load(Ordering::Relaxed) {
            return true;
        }
        // Invalidate first so a cycle computed under the old size can no
        // longer become visible, then stage the change for the worker.
        // Staging without the invalidation would leave a stale-size snapshot
        // takeable and wedge the exchange against every rebuilt publish, so
        // a timed-out invalidation aborts the whole resize.
        if !self
            .exchange
            .set_expected_half(n / 2, Duration::from_millis(50))
        {
            log::warn!("engine: transform size change to {} aborted, exchange busy", n);
            return false;
        }
        self.shared.fft_size.store(n, Ordering::Relaxed);
        self.shared.pending_fft_size.store(n, Ordering::Relaxed);
        true
    }

    /// Swap the sample rate used for frequency scaling. Buffer sizes are
    /// unaffected.
    pub fn set_sample_rate(&self, sample_rate: f32) -> bool {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return false;
        }
        self.shared
            .sample_rate_bits
            .store(sample_rate.to_bits(), Ordering::Relaxed);
        self.shared
            .pending_sample_rate_bits
            .store(sample_rate.to_bits(), Ordering::Relaxed);
        true
    }

    /// Manual gain reference from configuration storage; multiplies into
    /// the auto-gain factor.
    pub fn set_gain_reference(&self, reference: f32) {
        self.shared
            .gain_reference_bits
            .store(reference.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn status(&self) -> EngineStatus {
        self.status.snapshot()
    }

    pub fn clear_overruns(&self) {
        self.status.clear_overruns();
    }
}

/// The capture-context loop. Applies staged reconfiguration between
/// cycles, honors the pause flag, pulls from the source and feeds the
/// pipeline. Never blocks unboundedly anywhere.
fn worker_loop(
    mut pipeline: Pipeline,
    mut source: Box<dyn SampleSource>,
    shared: Arc<SharedControl>,
) {
    let mut chunk = vec![0.0f32; CHUNK];
    let realtime = source.is_realtime();
    let mut was_active = true;

    log::info!(
        "engine: worker started, N = {}, {} Hz",
        pipeline.fft_size(),
        pipeline.sample_rate()
    );

    while !shared.stop.load(Ordering::Relaxed) {
        // Staged reconfiguration is the only path that replaces buffers,
        // and it runs strictly between cycles.
        let pending_n = shared.pending_fft_size.swap(0, Ordering::Relaxed);
        if pending_n != 0 {
            pipeline.set_fft_size(pending_n);
        }
        let pending_rate = shared.pending_sample_rate_bits.swap(0, Ordering::Relaxed);
        if pending_rate != 0 {
            pipeline.set_sample_rate(f32::from_bits(pending_rate));
        }
        pipeline.set_gain_reference(f32::from_bits(
            shared.gain_reference_bits.load(Ordering::Relaxed),
        ));

        let active = shared.active.load(Ordering::Relaxed);
        if !active {
            // Paused: keep draining the device so resume does not replay a
            // backlog, but discard everything.
            if realtime {
                while source.read(&mut chunk, 0.0) == CHUNK {}
            }
            was_active = false;
            thread::sleep(Duration::from_millis(5));
            continue;
        }
        if !was_active {
            pipeline.discard_input();
            was_active = true;
        }

        let gain = pipeline.source_gain();
        let n = source.read(&mut chunk, gain);
        if n == 0 {
            // Device busy/failed or source exhausted: skip this tick.
            thread::sleep(Duration::from_millis(1));
            continue;
        }
        if source.take_overrun() {
            pipeline.flag_capture_overrun();
        }
        pipeline.push_samples(&chunk[..n]);

        if !realtime {
            // Deterministic sources deliver instantly; yield so consumers
            // get a chance at the exchange lock.
            thread::yield_now();
        }
    }

    log::info!("engine: worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ToneSource;
    use std::time::Instant;

    #[test]
    fn test_resize_aborts_when_exchange_stays_locked() {
        let config = EngineConfig::default(); // 40 kHz, N = 512
        let source = ToneSource::new(40_000, 1000.0, 0.5);
        let (mut engine, handle) =
            SpectrumEngine::start(config, Box::new(source)).expect("engine start");

        // Occupy the slot well past the invalidation deadline.
        let blocker = {
            let exchange = handle.exchange.clone();
            thread::spawn(move || exchange.hold_lock_for(Duration::from_millis(150)))
        };
        thread::sleep(Duration::from_millis(10));

        // The resize must not be staged when the invalidation cannot land:
        // a half-applied one would leave the exchange refusing every
        // rebuilt publish.
        assert!(!handle.set_fft_size(1024));
        assert_eq!(handle.fft_size(), 512);
        blocker.join().unwrap();

        // With the lock released the running size keeps flowing.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut snap = None;
        while Instant::now() < deadline {
            if let Some(s) = handle.snapshot() {
                snap = Some(s);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        let snap = snap.expect("no snapshot after aborted resize");
        assert_eq!(snap.magnitude.len(), 256);
        engine.stop();
    }
}
