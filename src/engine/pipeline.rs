// src/engine/pipeline.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::exchange::{Exchange, SpectrumSnapshot};
use crate::products::{EnvelopeTracker, Oscilloscope, Waterfall};
use crate::ring_buffer::SampleRing;
use crate::spectral::{AutoGain, SpectralProcessor};

use super::status::StatusCells;

/// Ring capacity in frames; enough slack that a slow cycle does not
/// immediately eat its own input.
const RING_FRAMES: usize = 4;

/// The per-cycle processing chain: ring -> frame assembly -> window/FFT ->
/// magnitude -> auto-gain -> derived products -> publish.
///
/// Owned exclusively by the capture context. The exchange and status cells
/// are the only things it shares with the rest of the world.
pub struct Pipeline {
    fft_size: usize,
    sample_rate: f32,
    ring: SampleRing,
    frame: Vec<f32>,
    frame_fill: usize,
    processor: SpectralProcessor,
    magnitude: Vec<f32>,
    agc: AutoGain,
    scope: Oscilloscope,
    envelope: EnvelopeTracker,
    waterfall: Waterfall,
    snapshot: SpectrumSnapshot,
    cycle: u64,
    publish_timeout: Duration,
    envelope_rise_sec: f32,
    envelope_decay_sec: f32,
    exchange: Arc<Exchange>,
    status: Arc<StatusCells>,
}

impl Pipeline {
    pub fn new(config: &EngineConfig, exchange: Arc<Exchange>, status: Arc<StatusCells>) -> Self {
        Self {
            fft_size: config.fft_size,
            sample_rate: config.sample_rate,
            ring: SampleRing::new(config.fft_size * RING_FRAMES),
            frame: vec![0.0; config.fft_size],
            frame_fill: 0,
            processor: SpectralProcessor::new(config.fft_size),
            magnitude: vec![0.0; config.fft_size / 2],
            agc: AutoGain::new(config.agc),
            scope: Oscilloscope::new(config.display_width),
            envelope: EnvelopeTracker::new(
                config.display_width,
                config.envelope_rise_sec,
                config.envelope_decay_sec,
                config.sample_rate,
            ),
            waterfall: Waterfall::new(
                config.display_width,
                config.waterfall_height,
                config.waterfall_levels,
                config.waterfall_min_hz,
                config.agc.target_peak,
            ),
            snapshot: SpectrumSnapshot::default(),
            cycle: 0,
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
            envelope_rise_sec: config.envelope_rise_sec,
            envelope_decay_sec: config.envelope_decay_sec,
            exchange,
            status,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    /// Gain the sample source must apply to the next batch of samples.
    pub fn source_gain(&self) -> f32 {
        self.agc.effective_gain()
    }

    pub fn set_gain_reference(&mut self, reference: f32) {
        self.agc.set_reference(reference);
    }

    pub fn flag_capture_overrun(&self) {
        self.status.flag_capture_overrun();
    }

    /// Feed raw (already gain-scaled) samples. Runs as many full cycles as
    /// the new data completes and returns how many were run.
    pub fn push_samples(&mut self, samples: &[f32]) -> usize {
        self.ring.write(samples);
        if self.ring.overrun() {
            self.status.flag_capture_overrun();
            self.ring.clear_overrun();
        }
        let mut cycles = 0;
        loop {
            let n = self.ring.read(&mut self.frame[self.frame_fill..]);
            self.frame_fill += n;
            if self.frame_fill < self.fft_size {
                break;
            }
            self.frame_fill = 0;
            self.run_cycle();
            cycles += 1;
        }
        cycles
    }

    /// One full processing cycle over the assembled frame.
    fn run_cycle(&mut self) {
        let started = Instant::now();

        if !self.processor.process(&self.frame) {
            return;
        }
        self.processor.magnitude_into(&mut self.magnitude);

        // Peak search excludes DC; DC offset must not drive the gain loop.
        let peak = self.magnitude[1..]
            .iter()
            .fold(0.0f32, |acc, &m| acc.max(m));
        self.agc.update(peak);

        self.scope.update(&self.frame);
        self.envelope.update(&self.frame);
        self.waterfall.push_spectrum(&self.magnitude, self.bin_width_hz());

        self.cycle += 1;
        self.snapshot.cycle = self.cycle;
        self.snapshot.magnitude.clone_from(&self.magnitude);
        self.snapshot.oscilloscope.clear();
        self.snapshot.oscilloscope.extend_from_slice(self.scope.trace());
        self.snapshot.envelope.clear();
        self.snapshot.envelope.extend_from_slice(self.envelope.trace());
        self.waterfall.copy_into(&mut self.snapshot.waterfall);

        if !self.exchange.publish(&self.snapshot, self.publish_timeout) {
            // Lock wait exceeded its bound (or the size changed under us):
            // this cycle's results are dropped, the producer never stalls.
            self.status.flag_transform_overrun();
            log::debug!("pipeline: cycle {} dropped at publish", self.cycle);
        }

        let period = Duration::from_secs_f32(self.fft_size as f32 / self.sample_rate);
        let elapsed = started.elapsed();
        if elapsed > period {
            self.status.flag_transform_overrun();
        }
        let cpu_pct = 100.0 * elapsed.as_secs_f32() / period.as_secs_f32().max(1e-9);
        self.status.record_cycle(self.fft_size as u64, cpu_pct);
    }

    /// Replace every size-dependent buffer for a new transform size. The
    /// old set drops on reassignment; nothing survives with its old
    /// dimensions. The in-progress frame is discarded.
    pub fn set_fft_size(&mut self, fft_size: usize) {
        if fft_size == self.fft_size {
            return;
        }
        log::info!("pipeline: transform size {} -> {}", self.fft_size, fft_size);
        self.fft_size = fft_size;
        self.ring = SampleRing::new(fft_size * RING_FRAMES);
        self.frame = vec![0.0; fft_size];
        self.frame_fill = 0;
        self.processor.resize(fft_size);
        self.magnitude = vec![0.0; fft_size / 2];
        self.waterfall.clear();
    }

    /// Swap the frequency-scaling parameters; buffer sizes are untouched.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate <= 0.0 {
            return;
        }
        self.sample_rate = sample_rate;
        self.envelope
            .set_sample_rate(sample_rate, self.envelope_rise_sec, self.envelope_decay_sec);
    }

    /// Drop buffered input and assembly progress (used on pause/resume so
    /// stale audio does not burst through on resume).
    pub fn discard_input(&mut self) {
        self.ring.clear();
        self.frame_fill = 0;
    }
}
