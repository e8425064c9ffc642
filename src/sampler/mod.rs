// src/sampler/mod.rs

pub mod capture;
pub mod synthetic;

pub use capture::{CaptureSource, InputStreamGuard};
pub use synthetic::{NoiseSource, ToneSource, WavSource};

/// One contract for every way samples can enter the pipeline: live device
/// capture or a deterministic generator. The engine worker owns the source
/// and pulls from it; the current auto-gain factor is applied here, at the
/// source, so the feedback always lands on the *next* cycle's samples.
pub trait SampleSource: Send {
    /// Pull up to `dest.len()` new samples, scaled by `gain`. Returns how
    /// many were produced; 0 means nothing is available right now (a busy
    /// or failed device read is skipped, never retried synchronously).
    fn read(&mut self, dest: &mut [f32], gain: f32) -> usize;

    /// Native sample rate of this source in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether the source delivers at wall-clock cadence. Deterministic
    /// sources return false and the engine processes back-to-back.
    fn is_realtime(&self) -> bool {
        true
    }

    /// True if the device dropped samples since the last call.
    fn take_overrun(&mut self) -> bool {
        false
    }
}
