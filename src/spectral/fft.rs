// src/spectral/fft.rs

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::config::is_valid_fft_size;

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Windowed forward real-to-complex transform plus one-sided magnitude.
///
/// The plan, window coefficients and work buffers are sized once for the
/// current transform size and rebuilt only through `resize`. `process` is
/// the single most expensive step of a cycle; everything here is
/// allocation-free after construction.
pub struct SpectralProcessor {
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralProcessor {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            planner,
            fft,
            size,
            window: hann_window(size),
            buffer: vec![Complex32::new(0.0, 0.0); size],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of meaningful spectrum bins (N/2 for a real input).
    pub fn half_size(&self) -> usize {
        self.size / 2
    }

    /// Replace the plan, window and work buffers for a new transform size.
    /// The old buffers drop on reassignment.
    pub fn resize(&mut self, size: usize) {
        self.fft = self.planner.plan_fft_forward(size);
        self.size = size;
        self.window = hann_window(size);
        self.buffer = vec![Complex32::new(0.0, 0.0); size];
        self.scratch = vec![Complex32::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
    }

    /// Window `frame` and run the forward transform in place.
    ///
    /// Returns false (and leaves the previous spectrum untouched) if the
    /// frame does not match the configured size or the size is not a usable
    /// power of two. A bad size is a defensive no-op, never a panic.
    pub fn process(&mut self, frame: &[f32]) -> bool {
        if frame.len() != self.size || !is_valid_fft_size(self.size) {
            log::warn!(
                "spectral: skipping frame of {} samples (transform size {})",
                frame.len(),
                self.size
            );
            return false;
        }
        for (slot, (&s, &w)) in self.buffer.iter_mut().zip(frame.iter().zip(&self.window)) {
            *slot = Complex32::new(s * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        true
    }

    /// One-sided normalized magnitude over bins [0, N/2).
    ///
    /// DC is scaled by 1/N; every other bin by 2/N, since for a real input
    /// the energy of bin k is mirrored into bin N-k. Bins whose squared
    /// magnitude underflows come out as exactly 0.0.
    pub fn magnitude_into(&self, out: &mut Vec<f32>) {
        let half = self.half_size();
        out.resize(half, 0.0);
        let dc_scale = 1.0 / self.size as f32;
        let ac_scale = 2.0 / self.size as f32;
        for (k, slot) in out.iter_mut().enumerate() {
            let sq = self.buffer[k].norm_sqr();
            if sq > 0.0 {
                let scale = if k == 0 { dc_scale } else { ac_scale };
                *slot = sq.sqrt() * scale;
            } else {
                *slot = 0.0;
            }
        }
    }
}
