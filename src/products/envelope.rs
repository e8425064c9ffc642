// src/products/envelope.rs

/// Smoothed rectified amplitude trace. Each raw sample's |value| feeds a
/// one-pole smoother with distinct rise and decay coefficients (rises fast,
/// decays slowly), giving a peak-hold look. The smoother state is sampled
/// into a fixed display-width trace once per stride.
pub struct EnvelopeTracker {
    rise_coeff: f32,
    decay_coeff: f32,
    state: f32,
    trace: Vec<f32>,
}

impl EnvelopeTracker {
    /// Coefficients are derived from time constants the way the meter
    /// ballistics do it: coeff = 1 - e^(-1 / (tau * rate)).
    pub fn new(width: usize, rise_sec: f32, decay_sec: f32, sample_rate: f32) -> Self {
        Self {
            rise_coeff: Self::coeff(rise_sec, sample_rate),
            decay_coeff: Self::coeff(decay_sec, sample_rate),
            state: 0.0,
            trace: vec![0.0; width.max(1)],
        }
    }

    fn coeff(tau_sec: f32, sample_rate: f32) -> f32 {
        let tau = tau_sec.max(1e-6);
        let rate = sample_rate.max(1.0);
        1.0 - (-1.0 / (tau * rate)).exp()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32, rise_sec: f32, decay_sec: f32) {
        self.rise_coeff = Self::coeff(rise_sec, sample_rate);
        self.decay_coeff = Self::coeff(decay_sec, sample_rate);
    }

    pub fn width(&self) -> usize {
        self.trace.len()
    }

    pub fn update(&mut self, frame: &[f32]) {
        let width = self.trace.len();
        let stride = (frame.len() / width).max(1);
        let mut slot = 0;
        for (i, &s) in frame.iter().enumerate() {
            let x = s.abs();
            let coeff = if x > self.state {
                self.rise_coeff
            } else {
                self.decay_coeff
            };
            self.state += (x - self.state) * coeff;
            if (i + 1) % stride == 0 && slot < width {
                self.trace[slot] = self.state;
                slot += 1;
            }
        }
        // Frames shorter than the display hold the last state.
        for rest in self.trace.iter_mut().skip(slot) {
            *rest = self.state;
        }
    }

    pub fn trace(&self) -> &[f32] {
        &self.trace
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
        self.trace.fill(0.0);
    }
}
