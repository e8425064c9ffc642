// src/products/oscilloscope.rs

/// Display-width time-domain trace of the most recent frame, produced by
/// fixed-stride subsampling (no interpolation). The trace is overwritten in
/// place every cycle.
pub struct Oscilloscope {
    trace: Vec<f32>,
}

impl Oscilloscope {
    pub fn new(width: usize) -> Self {
        Self {
            trace: vec![0.0; width.max(1)],
        }
    }

    pub fn width(&self) -> usize {
        self.trace.len()
    }

    pub fn update(&mut self, frame: &[f32]) {
        let width = self.trace.len();
        let stride = (frame.len() / width).max(1);
        for (i, slot) in self.trace.iter_mut().enumerate() {
            *slot = frame.get(i * stride).copied().unwrap_or(0.0);
        }
    }

    pub fn trace(&self) -> &[f32] {
        &self.trace
    }
}
