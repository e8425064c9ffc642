// src/products/waterfall.rs

/// Sliding time window over spectral history: a bounded-height grid of
/// quantized intensity rows, newest first. Inserting a row shifts the
/// existing rows down and overwrites the oldest, so the row count never
/// exceeds the configured height. This is FIFO by insertion time, not a
/// value-keyed structure.
pub struct Waterfall {
    rows: Vec<Vec<u8>>,
    width: usize,
    levels: u8,
    min_hz: f32,
    /// Magnitude that maps to the top intensity level.
    full_scale: f32,
}

impl Waterfall {
    pub fn new(width: usize, height: usize, levels: u8, min_hz: f32, full_scale: f32) -> Self {
        let width = width.max(1);
        Self {
            rows: vec![vec![0; width]; height.max(1)],
            width,
            levels: levels.max(2),
            min_hz,
            full_scale: full_scale.max(1e-6),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Rows, newest first.
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Copy the whole grid into `dest`, reusing its allocations.
    pub fn copy_into(&self, dest: &mut Vec<Vec<u8>>) {
        dest.clone_from(&self.rows);
    }

    /// Map one magnitude spectrum onto display-frequency columns and insert
    /// it as the newest row. Bins below `min_hz` are excluded.
    pub fn push_spectrum(&mut self, magnitude: &[f32], bin_width_hz: f32) {
        // Shift-and-overwrite: the previous oldest row becomes the slot for
        // the new data.
        self.rows.rotate_right(1);
        let row = &mut self.rows[0];

        let min_bin = if bin_width_hz > 0.0 {
            (self.min_hz / bin_width_hz).ceil() as usize
        } else {
            0
        };
        if min_bin >= magnitude.len() {
            row.fill(0);
            return;
        }
        let usable = magnitude.len() - min_bin;
        let top = self.levels - 1;
        for (col, slot) in row.iter_mut().enumerate() {
            let start = min_bin + col * usable / self.width;
            let end = (min_bin + (col + 1) * usable / self.width).max(start + 1);
            let end = end.min(magnitude.len());
            let peak = magnitude[start..end]
                .iter()
                .fold(0.0f32, |acc, &m| acc.max(m));
            let level = (peak / self.full_scale * self.levels as f32) as u32;
            *slot = level.min(top as u32) as u8;
        }
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(0);
        }
    }
}
