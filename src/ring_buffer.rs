// src/ring_buffer.rs

/// Fixed-capacity circular buffer of raw samples. Pre-allocated, never
/// grows. Decouples capture timing from frame assembly; both ends run on
/// the capture context, so no locking is needed.
///
/// When a write does not fit, the oldest unread samples are overwritten and
/// the sticky overrun flag is set. Bounded loss under backpressure is the
/// accepted policy here, not an error.
pub struct SampleRing {
    buffer: Box<[f32]>,
    write_pos: usize,
    read_pos: usize,
    len: usize,
    overrun: bool,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            len: 0,
            overrun: false,
        }
    }

    /// Append samples, overwriting the oldest unread data if full.
    #[inline]
    pub fn write(&mut self, samples: &[f32]) {
        let capacity = self.buffer.len();
        for &s in samples {
            self.buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % capacity;
            if self.len == capacity {
                // Full: the slot we just wrote was the oldest unread sample.
                self.read_pos = self.write_pos;
                self.overrun = true;
            } else {
                self.len += 1;
            }
        }
    }

    /// Non-blocking read of up to `dest.len()` samples, oldest first.
    /// Returns the number of samples actually copied.
    #[inline]
    pub fn read(&mut self, dest: &mut [f32]) -> usize {
        let capacity = self.buffer.len();
        let to_read = dest.len().min(self.len);
        for slot in dest.iter_mut().take(to_read) {
            *slot = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % capacity;
        }
        self.len -= to_read;
        to_read
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.buffer.len() - self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn clear_overrun(&mut self) {
        self.overrun = false;
    }

    /// Discard all unread samples (used when processing resumes or resizes).
    pub fn clear(&mut self) {
        self.read_pos = self.write_pos;
        self.len = 0;
    }
}
