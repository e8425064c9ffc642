// src/sampler/synthetic.rs

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::path::Path;

use super::SampleSource;

/// Deterministic sine generator, used by the offline binary and tests.
pub struct ToneSource {
    sample_rate: u32,
    frequency: f32,
    amplitude: f32,
    phase: f32,
}

impl ToneSource {
    pub fn new(sample_rate: u32, frequency: f32, amplitude: f32) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude,
            phase: 0.0,
        }
    }
}

impl SampleSource for ToneSource {
    fn read(&mut self, dest: &mut [f32], gain: f32) -> usize {
        let step = 2.0 * PI * self.frequency / self.sample_rate as f32;
        for slot in dest.iter_mut() {
            *slot = self.amplitude * self.phase.sin() * gain;
            self.phase += step;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }
        dest.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_realtime(&self) -> bool {
        false
    }
}

/// Uniform white noise, seeded for reproducibility.
pub struct NoiseSource {
    sample_rate: u32,
    amplitude: f32,
    rng: StdRng,
}

impl NoiseSource {
    pub fn new(sample_rate: u32, amplitude: f32, seed: u64) -> Self {
        Self {
            sample_rate,
            amplitude,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SampleSource for NoiseSource {
    fn read(&mut self, dest: &mut [f32], gain: f32) -> usize {
        for slot in dest.iter_mut() {
            *slot = self.rng.random_range(-1.0..1.0) * self.amplitude * gain;
        }
        dest.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_realtime(&self) -> bool {
        false
    }
}

/// WAV file playback into the pipeline, mono-downmixed and normalized.
/// Returns 0 from `read` once the file is exhausted.
pub struct WavSource {
    sample_rate: u32,
    samples: Vec<f32>,
    position: usize,
}

impl WavSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            samples,
            position: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for WavSource {
    fn read(&mut self, dest: &mut [f32], gain: f32) -> usize {
        let n = dest.len().min(self.remaining());
        for (slot, &s) in dest[..n].iter_mut().zip(&self.samples[self.position..]) {
            *slot = s * gain;
        }
        self.position += n;
        n
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_realtime(&self) -> bool {
        false
    }
}
