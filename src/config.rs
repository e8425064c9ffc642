// src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};

/// Smallest transform size the pipeline accepts.
pub const MIN_FFT_SIZE: usize = 32;
/// Largest transform size the pipeline accepts.
pub const MAX_FFT_SIZE: usize = 4096;

/// True if `n` is a usable transform size: power of two within
/// [MIN_FFT_SIZE, MAX_FFT_SIZE].
pub fn is_valid_fft_size(n: usize) -> bool {
    n.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&n)
}

/// Auto-gain loop parameters. Attack reacts fast to loud input so the
/// spectrum does not clip; release recovers slowly so a quiet passage
/// does not pump the display.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct AgcParams {
    pub target_peak: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    pub attack_coeff: f32,
    pub release_coeff: f32,
}

impl Default for AgcParams {
    fn default() -> Self {
        Self {
            target_peak: 0.8,
            min_gain: 0.1,
            max_gain: 20.0,
            attack_coeff: 0.5,
            release_coeff: 0.05,
        }
    }
}

/// Full engine configuration. Loadable/storable as JSON so a front end can
/// persist it alongside its own settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EngineConfig {
    /// Transform size N. Power of two in [MIN_FFT_SIZE, MAX_FFT_SIZE].
    pub fft_size: usize,
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Width of the oscilloscope/envelope traces and waterfall rows.
    pub display_width: usize,
    /// Number of waterfall rows kept (sliding time window).
    pub waterfall_height: usize,
    /// Number of quantized waterfall intensity levels.
    pub waterfall_levels: u8,
    /// Spectrum content below this frequency is excluded from the waterfall.
    pub waterfall_min_hz: f32,
    /// Envelope rise time constant in seconds.
    pub envelope_rise_sec: f32,
    /// Envelope decay time constant in seconds.
    pub envelope_decay_sec: f32,
    /// How long the producer may wait for the exchange lock before it
    /// drops the cycle's results.
    pub publish_timeout_ms: u64,
    pub agc: AgcParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            sample_rate: 40_000.0,
            display_width: 128,
            waterfall_height: 64,
            waterfall_levels: 16,
            waterfall_min_hz: 150.0,
            envelope_rise_sec: 0.002,
            envelope_decay_sec: 0.080,
            publish_timeout_ms: 5,
            agc: AgcParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_fft_size(self.fft_size) {
            anyhow::bail!(
                "fft_size {} must be a power of two in [{}, {}]",
                self.fft_size,
                MIN_FFT_SIZE,
                MAX_FFT_SIZE
            );
        }
        if self.sample_rate <= 0.0 {
            anyhow::bail!("sample_rate must be positive");
        }
        if self.display_width == 0 {
            anyhow::bail!("display_width must be nonzero");
        }
        if self.waterfall_height == 0 {
            anyhow::bail!("waterfall_height must be nonzero");
        }
        if self.waterfall_levels < 2 {
            anyhow::bail!("waterfall_levels must be at least 2");
        }
        Ok(())
    }

    /// Frequency span of one spectrum bin.
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    pub fn save_to_disk(&self, path: &str) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_from_disk(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_fft_sizes() {
        for n in [32, 64, 128, 256, 512, 1024, 2048, 4096] {
            assert!(is_valid_fft_size(n), "{} should be accepted", n);
        }
    }

    #[test]
    fn test_invalid_fft_sizes() {
        for n in [0, 1, 2, 16, 31, 500, 513, 8192] {
            assert!(!is_valid_fft_size(n), "{} should be rejected", n);
        }
    }

    #[test]
    fn test_default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bin_width() {
        let config = EngineConfig {
            fft_size: 512,
            sample_rate: 40_000.0,
            ..Default::default()
        };
        assert!((config.bin_width_hz() - 78.125).abs() < 1e-3);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fft_size, config.fft_size);
        assert_eq!(back.display_width, config.display_width);
    }
}
