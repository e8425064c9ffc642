// src/spectral/mod.rs

pub mod agc;
pub mod fft;

pub use agc::AutoGain;
pub use fft::SpectralProcessor;
