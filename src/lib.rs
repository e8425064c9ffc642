// src/lib.rs

pub mod config;
pub mod engine;
pub mod exchange;
pub mod products;
pub mod ring_buffer;
pub mod sampler;
pub mod spectral;

pub use config::{EngineConfig, MAX_FFT_SIZE, MIN_FFT_SIZE};
pub use engine::{EngineStatus, SpectrumEngine, SpectrumHandle};
pub use exchange::SpectrumSnapshot;
pub use ring_buffer::SampleRing; // convenience
pub use sampler::SampleSource;
