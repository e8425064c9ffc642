// src/products/mod.rs

pub mod envelope;
pub mod oscilloscope;
pub mod waterfall;

pub use envelope::EnvelopeTracker;
pub use oscilloscope::Oscilloscope;
pub use waterfall::Waterfall;
