// src/analyze_main.rs

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use spectrum_engine::engine::{Pipeline, StatusCells};
use spectrum_engine::exchange::Exchange;
use spectrum_engine::sampler::{SampleSource, WavSource};
use spectrum_engine::EngineConfig;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: wav_analyzer <file.wav> [fft_size]");
        std::process::exit(2);
    }
    let path = &args[1];

    let mut source = WavSource::open(path)?;
    let mut config = EngineConfig {
        sample_rate: source.sample_rate() as f32,
        ..Default::default()
    };
    if let Some(arg) = args.get(2) {
        config.fft_size = arg.parse()?;
    }
    config.validate()?;

    // Drive the pipeline synchronously; no worker thread needed offline.
    let exchange = Arc::new(Exchange::new(config.fft_size / 2));
    let status = StatusCells::new();
    let mut pipeline = Pipeline::new(&config, exchange.clone(), status.clone());
    let take_timeout = Duration::from_millis(10);

    let mut chunk = vec![0.0f32; 4096];
    let mut snapshots = 0u64;
    let mut dominant_bin = 0usize;
    let mut dominant_magnitude = 0.0f32;

    loop {
        let gain = pipeline.source_gain();
        let n = source.read(&mut chunk, gain);
        if n == 0 {
            break;
        }
        pipeline.push_samples(&chunk[..n]);
        while let Some(snap) = exchange.take(take_timeout) {
            snapshots += 1;
            for (bin, &m) in snap.magnitude.iter().enumerate().skip(1) {
                if m > dominant_magnitude {
                    dominant_magnitude = m;
                    dominant_bin = bin;
                }
            }
        }
    }

    let bin_width = pipeline.bin_width_hz();
    let report = serde_json::json!({
        "file": path,
        "sample_rate_hz": pipeline.sample_rate(),
        "fft_size": pipeline.fft_size(),
        "bin_width_hz": bin_width,
        "cycles": status.snapshot().cycles,
        "snapshots_taken": snapshots,
        "dominant_bin": dominant_bin,
        "dominant_frequency_hz": dominant_bin as f32 * bin_width,
        "dominant_magnitude": dominant_magnitude,
        "final_gain": pipeline.source_gain(),
        "status": status.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
