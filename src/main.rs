// src/main.rs

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::stdout;
use std::time::Duration;

use spectrum_engine::config::{MAX_FFT_SIZE, MIN_FFT_SIZE};
use spectrum_engine::sampler::CaptureSource;
use spectrum_engine::{EngineConfig, SpectrumEngine, SpectrumHandle, SpectrumSnapshot};

const BAR_ROWS: usize = 12;
const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let (_input_guard, source) = CaptureSource::open()?;
    let mut config = EngineConfig::default();
    config.sample_rate = source_rate(&source);
    let width = config.display_width;

    let (mut engine, handle) = SpectrumEngine::start(config, Box::new(source))?;

    println!("Press [SPACE] Pause/Resume | [F] Cycle FFT size | [C] Clear overruns | [Q] Quit");
    enable_raw_mode()?;

    // Target 20 FPS (50ms per frame)
    let target_frame_duration = Duration::from_millis(50);
    let mut last_snapshot: Option<SpectrumSnapshot> = None;

    loop {
        if event::poll(target_frame_duration)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    if ev.code == KeyCode::Char('c')
                        && ev.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }
                    match ev.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char(' ') => {
                            handle.set_processing_active(!handle.is_processing_active());
                        }
                        KeyCode::Char('f') => cycle_fft_size(&handle),
                        KeyCode::Char('c') => handle.clear_overruns(),
                        _ => {}
                    }
                }
            }
        }

        if let Some(snap) = handle.snapshot() {
            last_snapshot = Some(snap);
        }
        if let Some(snap) = &last_snapshot {
            draw(&handle, snap, width)?;
        }
    }

    disable_raw_mode()?;
    engine.stop();
    println!("\n📻 Spectrum monitor stopped.");
    Ok(())
}

fn source_rate(source: &CaptureSource) -> f32 {
    use spectrum_engine::SampleSource;
    source.sample_rate() as f32
}

/// Step through the allowed power-of-two sizes, wrapping at the top.
fn cycle_fft_size(handle: &SpectrumHandle) {
    let current = handle.fft_size() as usize;
    let next = if current >= MAX_FFT_SIZE {
        MIN_FFT_SIZE
    } else {
        current * 2
    };
    handle.set_fft_size(next as u16);
}

fn draw(
    handle: &SpectrumHandle,
    snap: &SpectrumSnapshot,
    width: usize,
) -> Result<(), anyhow::Error> {
    let mut out = stdout();
    execute!(out, cursor::MoveTo(0, 1), Clear(ClearType::FromCursorDown))?;

    // Magnitude bars, resampled onto the display width.
    let bars = column_heights(&snap.magnitude, width);
    for row in 0..BAR_ROWS {
        let top = (BAR_ROWS - row) as f32 / BAR_ROWS as f32;
        let bottom = (BAR_ROWS - row - 1) as f32 / BAR_ROWS as f32;
        let line: String = bars
            .iter()
            .map(|&h| {
                if h >= top {
                    LEVELS[LEVELS.len() - 1]
                } else if h > bottom {
                    let fill = (h - bottom) * BAR_ROWS as f32;
                    LEVELS[(fill * (LEVELS.len() - 1) as f32) as usize]
                } else {
                    ' '
                }
            })
            .collect();
        println!("{}\r", line);
    }

    let status = handle.status();
    println!(
        "cycle {:>8} | N = {:>4} | {:>6.1} Hz/bin | cpu {:>5.1}% | overruns: capture {} fft {} | {}\r",
        snap.cycle,
        handle.fft_size(),
        handle.bin_width_hz(),
        status.cpu_usage_pct,
        if status.capture_overrun { "YES" } else { "no " },
        if status.transform_overrun { "YES" } else { "no " },
        if handle.is_processing_active() { "running" } else { "PAUSED" },
    );
    Ok(())
}

/// Peak-pick the spectrum into `width` columns normalized to [0, 1].
fn column_heights(magnitude: &[f32], width: usize) -> Vec<f32> {
    let mut heights = vec![0.0f32; width];
    if magnitude.len() < 2 {
        return heights;
    }
    let usable = magnitude.len() - 1; // skip DC
    let peak = magnitude[1..].iter().fold(1e-6f32, |a, &m| a.max(m));
    for (col, slot) in heights.iter_mut().enumerate() {
        let start = 1 + col * usable / width;
        let end = (1 + (col + 1) * usable / width).max(start + 1).min(magnitude.len());
        let m = magnitude[start..end].iter().fold(0.0f32, |a, &v| a.max(v));
        *slot = m / peak;
    }
    heights
}
