// src/sampler/capture.rs

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::SampleSource;

/// Samples of headroom between the device callback and the engine worker.
const TRANSPORT_CAPACITY: usize = 65_536;

/// Keeps the CPAL input stream alive. The stream is not `Send` on every
/// backend, so it stays with whoever called `CaptureSource::open` while the
/// `CaptureSource` half moves into the engine worker.
pub struct InputStreamGuard {
    _stream: Stream,
}

/// Live capture from the default input device.
///
/// The device callback is the block-complete interrupt of this design: a
/// registered closure that owns its SPSC producer and overrun flag, moves
/// the finished block into the transport ring in bounded time, and never
/// allocates or blocks. Channel 0 of interleaved input is used.
pub struct CaptureSource {
    consumer: HeapCons<f32>,
    overrun: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CaptureSource {
    pub fn open() -> Result<(InputStreamGuard, CaptureSource)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        let supported_config = device.default_input_config()?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        let rb = HeapRb::<f32>::new(TRANSPORT_CAPACITY);
        let (producer, consumer) = rb.split();
        let overrun = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream_f32(&device, &config, channels, producer, overrun.clone())?
            }
            SampleFormat::I16 => {
                build_stream_i16(&device, &config, channels, producer, overrun.clone())?
            }
            SampleFormat::U16 => {
                build_stream_u16(&device, &config, channels, producer, overrun.clone())?
            }
            other => anyhow::bail!("Unsupported sample format: {:?}", other),
        };

        log::info!(
            "capture: input device open, {} channels at {} Hz ({:?})",
            channels,
            sample_rate,
            sample_format
        );

        Ok((
            InputStreamGuard { _stream: stream },
            CaptureSource {
                consumer,
                overrun,
                sample_rate,
            },
        ))
    }
}

impl SampleSource for CaptureSource {
    fn read(&mut self, dest: &mut [f32], gain: f32) -> usize {
        let n = self.consumer.pop_slice(dest);
        for s in &mut dest[..n] {
            *s *= gain;
        }
        n
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_overrun(&mut self) -> bool {
        self.overrun.swap(false, Ordering::Relaxed)
    }
}

fn build_stream_f32(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    overrun: Arc<AtomicBool>,
) -> Result<Stream> {
    let err_fn = |err| log::error!("capture: input stream error: {:?}", err);
    let stream = device.build_input_stream(
        config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            push_channel0(&mut producer, &overrun, data.chunks_exact(channels).map(|f| f[0]));
        },
        err_fn,
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

fn build_stream_i16(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    overrun: Arc<AtomicBool>,
) -> Result<Stream> {
    let err_fn = |err| log::error!("capture: input stream error: {:?}", err);
    let stream = device.build_input_stream(
        config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            push_channel0(
                &mut producer,
                &overrun,
                data.chunks_exact(channels).map(|f| f[0] as f32 / 32768.0),
            );
        },
        err_fn,
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

fn build_stream_u16(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
    overrun: Arc<AtomicBool>,
) -> Result<Stream> {
    let err_fn = |err| log::error!("capture: input stream error: {:?}", err);
    let stream = device.build_input_stream(
        config,
        move |data: &[u16], _: &cpal::InputCallbackInfo| {
            push_channel0(
                &mut producer,
                &overrun,
                data.chunks_exact(channels)
                    .map(|f| (f[0] as f32 - 32768.0) / 32768.0),
            );
        },
        err_fn,
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

/// Runs inside the device callback: bounded time, no allocation. A full
/// transport ring drops the remainder of the block and flags the overrun.
#[inline]
fn push_channel0(
    producer: &mut HeapProd<f32>,
    overrun: &AtomicBool,
    samples: impl Iterator<Item = f32>,
) {
    for s in samples {
        if producer.try_push(s).is_err() {
            overrun.store(true, Ordering::Relaxed);
            break;
        }
    }
}
