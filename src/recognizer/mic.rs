//! Microphone capture for the voice check-in window.
//!
//! Capture is a fixed listening window: build the input stream, let it run,
//! drop it, hand back the samples. The whole thing happens on a blocking
//! thread so the cpal stream never crosses an await point.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{WavSpec, WavWriter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

/// Whether a usable input device exists. The controller reports an
/// unsupported-platform error when this is false.
pub fn input_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Record mono samples from the default input device for the given window.
pub fn capture_samples(sample_rate: u32, window: Duration) -> Result<Vec<f32>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available for voice capture")?;

    info!(
        "Voice capture using device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples = Arc::new(Mutex::new(Vec::new()));
    let samples_clone = samples.clone();
    let err_fn = |err| error!("Voice capture stream error: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut samples) = samples_clone.lock() {
                samples.extend_from_slice(data);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    std::thread::sleep(window);
    drop(stream);

    let collected = {
        let mut guard = samples.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    };

    info!("Voice capture stopped, {} samples", collected.len());
    Ok(collected)
}

/// Write captured samples as a mono float WAV.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}
