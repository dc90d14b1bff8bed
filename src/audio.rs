//! Microphone capture.
//!
//! Two entry points: [`record_clip`] captures a fixed-duration WAV artifact
//! for the emergency pipeline, and [`spawn_window_stream`] runs an input
//! stream on a dedicated thread and hands fixed-size sample windows to the
//! distress monitor over a channel. cpal streams are not `Send`, so both
//! keep the stream confined to the thread that built it.

use crate::config::AudioConfig;
use crate::error::{AssistantError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Samples per monitor window (~64 ms at 16 kHz).
pub const WINDOW_SAMPLES: usize = 1024;

fn input_device(cfg: &AudioConfig) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = &cfg.input_device {
        let mut devices = host
            .input_devices()
            .map_err(|e| AssistantError::Audio(format!("enumerate devices: {e}")))?;
        devices
            .find(|d| {
                d.description()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| AssistantError::Audio(format!("input device '{name}' not found")))
    } else {
        host.default_input_device()
            .ok_or_else(|| AssistantError::Audio("no default input device".into()))
    }
}

fn stream_config(cfg: &AudioConfig) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: cfg.channels,
        sample_rate: cfg.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    }
}

/// Build an input stream that appends f32 samples through `on_samples`.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    on_samples: impl FnMut(&[f32]) + Send + 'static,
) -> Result<cpal::Stream> {
    let mut on_samples = on_samples;
    device
        .build_input_stream(
            config,
            move |data: &[f32], _| on_samples(data),
            |e| warn!(error = %e, "input stream error"),
            None,
        )
        .map_err(|e| AssistantError::Audio(format!("build stream: {e}")))
}

/// Record `duration` of microphone audio to a 16-bit PCM WAV at `path`.
/// Blocks the calling thread for the whole duration; run it under
/// `spawn_blocking` from async code.
pub fn record_clip(cfg: &AudioConfig, duration: Duration, path: &Path) -> Result<PathBuf> {
    let device = input_device(cfg)?;
    let config = stream_config(cfg);

    let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = samples.clone();
    let stream = build_stream(&device, &config, move |data| {
        if let Ok(mut buf) = sink.lock() {
            buf.extend_from_slice(data);
        }
    })?;
    stream
        .play()
        .map_err(|e| AssistantError::Audio(format!("start stream: {e}")))?;
    std::thread::sleep(duration);
    drop(stream);

    let captured = samples
        .lock()
        .map_err(|_| AssistantError::Audio("capture buffer poisoned".into()))?;
    debug!(samples = captured.len(), path = %path.display(), "writing clip");
    write_wav(path, &captured, cfg)?;
    Ok(path.to_owned())
}

/// Write f32 samples as 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], cfg: &AudioConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: cfg.channels,
        sample_rate: cfg.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| AssistantError::Audio(format!("create wav: {e}")))?;
    for &s in samples {
        let clamped = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| AssistantError::Audio(format!("write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| AssistantError::Audio(format!("finalize wav: {e}")))?;
    Ok(())
}

/// Keeps the capture thread alive; dropping it stops the stream.
pub struct CaptureGuard {
    stop: Arc<AtomicBool>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Start a background input stream delivering [`WINDOW_SAMPLES`]-sized
/// windows. Windows are dropped, not queued, when the consumer lags.
pub fn spawn_window_stream(
    cfg: &AudioConfig,
) -> Result<(mpsc::Receiver<Vec<f32>>, CaptureGuard)> {
    let (tx, rx) = mpsc::channel::<Vec<f32>>(16);
    let stop = Arc::new(AtomicBool::new(false));
    let guard = CaptureGuard { stop: stop.clone() };
    let cfg = cfg.clone();

    std::thread::Builder::new()
        .name("mic-windows".into())
        .spawn(move || {
            let device = match input_device(&cfg) {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "window stream unavailable");
                    return;
                }
            };
            let config = stream_config(&cfg);
            let mut pending: Vec<f32> = Vec::with_capacity(WINDOW_SAMPLES);
            let stream = build_stream(&device, &config, move |data| {
                pending.extend_from_slice(data);
                while pending.len() >= WINDOW_SAMPLES {
                    let window: Vec<f32> = pending.drain(..WINDOW_SAMPLES).collect();
                    // A full channel means the monitor is behind; skip.
                    let _ = tx.try_send(window);
                }
            });
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "window stream build failed");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                warn!(error = %e, "window stream start failed");
                return;
            }
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(100));
            }
        })
        .map_err(|e| AssistantError::Audio(format!("capture thread: {e}")))?;

    Ok((rx, guard))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::AudioConfig;

    #[test]
    fn stream_config_carries_the_configured_rate_and_channels() {
        let cfg = AudioConfig::default();
        let stream = stream_config(&cfg);
        assert_eq!(stream.sample_rate, cfg.sample_rate);
        assert_eq!(stream.channels, cfg.channels);
    }

    #[test]
    fn wav_round_trips_sample_count_and_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips").join("test.wav");
        let cfg = AudioConfig::default();
        let samples: Vec<f32> = (0..WINDOW_SAMPLES).map(|i| (i as f32 / 512.0).sin()).collect();

        write_wav(&path, &samples, &cfg).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, cfg.sample_rate);
        assert_eq!(spec.channels, cfg.channels);
        assert_eq!(reader.len() as usize, WINDOW_SAMPLES);
    }

    #[test]
    fn wav_clamps_out_of_range_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hot.wav");
        let cfg = AudioConfig::default();

        write_wav(&path, &[2.0, -2.0], &cfg).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let vals: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(vals, vec![i16::MAX, i16::MIN + 1]);
    }
}
