//! Live audio capture using cpal
//!
//! Opens an input device in the integer sample format matching the
//! configured bit depth and forwards the callback's raw bytes to the
//! pipeline. Block boundaries are whatever the device delivers.
//!
//! cpal streams are not `Send` on every platform, so the stream is created,
//! kept alive and torn down on a dedicated thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, StreamError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{BlockSender, Submit};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::spectrum::BitDepth;

/// How often the capture thread checks the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Device settings for a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Device name (None = default input device)
    pub device_name: Option<String>,
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    /// Requested frames per callback
    pub buffer_frames: u32,
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device_name: config.device_name.clone(),
            sample_rate: config.sample_rate,
            bit_depth: config.bit_depth,
            buffer_frames: config.block_samples() as u32,
        }
    }
}

/// cpal sample format carrying raw samples of `depth`
pub fn sample_format_for(depth: BitDepth) -> SampleFormat {
    match depth {
        BitDepth::Eight => SampleFormat::U8,
        BitDepth::Sixteen => SampleFormat::I16,
        BitDepth::ThirtyTwo => SampleFormat::I32,
    }
}

/// List available audio input devices.
///
/// Used by GET /audio/devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .input_devices()
        .map_err(|e| Error::Capture(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} input devices", devices.len());
    Ok(devices)
}

/// Keep only the first channel of interleaved frames
pub fn first_channel(data: &[u8], channels: usize, width: usize) -> Vec<u8> {
    if channels <= 1 {
        return data.to_vec();
    }

    data.chunks_exact(channels * width)
        .flat_map(|frame| frame[..width].iter().copied())
        .collect()
}

/// Start capturing on a dedicated thread.
///
/// Returns once the stream is playing (or failed to start). The thread runs
/// until `running` is cleared or the pipeline goes away.
pub fn spawn(
    settings: CaptureSettings,
    sink: BlockSender,
    running: Arc<AtomicBool>,
) -> Result<(BitDepth, JoinHandle<()>)> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
    let depth = settings.bit_depth;

    let handle = thread::Builder::new()
        .name("audio-capture".to_string())
        .spawn(move || {
            let stream = match open_stream(&settings, sink, Arc::clone(&running)) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            while running.load(Ordering::SeqCst) {
                thread::sleep(POLL_INTERVAL);
            }

            if let Err(e) = stream.pause() {
                warn!("Failed to pause capture stream: {}", e);
            }
            drop(stream);
            info!("Audio capture stopped");
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((depth, handle)),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(Error::Capture("Capture thread exited during startup".to_string())),
    }
}

fn open_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = name {
        let mut devices = host
            .input_devices()
            .map_err(|e| Error::Capture(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested input device: {}", name);
            return Ok(device);
        }
        warn!("Requested input device '{}' not found, falling back to default device", name);
    }

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Capture("No default input device found".to_string()))?;
    info!(
        "Using default input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Pick a supported config for the requested rate and format, mono preferred
fn select_config(device: &Device, settings: &CaptureSettings) -> Result<StreamConfig> {
    let format = sample_format_for(settings.bit_depth);
    let rate = SampleRate(settings.sample_rate);

    let mut candidates: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| Error::Capture(format!("Failed to get device configs: {}", e)))?
        .filter(|c| {
            c.sample_format() == format && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
        .collect();
    candidates.sort_by_key(|c| c.channels());

    let supported = candidates.into_iter().next().ok_or_else(|| {
        Error::Capture(format!(
            "Device does not support {} samples at {} Hz",
            settings.bit_depth, settings.sample_rate
        ))
    })?;

    let mut config = supported.with_sample_rate(rate).config();
    config.buffer_size = BufferSize::Fixed(settings.buffer_frames.max(1));
    Ok(config)
}

fn open_stream(settings: &CaptureSettings, sink: BlockSender, running: Arc<AtomicBool>) -> Result<Stream> {
    let device = open_device(settings.device_name.as_deref())?;
    let mut config = select_config(&device, settings)?;
    let format = sample_format_for(settings.bit_depth);

    let stream = match build_stream(&device, &config, format, sink.clone(), Arc::clone(&running)) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Fixed buffer size rejected ({}), retrying with device default", e);
            config.buffer_size = BufferSize::Default;
            build_stream(&device, &config, format, sink, running)?
        }
    };

    stream
        .play()
        .map_err(|e| Error::Capture(format!("Failed to start stream: {}", e)))?;

    info!(
        "Audio capture started: {} Hz, {} channel(s), {:?}, buffer {:?}",
        config.sample_rate.0, config.channels, format, config.buffer_size
    );
    Ok(stream)
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    sink: BlockSender,
    running: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let width = format.sample_size();
    let stop_on_error = Arc::clone(&running);

    device
        .build_input_stream_raw(
            config,
            format,
            move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                let block = first_channel(data.bytes(), channels, width);
                if sink.submit(block) == Submit::Closed {
                    running.store(false, Ordering::SeqCst);
                }
            },
            move |err| {
                error!("Audio capture stream error: {}", err);
                // Device gone: nothing more will arrive
                if matches!(err, StreamError::DeviceNotAvailable) {
                    stop_on_error.store(false, Ordering::SeqCst);
                }
            },
            None,
        )
        .map_err(|e| Error::Capture(format!("Failed to build stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_formats() {
        assert_eq!(sample_format_for(BitDepth::Eight), SampleFormat::U8);
        assert_eq!(sample_format_for(BitDepth::Sixteen), SampleFormat::I16);
        assert_eq!(sample_format_for(BitDepth::ThirtyTwo), SampleFormat::I32);

        for depth in [BitDepth::Eight, BitDepth::Sixteen, BitDepth::ThirtyTwo] {
            assert_eq!(sample_format_for(depth).sample_size(), depth.byte_width());
        }
    }

    #[test]
    fn test_first_channel_mono_passthrough() {
        assert_eq!(first_channel(&[1, 2, 3], 1, 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_first_channel_interleaved() {
        // Two channels of 16-bit: L0 R0 L1 R1
        let data = [0x01, 0x02, 0xAA, 0xBB, 0x03, 0x04, 0xCC, 0xDD];
        assert_eq!(first_channel(&data, 2, 2), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            device_name: Some("USB Mic".to_string()),
            ..Config::default()
        };
        let settings = CaptureSettings::from_config(&config);
        assert_eq!(settings.device_name.as_deref(), Some("USB Mic"));
        assert_eq!(settings.buffer_frames, 960);
        assert_eq!(settings.bit_depth, BitDepth::ThirtyTwo);
    }
}
