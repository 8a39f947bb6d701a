//! Audio callback drivers.
//!
//! A driver prepares the mixer once, pulls blocks from it on its own
//! schedule, and releases it once when done. The core never spawns the
//! audio thread itself: with cpal the device owns it, and the offline
//! driver is stepped by its caller.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;

use super::mixer::Mixer;
use super::types::StreamSpec;
use crate::config::AudioConfig;
use crate::error::EngineError;

/// A running device stream pulling from a mixer.
///
/// Dropping it stops the stream and then releases the mixer.
pub struct OutputStream {
    stream: Option<cpal::Stream>,
    mixer: Arc<Mutex<Mixer>>,
    spec: StreamSpec,
}

impl OutputStream {
    pub fn spec(&self) -> StreamSpec {
        self.spec
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            self.mixer.lock().release();
            log::info!("Audio engine stopped");
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open the configured output device and start pulling from `mixer`.
pub fn start_output(mut mixer: Mixer, config: &AudioConfig) -> Result<OutputStream, EngineError> {
    let device = find_device(&config.device_name)?;
    let (stream_config, sample_format) = find_config(&device, config)?;
    if sample_format != SampleFormat::F32 {
        return Err(EngineError::UnsupportedFormat(sample_format));
    }

    let spec = StreamSpec {
        sample_rate: stream_config.sample_rate,
        block_size: config.block_size.max(1) as usize,
        channels: stream_config.channels,
    };
    log::info!(
        "Starting audio engine: {} channels @ {} Hz",
        spec.channels,
        spec.sample_rate
    );

    mixer.prepare(spec);
    let mixer = Arc::new(Mutex::new(mixer));
    let callback_mixer = Arc::clone(&mixer);

    let built = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // Only contended while the mixer is being released
            match callback_mixer.try_lock() {
                Some(mut mixer) => mixer.pull(data),
                None => data.fill(0.0),
            }
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    );

    let stream = match built.map_err(EngineError::from).and_then(|stream| {
        stream.play()?;
        Ok(stream)
    }) {
        Ok(stream) => stream,
        Err(e) => {
            mixer.lock().release();
            return Err(e);
        }
    };

    log::info!("Audio engine started");
    Ok(OutputStream {
        stream: Some(stream),
        mixer,
        spec,
    })
}

/// Find the output device whose name contains `name`, or the default.
fn find_device(name: &str) -> Result<Device, EngineError> {
    let host = cpal::default_host();

    if !name.is_empty() {
        for device in host.output_devices()? {
            if let Ok(device_name) = device.name() {
                if device_name.contains(name) {
                    log::info!("Found audio device: {}", device_name);
                    return Ok(device);
                }
            }
        }
        log::warn!("Device '{}' not found, using default", name);
    }

    host.default_output_device().ok_or(EngineError::NoDevice)
}

/// Pick an f32 config with the requested channel count and rate, falling
/// back to the device default.
fn find_config(
    device: &Device,
    config: &AudioConfig,
) -> Result<(StreamConfig, SampleFormat), EngineError> {
    if let Some(target_rate) = config.sample_rate {
        for range in device.supported_output_configs()? {
            if range.channels() == config.channels
                && range.sample_format() == SampleFormat::F32
                && target_rate >= range.min_sample_rate()
                && target_rate <= range.max_sample_rate()
            {
                return Ok((range.with_sample_rate(target_rate).into(), SampleFormat::F32));
            }
        }
        log::warn!(
            "No {}-channel f32 config at {} Hz, using default",
            config.channels,
            target_rate
        );
    }

    let default_config = device.default_output_config()?;
    let sample_format = default_config.sample_format();
    Ok((default_config.into(), sample_format))
}

/// Drives a mixer without a device, one block per call.
pub struct OfflineDriver {
    mixer: Mixer,
    buffer: Vec<f32>,
}

impl OfflineDriver {
    pub fn new(mut mixer: Mixer, spec: StreamSpec) -> Self {
        mixer.prepare(spec);
        Self {
            mixer,
            buffer: vec![0.0; spec.block_samples()],
        }
    }

    /// Pull the next block.
    pub fn next_block(&mut self) -> &[f32] {
        self.mixer.pull(&mut self.buffer);
        &self.buffer
    }

    /// Pull `count` blocks, discarding the audio.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            self.mixer.pull(&mut self.buffer);
        }
    }

    /// Release the mixer and hand it back.
    pub fn finish(mut self) -> Mixer {
        self.mixer.release();
        self.mixer
    }
}

/// An output device as shown by `--list-devices`.
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    /// Widest channel layout the device offers, 0 if it reports none.
    pub max_channels: u16,
    pub is_default: bool,
}

/// Enumerate the host's output devices. Unnamed devices are skipped.
pub fn list_audio_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            log::warn!("Cannot enumerate output devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            Some(AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                max_channels: max_output_channels(&device),
                name,
            })
        })
        .collect()
}

fn max_output_channels(device: &Device) -> u16 {
    device
        .supported_output_configs()
        .map(|ranges| ranges.map(|r| r.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}
