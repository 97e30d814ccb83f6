//! Audio output device lookup for the built-in synthesizer

use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::SynthConfig;
use crate::error::{PlaybackError, Result};

/// Output channels rendered by the synthesizer
const STEREO: u16 = 2;

/// Get the default output device
pub fn get_default_output_device() -> Result<cpal::Device> {
    let host = cpal::default_host();
    host.default_output_device()
        .ok_or_else(|| PlaybackError::device_unavailable("no default audio output device found"))
}

/// Get output device by name, or default if name is None
pub fn get_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match name {
        Some(device_name) => {
            let devices = host.output_devices().map_err(|e| {
                PlaybackError::device_unavailable(format!("failed to enumerate audio devices: {}", e))
            })?;

            for device in devices {
                if let Ok(n) = device.name() {
                    if n == device_name {
                        return Ok(device);
                    }
                }
            }
            Err(PlaybackError::device_unavailable(format!(
                "audio device '{}' not found",
                device_name
            )))
        }
        None => get_default_output_device(),
    }
}

/// Stream config for `device`, preferring the configured sample rate
pub fn get_supported_config(device: &cpal::Device, preferred: &SynthConfig) -> Result<cpal::StreamConfig> {
    let supported_configs = device.supported_output_configs().map_err(|e| {
        PlaybackError::device_unavailable(format!("failed to get supported configs: {}", e))
    })?;

    // Try to find a config matching our preferences
    for config in supported_configs {
        let min_rate = config.min_sample_rate().0;
        let max_rate = config.max_sample_rate().0;

        if preferred.sample_rate >= min_rate
            && preferred.sample_rate <= max_rate
            && config.channels() >= STEREO
            && config.sample_format() == cpal::SampleFormat::F32
        {
            return Ok(cpal::StreamConfig {
                channels: STEREO,
                sample_rate: cpal::SampleRate(preferred.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            });
        }
    }

    // Fall back to default config
    let default_config = device.default_output_config().map_err(|e| {
        PlaybackError::device_unavailable(format!("failed to get default config: {}", e))
    })?;

    Ok(cpal::StreamConfig {
        channels: default_config.channels().min(STEREO),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
