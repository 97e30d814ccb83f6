//! Resolved configuration for one invocation

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::midi::reset::ResetProtocol;

/// Environment variable naming the sound bank for the built-in synthesizer
pub const SOUNDFONT_ENV: &str = "SOUNDFONT";

/// Places General MIDI sound banks are commonly installed
const SYSTEM_SOUND_BANKS: &[&str] = &[
    "/usr/share/soundfonts/FluidR3_GM.sf2",
    "/usr/share/sounds/sf2/FluidR3_GM.sf2",
    "/usr/share/soundfonts/default.sf2",
    "/usr/share/sounds/sf2/default-GM.sf2",
];

/// How the user picked an output device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRef {
    /// Index shown by the device listing
    Index(usize),
    /// Substring of the device's display name
    Name(String),
}

/// Settings for the built-in software synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Audio output device name; `None` uses the system default
    pub audio_device: Option<String>,
    /// Preferred output sample rate; the device default is used if unsupported
    pub sample_rate: u32,
    /// Sound bank loaded when the synthesizer opens
    pub default_sound_bank: Option<PathBuf>,
    /// Capacity of the queue between the sequencer and the audio thread
    pub queue_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            audio_device: None,
            sample_rate: 44100,
            default_sound_bank: None,
            queue_capacity: 4096,
        }
    }
}

impl SynthConfig {
    /// Default settings, with the sound bank taken from `$SOUNDFONT` or a
    /// well-known system location
    pub fn from_env() -> Self {
        let default_sound_bank = std::env::var_os(SOUNDFONT_ENV)
            .map(PathBuf::from)
            .or_else(|| {
                SYSTEM_SOUND_BANKS
                    .iter()
                    .map(Path::new)
                    .find(|path| path.is_file())
                    .map(Path::to_path_buf)
            });

        Self {
            default_sound_bank,
            ..Self::default()
        }
    }
}

/// Everything a playback run needs, after argument parsing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Output device; `None` selects the built-in synthesizer
    pub device: Option<DeviceRef>,
    /// Reset handshake sent before each file and at shutdown
    pub reset: ResetProtocol,
    /// Sound bank to install into a software synthesizer
    pub sound_bank: Option<PathBuf>,
    /// Files to play, in order
    pub files: Vec<PathBuf>,
    pub synth: SynthConfig,
}
