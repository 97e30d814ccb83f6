//! Error types shared by the playback engine

use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of failure, used to decide between abort, skip and shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or ambiguous device reference, unknown reset protocol
    Configuration,
    /// The output device could not be opened
    DeviceUnavailable,
    /// Sound bank could not be read or decoded
    SoundBank,
    /// One input file could not be read or decoded
    Sequence,
    /// A message could not be delivered to the device
    Transmission,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("unknown reset sequence \"{name}\" (expected one of gm, gs, sc88, xg, mu100, doc, mt32, fb01)")]
    UnknownProtocol { name: String },
    #[error("the MIDI device with index \"{index}\" does not exist. Use -l to list available devices.")]
    DeviceOutOfRange { index: usize },
    #[error("the MIDI device with name \"{name}\" does not exist. Use -l to list available devices.")]
    NoMatch { name: String },
    #[error("\"{name}\" is ambiguous. Please provide a more specific name.")]
    AmbiguousMatch { name: String, candidates: Vec<String> },
    #[error("MIDI device unavailable: {message}. The device may be in use by another application.")]
    DeviceUnavailable { message: String },
    #[error("failed to load sound bank {}: {message}", path.display())]
    SoundBank { path: PathBuf, message: String },
    #[error("the file {} is not a valid MIDI file: {message}", path.display())]
    InvalidSequenceData { path: PathBuf, message: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send MIDI message: {message}")]
    Send { message: String },
}

impl PlaybackError {
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownProtocol { .. }
            | Self::DeviceOutOfRange { .. }
            | Self::NoMatch { .. }
            | Self::AmbiguousMatch { .. } => ErrorCategory::Configuration,
            Self::DeviceUnavailable { .. } => ErrorCategory::DeviceUnavailable,
            Self::SoundBank { .. } => ErrorCategory::SoundBank,
            Self::InvalidSequenceData { .. } | Self::Io { .. } => ErrorCategory::Sequence,
            Self::Send { .. } => ErrorCategory::Transmission,
        }
    }

    /// Fatal errors abort the invocation before or instead of playback
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::DeviceUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
