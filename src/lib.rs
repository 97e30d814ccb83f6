//! Standard MIDI File player
//!
//! Plays SMF sequences to a hardware/virtual MIDI port or to the built-in
//! SoundFont synthesizer, bracketing playback with device reset handshakes.

pub mod audio;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;

pub use audio::midi::{
    DeviceSelector, MidiBackend, OutputChannel, PlayOutcome, PortDescriptor, ResetProtocol,
    Sequence, SequencePlayer, SystemBackend,
};
pub use cancel::CancelToken;
pub use config::{DeviceRef, PlaybackConfig, SynthConfig};
pub use error::{ErrorCategory, PlaybackError, Result};
pub use session::{
    CancelOutcome, FileOutcome, PlaybackSession, SessionHandle, SessionReport, SessionState,
};
