//! MIDI playback engine
//!
//! Provides reset handshakes, device selection, the output channel, the
//! sequencer and MIDI file decoding.

pub mod backend;
pub mod device;
pub mod events;
pub mod file;
pub mod output;
pub mod player;
pub mod reset;
mod sequencer;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::SystemBackend;
pub use device::{DeviceSelector, MidiBackend, MidiDevice, MidiReceiver, PortDescriptor, SoundBankInfo};
pub use events::{MidiEvent, MidiEventQueue};
pub use file::{load_sequence, Sequence, TimedEvent};
pub use output::OutputChannel;
pub use player::{PlayOutcome, SequencePlayer};
pub use reset::ResetProtocol;
