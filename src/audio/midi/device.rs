//! MIDI output device enumeration and selection
//!
//! The platform side (port enumeration, opening, message delivery) sits behind
//! [`MidiBackend`], [`MidiDevice`] and [`MidiReceiver`]. [`DeviceSelector`]
//! turns a user-supplied index or name into one concrete [`PortDescriptor`].

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::events::MidiEvent;
use crate::config::DeviceRef;
use crate::error::{PlaybackError, Result};

/// Platform reference to an endpoint, only meaningful to the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRef {
    /// The built-in software synthesizer
    Synthesizer,
    /// Output port at this position of the platform's output list
    Output { index: usize },
    /// Input port at this position of the platform's input list (cannot receive)
    Input { index: usize },
}

/// Information about one MIDI endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub description: String,
    /// Number of receivers the endpoint accepts; `None` is unlimited, `Some(0)`
    /// means the endpoint is a pure source
    pub max_receivers: Option<usize>,
    #[serde(skip)]
    pub port: PortRef,
}

impl PortDescriptor {
    /// "vendor name version", skipping empty parts
    pub fn display_name(&self) -> String {
        [&self.vendor, &self.name, &self.version]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether messages can be sent to this endpoint
    pub fn is_receiver(&self) -> bool {
        self.max_receivers != Some(0)
    }
}

/// Sink for MIDI messages bound to one open device
pub trait MidiReceiver: Send {
    /// Deliver a message immediately
    fn send(&mut self, event: &MidiEvent) -> Result<()>;

    /// Release the receiver. Later sends may fail.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receiver shared between the output channel and the sequencer's transmitter
pub type SharedReceiver = Arc<Mutex<Box<dyn MidiReceiver>>>;

/// Summary of an installed sound bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBankInfo {
    pub name: String,
    pub instruments: usize,
}

/// Devices that can load instrument definitions
pub trait Synthesizer {
    /// Decode a sound bank file and install all of its instruments
    fn load_sound_bank(&mut self, path: &Path) -> Result<SoundBankInfo>;
}

/// An opened MIDI endpoint
pub trait MidiDevice: Send {
    fn descriptor(&self) -> &PortDescriptor;

    /// Create a receiver feeding this device
    fn receiver(&mut self) -> Result<Box<dyn MidiReceiver>>;

    /// Sound bank capability, for software synthesizers
    fn as_synthesizer(&mut self) -> Option<&mut dyn Synthesizer> {
        None
    }

    fn close(&mut self) -> Result<()>;
}

/// Platform MIDI subsystem
pub trait MidiBackend: Send + Sync {
    /// Fresh snapshot of every endpoint. Nothing is cached between calls.
    fn enumerate(&self) -> Result<Vec<PortDescriptor>>;

    /// Open an enumerated endpoint for exclusive use
    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn MidiDevice>>;

    /// Open the built-in software synthesizer
    fn open_default_synthesizer(&self) -> Result<Box<dyn MidiDevice>>;
}

/// Resolves device references against one backend
pub struct DeviceSelector<'a> {
    backend: &'a dyn MidiBackend,
}

impl<'a> DeviceSelector<'a> {
    pub fn new(backend: &'a dyn MidiBackend) -> Self {
        Self { backend }
    }

    /// List devices with the index used by [`resolve_by_index`](Self::resolve_by_index)
    ///
    /// Receiver-capable devices come first, in platform order, so their
    /// indices are the same with or without `include_non_receivers`.
    pub fn list_outputs(&self, include_non_receivers: bool) -> Result<Vec<(usize, PortDescriptor)>> {
        let (receivers, sources): (Vec<_>, Vec<_>) = self
            .backend
            .enumerate()?
            .into_iter()
            .partition(PortDescriptor::is_receiver);

        let listed = if include_non_receivers {
            receivers.into_iter().chain(sources).collect::<Vec<_>>()
        } else {
            receivers
        };
        Ok(listed.into_iter().enumerate().collect())
    }

    pub fn resolve_by_index(&self, index: usize) -> Result<PortDescriptor> {
        self.receivers()?
            .into_iter()
            .nth(index)
            .ok_or(PlaybackError::DeviceOutOfRange { index })
    }

    /// Case-sensitive substring match against each receiver's display name
    pub fn resolve_by_name(&self, name: &str) -> Result<PortDescriptor> {
        let mut matches: Vec<PortDescriptor> = self
            .receivers()?
            .into_iter()
            .filter(|port| port.display_name().contains(name))
            .collect();

        match matches.len() {
            0 => Err(PlaybackError::NoMatch {
                name: name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(PlaybackError::AmbiguousMatch {
                name: name.to_string(),
                candidates: matches.iter().map(PortDescriptor::display_name).collect(),
            }),
        }
    }

    pub fn resolve(&self, device: &DeviceRef) -> Result<PortDescriptor> {
        let port = match device {
            DeviceRef::Index(index) => self.resolve_by_index(*index)?,
            DeviceRef::Name(name) => self.resolve_by_name(name)?,
        };
        log::debug!("Resolved {:?} to \"{}\"", device, port.display_name());
        Ok(port)
    }

    fn receivers(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self
            .backend
            .enumerate()?
            .into_iter()
            .filter(PortDescriptor::is_receiver)
            .collect())
    }
}
