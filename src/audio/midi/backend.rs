//! System MIDI backend
//!
//! Enumerates the built-in software synthesizer plus every midir output and
//! input port, and opens them for playback. Input ports are listed (with zero
//! receivers) but can never be opened for output.

use std::sync::Arc;

use midir::{MidiInput, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;

use super::device::{MidiBackend, MidiDevice, MidiReceiver, PortDescriptor, PortRef};
use super::events::MidiEvent;
use crate::audio::synth::SoftwareSynth;
use crate::config::SynthConfig;
use crate::error::{PlaybackError, Result};

const CLIENT_NAME: &str = "playsmf";

/// Platform MIDI through midir, with the built-in synthesizer listed first
pub struct SystemBackend {
    synth: SynthConfig,
}

impl SystemBackend {
    pub fn new(synth: SynthConfig) -> Self {
        Self { synth }
    }

    fn output_ports() -> Result<Vec<PortDescriptor>> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| PlaybackError::device_unavailable(format!("failed to create MIDI output: {}", e)))?;

        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                external_port(name, "External MIDI Port", None, PortRef::Output { index })
            })
            .collect())
    }

    fn input_ports() -> Vec<PortDescriptor> {
        let midi_in = match MidiInput::new(CLIENT_NAME) {
            Ok(midi_in) => midi_in,
            Err(e) => {
                log::debug!("Skipping MIDI inputs: {}", e);
                return Vec::new();
            }
        };

        midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                external_port(name, "External MIDI Input", Some(0), PortRef::Input { index })
            })
            .collect()
    }

    fn connect_output(descriptor: &PortDescriptor, index: usize) -> Result<MidirDevice> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| PlaybackError::device_unavailable(format!("failed to create MIDI output: {}", e)))?;

        // The port set may have changed since enumeration
        let ports = midi_out.ports();
        let names: Vec<Option<String>> = ports.iter().map(|port| midi_out.port_name(port).ok()).collect();
        let port = &ports[recheck_port(&names, descriptor, index)?];

        log::info!("Connecting to MIDI device: {}", descriptor.name);
        let connection = midi_out
            .connect(port, "playsmf-out")
            .map_err(|e| PlaybackError::device_unavailable(e.to_string()))?;

        Ok(MidirDevice {
            descriptor: descriptor.clone(),
            connection: Arc::new(Mutex::new(Some(connection))),
        })
    }
}

impl MidiBackend for SystemBackend {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        let mut ports = vec![SoftwareSynth::descriptor()];
        ports.extend(Self::output_ports()?);
        ports.extend(Self::input_ports());
        Ok(ports)
    }

    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn MidiDevice>> {
        match port.port {
            PortRef::Synthesizer => self.open_default_synthesizer(),
            PortRef::Output { index } => Ok(Box::new(Self::connect_output(port, index)?)),
            PortRef::Input { .. } => Err(PlaybackError::device_unavailable(format!(
                "{} cannot receive messages",
                port.display_name()
            ))),
        }
    }

    fn open_default_synthesizer(&self) -> Result<Box<dyn MidiDevice>> {
        Ok(Box::new(SoftwareSynth::open(&self.synth)?))
    }
}

/// Position of a midir output in [`SystemBackend::enumerate`], where the
/// synthesizer comes first and every output is a receiver
fn listed_index(output_index: usize) -> usize {
    output_index + 1
}

/// `index` if `descriptor` still sits there in a fresh listing of port names.
///
/// A stale port reports the index the user picked it by.
fn recheck_port(names: &[Option<String>], descriptor: &PortDescriptor, index: usize) -> Result<usize> {
    match names.get(index) {
        Some(Some(name)) if *name == descriptor.name => Ok(index),
        _ => Err(PlaybackError::DeviceOutOfRange {
            index: listed_index(index),
        }),
    }
}

fn external_port(name: String, description: &str, max_receivers: Option<usize>, port: PortRef) -> PortDescriptor {
    PortDescriptor {
        name,
        vendor: String::new(),
        version: String::new(),
        description: description.to_string(),
        max_receivers,
        port,
    }
}

/// Connection shared by a device and the receivers created from it
type SharedConnection = Arc<Mutex<Option<MidiOutputConnection>>>;

/// An open midir output port
struct MidirDevice {
    descriptor: PortDescriptor,
    connection: SharedConnection,
}

impl MidiDevice for MidirDevice {
    fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    fn receiver(&mut self) -> Result<Box<dyn MidiReceiver>> {
        if self.connection.lock().is_none() {
            return Err(PlaybackError::device_unavailable("port already closed"));
        }
        Ok(Box::new(MidirReceiver {
            connection: Arc::clone(&self.connection),
            open: true,
            buffer: Vec::with_capacity(16),
        }))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.lock().take() {
            log::info!("Disconnecting from MIDI device: {}", self.descriptor.name);
            drop(connection.close());
        }
        Ok(())
    }
}

struct MidirReceiver {
    connection: SharedConnection,
    open: bool,
    /// Reused encode buffer
    buffer: Vec<u8>,
}

impl MidiReceiver for MidirReceiver {
    fn send(&mut self, event: &MidiEvent) -> Result<()> {
        if !self.open {
            return Err(PlaybackError::send("receiver closed"));
        }

        self.buffer.clear();
        event.write_bytes(&mut self.buffer);

        let mut connection = self.connection.lock();
        let connection = connection
            .as_mut()
            .ok_or_else(|| PlaybackError::send("port closed"))?;
        connection
            .send(&self.buffer)
            .map_err(|e| PlaybackError::send(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
