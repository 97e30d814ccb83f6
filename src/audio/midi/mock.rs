//! In-memory backend that records everything sent to it

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::device::{
    MidiBackend, MidiDevice, MidiReceiver, PortDescriptor, PortRef, SoundBankInfo, Synthesizer,
};
use super::events::MidiEvent;
use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub at: Instant,
    pub event: MidiEvent,
}

#[derive(Default)]
struct JournalInner {
    sent: Vec<Recorded>,
    devices_opened: usize,
    devices_closed: usize,
    receivers_closed: usize,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<JournalInner>>);

impl Journal {
    pub fn recorded(&self) -> Vec<Recorded> {
        self.0.lock().sent.clone()
    }

    pub fn events(&self) -> Vec<MidiEvent> {
        self.0.lock().sent.iter().map(|r| r.event.clone()).collect()
    }

    pub fn devices_opened(&self) -> usize {
        self.0.lock().devices_opened
    }

    pub fn devices_closed(&self) -> usize {
        self.0.lock().devices_closed
    }

    pub fn receivers_closed(&self) -> usize {
        self.0.lock().receivers_closed
    }
}

pub struct MockBackend {
    ports: Vec<PortDescriptor>,
    journal: Journal,
    busy: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        let port = |name: &str, max_receivers, port| PortDescriptor {
            name: name.to_string(),
            vendor: "Mock".to_string(),
            version: "1.0".to_string(),
            description: format!("{name} for tests"),
            max_receivers,
            port,
        };
        Self {
            ports: vec![
                port("Synth", None, PortRef::Synthesizer),
                port("Out", Some(1), PortRef::Output { index: 0 }),
                port("In", Some(0), PortRef::Input { index: 0 }),
            ],
            journal: Journal::default(),
            busy: false,
        }
    }

    /// Every open attempt fails as if another application held the device
    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn external_port(&self) -> PortDescriptor {
        self.ports[1].clone()
    }

    fn open_port(&self, descriptor: PortDescriptor) -> Result<Box<dyn MidiDevice>> {
        if self.busy {
            return Err(PlaybackError::device_unavailable("held by another test"));
        }
        self.journal.0.lock().devices_opened += 1;
        Ok(Box::new(MockDevice {
            synth: descriptor.port == PortRef::Synthesizer,
            descriptor,
            journal: self.journal.clone(),
        }))
    }
}

impl MidiBackend for MockBackend {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self.ports.clone())
    }

    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn MidiDevice>> {
        self.open_port(port.clone())
    }

    fn open_default_synthesizer(&self) -> Result<Box<dyn MidiDevice>> {
        self.open_port(self.ports[0].clone())
    }
}

struct MockDevice {
    descriptor: PortDescriptor,
    journal: Journal,
    synth: bool,
}

impl MidiDevice for MockDevice {
    fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    fn receiver(&mut self) -> Result<Box<dyn MidiReceiver>> {
        Ok(Box::new(MockReceiver {
            journal: self.journal.clone(),
            open: true,
        }))
    }

    fn as_synthesizer(&mut self) -> Option<&mut dyn Synthesizer> {
        if self.synth {
            Some(self)
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        self.journal.0.lock().devices_closed += 1;
        Ok(())
    }
}

impl Synthesizer for MockDevice {
    fn load_sound_bank(&mut self, path: &Path) -> Result<SoundBankInfo> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with("slow") {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        if name.starts_with("missing") {
            return Err(PlaybackError::SoundBank {
                path: path.to_path_buf(),
                message: "no such file".to_string(),
            });
        }
        Ok(SoundBankInfo {
            name,
            instruments: 128,
        })
    }
}

struct MockReceiver {
    journal: Journal,
    open: bool,
}

impl MidiReceiver for MockReceiver {
    fn send(&mut self, event: &MidiEvent) -> Result<()> {
        if !self.open {
            return Err(PlaybackError::send("receiver closed"));
        }
        self.journal.0.lock().sent.push(Recorded {
            at: Instant::now(),
            event: event.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.journal.0.lock().receivers_closed += 1;
        Ok(())
    }
}
