use std::path::Path;
use std::sync::{Arc, Mutex};

use playsmf::audio::midi::device::{
    MidiBackend, MidiDevice, MidiReceiver, PortDescriptor, PortRef, SoundBankInfo, Synthesizer,
};
use playsmf::audio::midi::MidiEvent;
use playsmf::{PlaybackError, Result};

#[derive(Default)]
struct Log {
    events: Vec<(String, MidiEvent)>,
    sound_banks: Vec<String>,
    devices_closed: Vec<String>,
}

/// Backend whose devices record every message they receive
#[derive(Clone, Default)]
pub(crate) struct RecordingBackend {
    log: Arc<Mutex<Log>>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every event received, in arrival order
    pub(crate) fn events(&self) -> Vec<MidiEvent> {
        self.log
            .lock()
            .expect("log lock")
            .events
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Events received by the device with this name
    pub(crate) fn events_for(&self, device: &str) -> Vec<MidiEvent> {
        self.log
            .lock()
            .expect("log lock")
            .events
            .iter()
            .filter(|(name, _)| name == device)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub(crate) fn sound_banks(&self) -> Vec<String> {
        self.log.lock().expect("log lock").sound_banks.clone()
    }

    pub(crate) fn devices_closed(&self) -> Vec<String> {
        self.log.lock().expect("log lock").devices_closed.clone()
    }

    fn ports() -> Vec<PortDescriptor> {
        let port = |vendor: &str, name: &str, description: &str, max_receivers, port| PortDescriptor {
            name: name.to_string(),
            vendor: vendor.to_string(),
            version: "1.0".to_string(),
            description: description.to_string(),
            max_receivers,
            port,
        };
        vec![
            port("Test", "Synth", "Recording synthesizer", None, PortRef::Synthesizer),
            port("Roland", "SC-88 In", "Hardware input", Some(0), PortRef::Input { index: 0 }),
            port("Roland", "SC-88 Out", "Hardware output", Some(1), PortRef::Output { index: 0 }),
        ]
    }
}

impl MidiBackend for RecordingBackend {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        Ok(Self::ports())
    }

    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn MidiDevice>> {
        if !port.is_receiver() {
            return Err(PlaybackError::device_unavailable("input ports cannot be opened"));
        }
        Ok(Box::new(RecordingDevice {
            descriptor: port.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    fn open_default_synthesizer(&self) -> Result<Box<dyn MidiDevice>> {
        self.open(&Self::ports()[0])
    }
}

struct RecordingDevice {
    descriptor: PortDescriptor,
    log: Arc<Mutex<Log>>,
}

impl MidiDevice for RecordingDevice {
    fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    fn receiver(&mut self) -> Result<Box<dyn MidiReceiver>> {
        Ok(Box::new(RecordingReceiver {
            device: self.descriptor.name.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    fn as_synthesizer(&mut self) -> Option<&mut dyn Synthesizer> {
        match self.descriptor.port {
            PortRef::Synthesizer => Some(self),
            _ => None,
        }
    }

    fn close(&mut self) -> Result<()> {
        self.log
            .lock()
            .expect("log lock")
            .devices_closed
            .push(self.descriptor.name.clone());
        Ok(())
    }
}

impl Synthesizer for RecordingDevice {
    fn load_sound_bank(&mut self, path: &Path) -> Result<SoundBankInfo> {
        let name = path.display().to_string();
        self.log.lock().expect("log lock").sound_banks.push(name.clone());
        Ok(SoundBankInfo {
            name,
            instruments: 1,
        })
    }
}

struct RecordingReceiver {
    device: String,
    log: Arc<Mutex<Log>>,
}

impl MidiReceiver for RecordingReceiver {
    fn send(&mut self, event: &MidiEvent) -> Result<()> {
        self.log
            .lock()
            .expect("log lock")
            .events
            .push((self.device.clone(), event.clone()));
        Ok(())
    }
}
