//! Output channel: one open device plus the receiver feeding it
//!
//! The channel is shared between the thread driving playback and an interrupt
//! handler, so every method takes `&self`. Device and receiver live behind a
//! mutex that is never held while sleeping or while a message is in flight.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::device::{MidiBackend, MidiDevice, PortDescriptor, SharedReceiver, SoundBankInfo};
use super::events::MidiEvent;
use super::player::SequencePlayer;
use super::reset::{ResetProtocol, SysExFrame};
use crate::cancel::CancelToken;
use crate::error::{PlaybackError, Result};

/// Settling time a synthesizer gets after each reset frame
pub const RESET_FRAME_GAP: Duration = Duration::from_millis(50);

/// Number of MIDI channels addressed by [`OutputChannel::silence_all`]
pub const MIDI_CHANNELS: u8 = 16;

struct ChannelState {
    device: Option<Box<dyn MidiDevice>>,
    receiver: Option<SharedReceiver>,
}

pub struct OutputChannel {
    descriptor: PortDescriptor,
    protocol: ResetProtocol,
    state: Mutex<ChannelState>,
    closed: AtomicBool,
}

impl OutputChannel {
    /// Open `port`, or the built-in synthesizer when `port` is `None`
    pub fn open(
        backend: &dyn MidiBackend,
        port: Option<&PortDescriptor>,
        protocol: ResetProtocol,
    ) -> Result<Self> {
        let mut device = match port {
            Some(port) => backend.open(port)?,
            None => backend.open_default_synthesizer()?,
        };

        let receiver = match device.receiver() {
            Ok(receiver) => receiver,
            Err(e) => {
                if let Err(close_err) = device.close() {
                    log::warn!("Failed to close device after receiver error: {}", close_err);
                }
                return Err(e);
            }
        };

        let descriptor = device.descriptor().clone();
        log::info!("Opened MIDI device: {}", descriptor.display_name());

        Ok(Self {
            descriptor,
            protocol,
            state: Mutex::new(ChannelState {
                device: Some(device),
                receiver: Some(Arc::new(Mutex::new(receiver))),
            }),
            closed: AtomicBool::new(false),
        })
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Shared handle to the live receiver, for binding a sequencer
    pub fn receiver(&self) -> Result<SharedReceiver> {
        self.state
            .lock()
            .receiver
            .clone()
            .ok_or_else(|| PlaybackError::send("output channel is closed"))
    }

    /// Install a sound bank if the device is a software synthesizer.
    ///
    /// Returns `Ok(None)` for devices without instrument loading.
    pub fn load_sound_bank(&self, path: &Path) -> Result<Option<SoundBankInfo>> {
        let mut state = self.state.lock();
        let Some(synth) = state.device.as_mut().and_then(|d| d.as_synthesizer()) else {
            log::debug!(
                "{} cannot load sound banks, ignoring {:?}",
                self.descriptor.display_name(),
                path
            );
            return Ok(None);
        };

        let info = synth.load_sound_bank(path)?;
        log::info!("Loaded sound bank \"{}\" ({} instruments)", info.name, info.instruments);
        Ok(Some(info))
    }

    /// Transmit the frames of `protocol` in order, pausing [`RESET_FRAME_GAP`]
    /// after each.
    ///
    /// Returns `Ok(false)` if `cancel` fired before every frame went out.
    pub fn send_reset(&self, protocol: ResetProtocol, cancel: Option<&CancelToken>) -> Result<bool> {
        let receiver = self.receiver()?;
        log::debug!("Sending {} reset", protocol);
        transmit_frames(&receiver, protocol.frames(), cancel)
    }

    /// All Notes Off then All Sound Off on every channel, ascending.
    ///
    /// No-op once the channel is closed. Every message is attempted; the first
    /// failure is returned.
    pub fn silence_all(&self) -> Result<()> {
        let Some(receiver) = self.state.lock().receiver.clone() else {
            return Ok(());
        };

        let mut first_error = None;
        let mut receiver = receiver.lock();
        for channel in 0..MIDI_CHANNELS {
            for event in [MidiEvent::all_notes_off(channel), MidiEvent::all_sound_off(channel)] {
                if let Err(e) = receiver.send(&event) {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Tear down: reset (if the receiver is live), release the receiver, close
    /// `sequencer`, then close the device.
    ///
    /// Idempotent. Every step is attempted; failures are logged.
    pub fn close(&self, sequencer: Option<&SequencePlayer>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let (receiver, device) = {
            let mut state = self.state.lock();
            (state.receiver.take(), state.device.take())
        };

        if let Some(receiver) = receiver {
            if let Err(e) = transmit_frames(&receiver, self.protocol.frames(), None) {
                log::warn!("Failed to send {} reset on close: {}", self.protocol, e);
            }
            if let Err(e) = receiver.lock().close() {
                log::warn!("Failed to close receiver: {}", e);
            }
        }

        if let Some(sequencer) = sequencer {
            sequencer.close();
        }

        if let Some(mut device) = device {
            match device.close() {
                Ok(()) => log::info!("Closed MIDI device: {}", self.descriptor.display_name()),
                Err(e) => log::warn!("Failed to close {}: {}", self.descriptor.display_name(), e),
            }
        }
    }
}

impl Drop for OutputChannel {
    fn drop(&mut self) {
        self.close(None);
    }
}

fn transmit_frames(
    receiver: &SharedReceiver,
    frames: &[SysExFrame],
    cancel: Option<&CancelToken>,
) -> Result<bool> {
    for frame in frames {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(false);
        }
        receiver.lock().send(&MidiEvent::sysex(frame))?;

        let settled = match cancel {
            Some(token) => token.sleep(RESET_FRAME_GAP),
            None => {
                std::thread::sleep(RESET_FRAME_GAP);
                true
            }
        };
        if !settled {
            return Ok(false);
        }
    }
    Ok(true)
}
