//! Built-in software synthesizer
//!
//! Renders MIDI through rustysynth into a cpal output stream. The stream is
//! not `Send`, so it lives on a dedicated audio thread for the lifetime of the
//! device; messages reach the render callback through a [`MidiEventQueue`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use rustysynth::{SoundFont, Synthesizer as Engine, SynthesizerSettings};

use super::device::{get_output_device, get_supported_config};
use super::midi::device::{
    MidiDevice, MidiReceiver, PortDescriptor, PortRef, SoundBankInfo, Synthesizer,
};
use super::midi::events::{MidiEvent, MidiEventQueue};
use super::midi::reset::is_gm_system_on;
use crate::config::SynthConfig;
use crate::error::{PlaybackError, Result};

/// Shared state between the device handle and the audio thread
struct SynthShared {
    queue: MidiEventQueue,
    /// `None` until a sound bank is loaded; the callback outputs silence meanwhile
    engine: Mutex<Option<Engine>>,
    sample_rate: AtomicU32,
}

/// The built-in synthesizer as a MIDI device
pub struct SoftwareSynth {
    descriptor: PortDescriptor,
    shared: Arc<SynthShared>,
    /// Dropping the sender ends the audio thread
    shutdown: Option<mpsc::Sender<()>>,
    audio_thread: Option<thread::JoinHandle<()>>,
}

impl SoftwareSynth {
    /// How the synthesizer appears in device listings
    pub fn descriptor() -> PortDescriptor {
        PortDescriptor {
            name: "Software Synthesizer".to_string(),
            vendor: "playsmf".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "SoundFont synthesizer on the default audio output".to_string(),
            max_receivers: None,
            port: PortRef::Synthesizer,
        }
    }

    /// Start the audio stream and load the configured default sound bank
    pub fn open(config: &SynthConfig) -> Result<Self> {
        let shared = Arc::new(SynthShared {
            queue: MidiEventQueue::new(config.queue_capacity),
            engine: Mutex::new(None),
            sample_rate: AtomicU32::new(config.sample_rate),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_shared = Arc::clone(&shared);
        let thread_config = config.clone();
        let audio_thread = thread::Builder::new()
            .name("playsmf-audio".into())
            .spawn(move || run_audio_thread(thread_shared, thread_config, ready_tx, shutdown_rx))
            .map_err(|e| PlaybackError::device_unavailable(format!("failed to spawn audio thread: {}", e)))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = audio_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = audio_thread.join();
                return Err(PlaybackError::device_unavailable("audio thread exited during startup"));
            }
        };
        shared.sample_rate.store(sample_rate, Ordering::SeqCst);
        log::info!("Software synthesizer running at {} Hz", sample_rate);

        let mut synth = Self {
            descriptor: Self::descriptor(),
            shared,
            shutdown: Some(shutdown_tx),
            audio_thread: Some(audio_thread),
        };

        match &config.default_sound_bank {
            Some(path) => {
                if let Err(e) = synth.load_sound_bank(path) {
                    log::warn!("Default sound bank unavailable: {}", e);
                }
            }
            None => log::warn!(
                "No sound bank configured; the synthesizer stays silent until one is loaded (set {} or use -s)",
                crate::config::SOUNDFONT_ENV
            ),
        }

        Ok(synth)
    }
}

impl Synthesizer for SoftwareSynth {
    fn load_sound_bank(&mut self, path: &Path) -> Result<SoundBankInfo> {
        let bank_error = |message: String| PlaybackError::SoundBank {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| bank_error(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let sound_font = SoundFont::new(&mut reader).map_err(|e| bank_error(format!("{:?}", e)))?;
        let sound_font = Arc::new(sound_font);

        let sample_rate = self.shared.sample_rate.load(Ordering::SeqCst);
        let settings = SynthesizerSettings::new(sample_rate as i32);
        let engine = Engine::new(&sound_font, &settings).map_err(|e| bank_error(format!("{:?}", e)))?;

        let info = SoundBankInfo {
            name: sound_font.get_info().get_bank_name().trim().to_string(),
            instruments: sound_font.get_presets().len(),
        };
        *self.shared.engine.lock() = Some(engine);
        Ok(info)
    }
}

impl MidiDevice for SoftwareSynth {
    fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    fn receiver(&mut self) -> Result<Box<dyn MidiReceiver>> {
        Ok(Box::new(SynthReceiver {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn as_synthesizer(&mut self) -> Option<&mut dyn Synthesizer> {
        Some(self)
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the sender wakes the audio thread, which drops the stream
        self.shutdown.take();
        if let Some(handle) = self.audio_thread.take() {
            handle
                .join()
                .map_err(|_| PlaybackError::device_unavailable("audio thread panicked"))?;
            log::debug!("Software synthesizer stopped");
        }
        self.shared.engine.lock().take();
        Ok(())
    }
}

impl Drop for SoftwareSynth {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Software synthesizer shutdown failed: {}", e);
        }
    }
}

struct SynthReceiver {
    shared: Arc<SynthShared>,
}

impl MidiReceiver for SynthReceiver {
    fn send(&mut self, event: &MidiEvent) -> Result<()> {
        if self.shared.queue.push(event.clone()) {
            Ok(())
        } else {
            Err(PlaybackError::send("synthesizer queue full"))
        }
    }
}

/// Owns the cpal stream until shutdown is signalled
fn run_audio_thread(
    shared: Arc<SynthShared>,
    config: SynthConfig,
    ready: mpsc::SyncSender<Result<u32>>,
    shutdown: mpsc::Receiver<()>,
) {
    let stream = match build_stream(Arc::clone(&shared), &config) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Blocks until the sender is dropped
    let _ = shutdown.recv();
    if let Err(e) = stream.pause() {
        log::debug!("Failed to pause audio stream: {}", e);
    }
    drop(stream);
}

fn build_stream(shared: Arc<SynthShared>, config: &SynthConfig) -> Result<(cpal::Stream, u32)> {
    let device = get_output_device(config.audio_device.as_deref())?;
    let stream_config = get_supported_config(&device, config)?;
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels as usize;

    // Pre-allocated render buffers, grown only if the host asks for more frames
    let mut pending: Vec<MidiEvent> = Vec::with_capacity(config.queue_capacity);
    let mut left: Vec<f32> = vec![0.0; 4096];
    let mut right: Vec<f32> = vec![0.0; 4096];

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);

                // Never block the audio thread; events wait for the next callback
                let Some(mut engine) = shared.engine.try_lock() else {
                    data.fill(0.0);
                    return;
                };

                shared.queue.drain_into(&mut pending);
                let Some(engine) = engine.as_mut() else {
                    data.fill(0.0);
                    return;
                };
                for event in &pending {
                    apply_event(engine, event);
                }

                if left.len() < frames {
                    left.resize(frames, 0.0);
                    right.resize(frames, 0.0);
                }
                engine.render(&mut left[..frames], &mut right[..frames]);
                interleave(data, channels, &left[..frames], &right[..frames]);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout
        )
        .map_err(|e| PlaybackError::device_unavailable(format!("failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| PlaybackError::device_unavailable(format!("failed to start stream: {}", e)))?;

    Ok((stream, sample_rate))
}

/// Write rendered stereo into an interleaved buffer of `channels` per frame.
///
/// Mono gets the average; channels past the second are silent.
fn interleave(data: &mut [f32], channels: usize, left: &[f32], right: &[f32]) {
    if channels == 0 {
        return;
    }
    for ((frame, l), r) in data.chunks_mut(channels).zip(left).zip(right) {
        if channels == 1 {
            frame[0] = (l + r) * 0.5;
        } else {
            frame[0] = *l;
            frame[1] = *r;
            for extra in &mut frame[2..] {
                *extra = 0.0;
            }
        }
    }
}

/// Feed one message to the synthesis engine
fn apply_event(engine: &mut Engine, event: &MidiEvent) {
    match event {
        MidiEvent::SysEx(frame) => {
            // GM System On is the only SysEx the engine understands
            if is_gm_system_on(frame) {
                engine.reset();
            }
        }
        MidiEvent::Raw(_) => {}
        channel_message => {
            let bytes = channel_message.to_bytes();
            let status = bytes[0];
            let data1 = bytes.get(1).copied().unwrap_or(0);
            let data2 = bytes.get(2).copied().unwrap_or(0);
            engine.process_midi_message(
                i32::from(status & 0x0F),
                i32::from(status & 0xF0),
                i32::from(data1),
                i32::from(data2),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_maps_stereo_onto_the_device_layout() {
        let left = [0.5, 1.0];
        let right = [0.25, -1.0];

        let mut mono = [9.0; 2];
        interleave(&mut mono, 1, &left, &right);
        assert_eq!(mono, [0.375, 0.0]);

        let mut stereo = [9.0; 4];
        interleave(&mut stereo, 2, &left, &right);
        assert_eq!(stereo, [0.5, 0.25, 1.0, -1.0]);

        let mut quad = [9.0; 8];
        interleave(&mut quad, 4, &left, &right);
        assert_eq!(quad, [0.5, 0.25, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn interleave_ignores_a_zero_channel_layout() {
        let mut data = [9.0; 4];
        interleave(&mut data, 0, &[0.5; 4], &[0.5; 4]);
        assert_eq!(data, [9.0; 4]);
    }
}
