//! MIDI file parsing
//!
//! Loads standard MIDI files (.mid) and flattens all tracks into one
//! time-ordered event list with absolute timestamps, ready for the sequencer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};

use super::events::MidiEvent;
use crate::error::{PlaybackError, Result};

/// SMF default tempo: 500000 microseconds per beat = 120 BPM
const DEFAULT_TEMPO_US: u32 = 500_000;

/// A message scheduled at an offset from the start of the sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: MidiEvent,
}

/// A decoded MIDI file
#[derive(Debug, Clone)]
pub struct Sequence {
    /// File the sequence was loaded from
    pub path: Option<PathBuf>,
    /// Title from the first track's name meta event (if present)
    pub title: Option<String>,
    /// SMF format (0 = single track, 1 = parallel, 2 = sequential)
    pub format: u8,
    pub track_count: usize,
    /// Initial BPM (tempo at tick 0)
    pub bpm: f32,
    /// All transmittable events, sorted by time
    pub events: Vec<TimedEvent>,
    /// Time of the last event, including end-of-track markers
    pub duration: Duration,
}

impl Sequence {
    /// Decode SMF bytes
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, midly::Error> {
        let smf = Smf::parse(bytes)?;
        Ok(flatten(&smf))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Read and decode a MIDI file
pub fn load_sequence(path: &Path) -> Result<Sequence> {
    let data = std::fs::read(path).map_err(|source| PlaybackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut sequence =
        Sequence::from_bytes(&data).map_err(|e| PlaybackError::InvalidSequenceData {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    sequence.path = Some(path.to_path_buf());

    log::debug!(
        "Loaded {:?}: format {}, {} tracks, {} events, {:.1}s",
        path,
        sequence.format,
        sequence.track_count,
        sequence.events.len(),
        sequence.duration.as_secs_f64()
    );
    Ok(sequence)
}

enum Entry {
    Tempo(u32),
    Event(MidiEvent),
    Marker,
}

fn flatten(smf: &Smf<'_>) -> Sequence {
    let format = match smf.header.format {
        Format::SingleTrack => 0,
        Format::Parallel => 1,
        Format::Sequential => 2,
    };

    // Collect every event with its absolute tick. Sequential files play
    // their tracks one after another.
    let mut entries: Vec<(u64, Entry)> = Vec::new();
    let mut title = None;
    let mut track_offset: u64 = 0;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut current_tick = track_offset;
        for event in track {
            current_tick += u64::from(event.delta.as_int());
            let entry = match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    Entry::Event(MidiEvent::from_midly(channel, message))
                }
                TrackEventKind::SysEx(data) => {
                    let mut frame = Vec::with_capacity(data.len() + 1);
                    frame.push(0xF0);
                    frame.extend_from_slice(data);
                    Entry::Event(MidiEvent::SysEx(frame))
                }
                TrackEventKind::Escape(data) => Entry::Event(MidiEvent::Raw(data.to_vec())),
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Entry::Tempo(tempo.as_int()),
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    if track_idx == 0 && title.is_none() {
                        title = std::str::from_utf8(name).ok().map(|s| s.trim().to_string());
                    }
                    Entry::Marker
                }
                TrackEventKind::Meta(_) => Entry::Marker,
            };
            entries.push((current_tick, entry));
        }
        if smf.header.format == Format::Sequential {
            track_offset = current_tick;
        }
    }

    // Stable: events at the same tick keep track order
    entries.sort_by_key(|(tick, _)| *tick);

    let mut tempo_us = DEFAULT_TEMPO_US;
    let mut us_per_tick = tick_length_us(smf.header.timing, tempo_us);
    let mut bpm = None;
    let mut elapsed_us = 0.0f64;
    let mut last_tick = 0u64;
    let mut events = Vec::with_capacity(entries.len());

    for (tick, entry) in entries {
        elapsed_us += (tick - last_tick) as f64 * us_per_tick;
        last_tick = tick;

        match entry {
            Entry::Tempo(tempo) => {
                if tick == 0 && bpm.is_none() {
                    bpm = Some(60_000_000.0 / tempo as f32);
                }
                tempo_us = tempo;
                us_per_tick = tick_length_us(smf.header.timing, tempo_us);
            }
            Entry::Event(event) => events.push(TimedEvent {
                at: Duration::from_micros(elapsed_us.round() as u64),
                event,
            }),
            Entry::Marker => {}
        }
    }

    Sequence {
        path: None,
        title: title.filter(|t| !t.is_empty()),
        format,
        track_count: smf.tracks.len(),
        bpm: bpm.unwrap_or(120.0),
        events,
        duration: Duration::from_micros(elapsed_us.round() as u64),
    }
}

/// Length of one tick in microseconds
fn tick_length_us(timing: Timing, tempo_us: u32) -> f64 {
    match timing {
        Timing::Metrical(tpb) => tempo_us as f64 / f64::from(tpb.as_int().max(1)),
        // SMPTE timing is absolute and ignores tempo changes
        Timing::Timecode(fps, subframes) => {
            let ticks_per_second = fps.as_f32() as f64 * f64::from(subframes.max(1));
            1_000_000.0 / ticks_per_second
        }
    }
}
