//! MIDI message types and the queue used to hand them to the audio thread
//!
//! Uses a lock-free ring buffer for passing events to the built-in synthesizer.
//! Producer side has a Mutex for multi-producer access (sequencer, resets, shutdown).
//! Consumer side uses try_lock to avoid blocking the audio thread.

use midly::num::u4;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

/// Controller number for "All Sound Off"
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// Controller number for "All Notes Off"
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A MIDI message as sent to a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note on event
    NoteOn {
        /// MIDI note number (0-127)
        note: u8,
        /// Velocity (0-127)
        velocity: u8,
        /// MIDI channel (0-15)
        channel: u8,
    },
    /// Note off event
    NoteOff {
        /// MIDI note number (0-127)
        note: u8,
        /// Velocity (0-127, often ignored)
        velocity: u8,
        /// MIDI channel (0-15)
        channel: u8,
    },
    /// Polyphonic key pressure
    PolyPressure { note: u8, pressure: u8, channel: u8 },
    /// Control change (CC) event
    ControlChange {
        /// Controller number (0-127)
        controller: u8,
        /// Controller value (0-127)
        value: u8,
        /// MIDI channel (0-15)
        channel: u8,
    },
    ProgramChange { program: u8, channel: u8 },
    ChannelPressure { pressure: u8, channel: u8 },
    /// Pitch bend event
    PitchBend {
        /// 14-bit pitch bend value (0-16383, center at 8192)
        value: u16,
        /// MIDI channel (0-15)
        channel: u8,
    },
    /// Complete system exclusive frame, 0xF0 through 0xF7
    SysEx(Vec<u8>),
    /// Raw bytes from an SMF escape event, sent untouched
    Raw(Vec<u8>),
}

impl MidiEvent {
    /// Create a control change event
    #[inline]
    pub fn control_change(controller: u8, value: u8, channel: u8) -> Self {
        Self::ControlChange {
            controller,
            value,
            channel,
        }
    }

    #[inline]
    pub fn all_notes_off(channel: u8) -> Self {
        Self::control_change(CC_ALL_NOTES_OFF, 0, channel)
    }

    #[inline]
    pub fn all_sound_off(channel: u8) -> Self {
        Self::control_change(CC_ALL_SOUND_OFF, 0, channel)
    }

    /// Wrap a SysEx frame. The frame must already carry its 0xF0/0xF7 delimiters.
    pub fn sysex(frame: &[u8]) -> Self {
        Self::SysEx(frame.to_vec())
    }

    /// Convert a channel message decoded by midly
    pub fn from_midly(channel: u4, message: midly::MidiMessage) -> Self {
        use midly::MidiMessage as M;

        let channel = channel.as_int();
        match message {
            M::NoteOff { key, vel } => Self::NoteOff {
                note: key.as_int(),
                velocity: vel.as_int(),
                channel,
            },
            M::NoteOn { key, vel } => Self::NoteOn {
                note: key.as_int(),
                velocity: vel.as_int(),
                channel,
            },
            M::Aftertouch { key, vel } => Self::PolyPressure {
                note: key.as_int(),
                pressure: vel.as_int(),
                channel,
            },
            M::Controller { controller, value } => {
                Self::control_change(controller.as_int(), value.as_int(), channel)
            }
            M::ProgramChange { program } => Self::ProgramChange {
                program: program.as_int(),
                channel,
            },
            M::ChannelAftertouch { vel } => Self::ChannelPressure {
                pressure: vel.as_int(),
                channel,
            },
            M::PitchBend { bend } => Self::PitchBend {
                value: bend.0.as_int(),
                channel,
            },
        }
    }


    /// Wire encoding of the message
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3);
        self.write_bytes(&mut bytes);
        bytes
    }

    /// Append the wire encoding of the message to `out`
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        let status = |kind: u8, channel: u8| kind | (channel & 0x0F);
        match self {
            Self::NoteOff { note, velocity, channel } => {
                out.extend_from_slice(&[status(0x80, *channel), note & 0x7F, velocity & 0x7F])
            }
            Self::NoteOn { note, velocity, channel } => {
                out.extend_from_slice(&[status(0x90, *channel), note & 0x7F, velocity & 0x7F])
            }
            Self::PolyPressure { note, pressure, channel } => {
                out.extend_from_slice(&[status(0xA0, *channel), note & 0x7F, pressure & 0x7F])
            }
            Self::ControlChange { controller, value, channel } => {
                out.extend_from_slice(&[status(0xB0, *channel), controller & 0x7F, value & 0x7F])
            }
            Self::ProgramChange { program, channel } => {
                out.extend_from_slice(&[status(0xC0, *channel), program & 0x7F])
            }
            Self::ChannelPressure { pressure, channel } => {
                out.extend_from_slice(&[status(0xD0, *channel), pressure & 0x7F])
            }
            Self::PitchBend { value, channel } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                out.extend_from_slice(&[status(0xE0, *channel), lsb, msb]);
            }
            Self::SysEx(frame) | Self::Raw(frame) => out.extend_from_slice(frame),
        }
    }
}

/// Thread-safe MIDI event queue using lock-free ring buffer
///
/// Producer side pushes events (from the sequencer thread and the session)
/// Consumer side is read by the audio thread using try_lock to avoid blocking
pub struct MidiEventQueue {
    /// Producer side - Mutex for multi-producer access
    producer: Mutex<ringbuf::HeapProd<MidiEvent>>,
    /// Consumer side - Mutex but always use try_lock from audio thread
    consumer: Mutex<ringbuf::HeapCons<MidiEvent>>,
    /// Capacity for logging overflow warnings
    capacity: usize,
}

impl MidiEventQueue {
    /// Create a new MIDI event queue
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::new(capacity);
        let (producer, consumer) = rb.split();
        Self {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            capacity,
        }
    }

    /// Push an event to the queue
    /// Returns true if successful, false if queue is full
    ///
    /// Waits for the producer lock; only a full buffer drops the event.
    pub fn push(&self, event: MidiEvent) -> bool {
        if self.producer.lock().try_push(event).is_ok() {
            return true;
        }
        log::debug!("MIDI queue full (capacity: {}), event dropped", self.capacity);
        false
    }

    /// Drain all events into a pre-allocated buffer (called from audio thread)
    ///
    /// Uses try_lock to never block the audio thread - if lock is held,
    /// returns 0 events (they'll be picked up next callback).
    ///
    /// Returns the number of events drained.
    #[inline]
    pub fn drain_into(&self, buffer: &mut Vec<MidiEvent>) -> usize {
        buffer.clear();

        if let Some(mut consumer) = self.consumer.try_lock() {
            while let Some(event) = consumer.try_pop() {
                buffer.push(event);
            }
        }

        buffer.len()
    }
}
