//! MIDI output and the built-in synthesizer
//!
//! - `midi`: devices, reset handshakes, sequencing and file decoding
//! - `synth`: rustysynth rendering through a cpal output stream

pub mod device;
pub mod midi;
pub mod synth;
