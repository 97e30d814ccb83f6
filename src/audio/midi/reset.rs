//! Synthesizer reset handshakes
//!
//! Each protocol maps to an ordered list of SysEx frames. Vendor modes that
//! build on General MIDI send the GM System On frame first so the device is in
//! a known state before it sees the vendor extension.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};

/// A single SysEx frame, 0xF0 through 0xF7 inclusive
pub type SysExFrame = &'static [u8];

const GM_SYSTEM_ON: SysExFrame = &[0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];
const GS_RESET: SysExFrame = &[0xF0, 0x41, 0x20, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7];
const XG_SYSTEM_ON: SysExFrame = &[0xF0, 0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];
const MU_BASIC_MAP: SysExFrame = &[0xF0, 0x43, 0x10, 0x49, 0x00, 0x00, 0x12, 0x00, 0xF7];
const MU_NATIVE_MAP: SysExFrame = &[0xF0, 0x43, 0x10, 0x49, 0x00, 0x00, 0x12, 0x01, 0xF7];
const DISK_ORCHESTRA: SysExFrame = &[0xF0, 0x43, 0x73, 0x01, 0x14, 0xF7];
const MT32_RESET_ALL: SysExFrame = &[0xF0, 0x41, 0x10, 0x16, 0x11, 0x7F, 0x00, 0x00, 0x01, 0x00, 0xF7];
const FB01_STORE_CONFIG: SysExFrame = &[0xF0, 0x43, 0x75, 0x00, 0x20, 0x40, 0x11, 0xF7];
// System mode set, mode-1
const SC88_MODE_1: SysExFrame = &[0xF0, 0x41, 0x10, 0x42, 0x12, 0x00, 0x00, 0x7F, 0x00, 0x01, 0xF7];

static RESET_GM: [SysExFrame; 1] = [GM_SYSTEM_ON];
static RESET_GS: [SysExFrame; 2] = [GM_SYSTEM_ON, GS_RESET];
static RESET_XG: [SysExFrame; 3] = [GM_SYSTEM_ON, XG_SYSTEM_ON, MU_BASIC_MAP];
static RESET_MU100: [SysExFrame; 3] = [GM_SYSTEM_ON, XG_SYSTEM_ON, MU_NATIVE_MAP];
static RESET_DOC: [SysExFrame; 2] = [GM_SYSTEM_ON, DISK_ORCHESTRA];
static RESET_MT32: [SysExFrame; 1] = [MT32_RESET_ALL];
static RESET_FB01: [SysExFrame; 1] = [FB01_STORE_CONFIG];
static RESET_SC88: [SysExFrame; 2] = [GM_SYSTEM_ON, SC88_MODE_1];

/// Synthesizer reset protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetProtocol {
    /// General MIDI System On
    #[default]
    Gm,
    /// Roland GS
    Gs,
    /// Yamaha XG with the MU basic voice map
    Xg,
    /// Yamaha XG with the MU100 native voice map
    Mu100,
    /// Yamaha Disk Orchestra
    Doc,
    /// Roland MT-32 "reset all"
    Mt32,
    /// Yamaha FB-01 store configuration
    Fb01,
    /// Roland SC-88 single module mode
    Sc88,
}

impl ResetProtocol {
    pub const ALL: [ResetProtocol; 8] = [
        Self::Gm,
        Self::Gs,
        Self::Xg,
        Self::Mu100,
        Self::Doc,
        Self::Mt32,
        Self::Fb01,
        Self::Sc88,
    ];

    /// Name accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::Gm => "gm",
            Self::Gs => "gs",
            Self::Xg => "xg",
            Self::Mu100 => "mu100",
            Self::Doc => "doc",
            Self::Mt32 => "mt32",
            Self::Fb01 => "fb01",
            Self::Sc88 => "sc88",
        }
    }

    /// Frames to transmit, in order
    pub fn frames(self) -> &'static [SysExFrame] {
        match self {
            Self::Gm => &RESET_GM,
            Self::Gs => &RESET_GS,
            Self::Xg => &RESET_XG,
            Self::Mu100 => &RESET_MU100,
            Self::Doc => &RESET_DOC,
            Self::Mt32 => &RESET_MT32,
            Self::Fb01 => &RESET_FB01,
            Self::Sc88 => &RESET_SC88,
        }
    }

    /// Case-insensitive lookup by name. No fallback: unknown names are an error.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|protocol| protocol.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| PlaybackError::UnknownProtocol {
                name: name.to_string(),
            })
    }
}

impl FromStr for ResetProtocol {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for ResetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a protocol name straight to its frame list
pub fn resolve(name: &str) -> Result<&'static [SysExFrame]> {
    ResetProtocol::from_name(name).map(ResetProtocol::frames)
}

/// True for the GM System On frame, which software synthesizers treat as a full reset
pub fn is_gm_system_on(frame: &[u8]) -> bool {
    frame == GM_SYSTEM_ON
}
