//! Low-level wire types and constants.
//!
//! This module defines:
//! - the one-byte type tags carried at the start of every frame
//! - the two frame layouts a deployment can speak
//! - frame sizes, which are implied by the tag (there is no length field)
//!
//! The actual encode/decode logic lives in `binary_codec`.

use std::fmt;
use std::str::FromStr;

/// Frame type tags.
///
/// The same tag is used in both directions; the request and the response
/// for a tag differ only in payload.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireType {
    /// Donate to a charity. The response echoes the request.
    Donate = 0x00,

    /// Charity info lookup.
    Cinfo = 0x01,

    /// Top session totals.
    Top = 0x02,

    /// End the session.
    Logout = 0x03,

    /// Highest and lowest charity totals.
    Stats = 0x04,

    /// Server rejected the last frame.
    Error = 0xFF,
}

impl WireType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(WireType::Donate),
            0x01 => Some(WireType::Cinfo),
            0x02 => Some(WireType::Top),
            0x03 => Some(WireType::Logout),
            0x04 => Some(WireType::Stats),
            0xFF => Some(WireType::Error),
            _ => None,
        }
    }

    /// Name used in the event log.
    pub fn as_str(self) -> &'static str {
        match self {
            WireType::Donate => "DONATE",
            WireType::Cinfo => "CINFO",
            WireType::Top => "TOP",
            WireType::Logout => "LOGOUT",
            WireType::Stats => "STATS",
            WireType::Error => "ERROR",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How frames are laid out on the wire.
///
/// ```text
/// Compact (big-endian, packed)
/// ----------------------------
/// [0]   : tag
/// [1..] : payload fields back to back
///
/// Legacy (little-endian, 32 bytes, C struct layout)
/// -------------------------------------------------
/// [0]      : tag
/// [1..8]   : padding
/// [8..32]  : payload, each field at its natural alignment, zero filled
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FrameLayout {
    #[default]
    Compact,
    Legacy,
}

impl FrameLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameLayout::Compact => "compact",
            FrameLayout::Legacy => "legacy",
        }
    }
}

impl fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(FrameLayout::Compact),
            "legacy" => Ok(FrameLayout::Legacy),
            other => Err(format!("unknown frame layout: {other}")),
        }
    }
}

/// Every legacy frame is this long.
pub const LEGACY_FRAME_LEN: usize = 32;

/// Offset of the first payload byte in a legacy frame.
pub const LEGACY_PAYLOAD_OFFSET: usize = 8;

// Compact payload sizes (bytes after the tag).
const DONATE_BODY: usize = 1 + 8;
const CINFO_REQUEST_BODY: usize = 1;
const CINFO_RESPONSE_BODY: usize = 8 + 8 + 4;
const TOP_RESPONSE_BODY: usize = 3 * 8;
const STATS_RESPONSE_BODY: usize = 1 + 1 + 8 + 8;

/// Total size of a client → server frame starting with `tag`.
///
/// Unknown tags are a bare tag byte in the compact layout, so the stream
/// stays in step after the server rejects them.
pub fn request_frame_len(layout: FrameLayout, tag: u8) -> usize {
    match layout {
        FrameLayout::Legacy => LEGACY_FRAME_LEN,
        FrameLayout::Compact => {
            let body = match WireType::from_u8(tag) {
                Some(WireType::Donate) => DONATE_BODY,
                Some(WireType::Cinfo) => CINFO_REQUEST_BODY,
                _ => 0,
            };
            1 + body
        }
    }
}

/// Total size of a server → client frame starting with `tag`.
///
/// `None` for a tag the server never sends.
pub fn response_frame_len(layout: FrameLayout, tag: u8) -> Option<usize> {
    let ty = WireType::from_u8(tag)?;
    let len = match layout {
        FrameLayout::Legacy => LEGACY_FRAME_LEN,
        FrameLayout::Compact => {
            1 + match ty {
                WireType::Donate => DONATE_BODY,
                WireType::Cinfo => CINFO_RESPONSE_BODY,
                WireType::Top => TOP_RESPONSE_BODY,
                WireType::Stats => STATS_RESPONSE_BODY,
                WireType::Logout | WireType::Error => 0,
            }
        }
    };
    Some(len)
}
