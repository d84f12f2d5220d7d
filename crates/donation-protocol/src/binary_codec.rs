//! Binary encoding/decoding for donation frames.
//!
//! This module converts between:
//! - raw binary frames (`&[u8]`)
//! - high-level [`Request`] / [`Response`] values
//!
//! Field order per tag (offsets for the compact layout; the legacy layout
//! puts the same fields at their C struct offsets, shown in brackets):
//!
//! ```text
//! Requests (client → server)
//! --------------------------
//! DONATE (0x00):  [1]  charity u8      [8]
//!                 [2]  amount  u64     [16]
//! CINFO  (0x01):  [1]  charity u8      [8]
//! TOP    (0x02):  no body
//! LOGOUT (0x03):  no body
//! STATS  (0x04):  no body
//!
//! Responses (server → client)
//! ---------------------------
//! DONATE (0x00):  echo of the request
//! CINFO  (0x01):  [1]  totalDonationAmt u64   [8]
//!                 [9]  topDonation      u64   [16]
//!                 [17] numDonations     u32   [24]
//! TOP    (0x02):  [1]  3 x u64                [8, 16, 24]
//! LOGOUT (0x03):  no body
//! STATS  (0x04):  [1]  maxCharityId u8        [8]
//!                 [2]  minCharityId u8        [9]
//!                 [3]  maxAmount    u64       [16]
//!                 [11] minAmount    u64       [24]
//! ERROR  (0xFF):  no body
//! ```
//!
//! NOTE: This module encodes/decodes **one frame per buffer**. It never
//! interprets a short buffer: anything shorter than the size implied by
//! the tag is [`ProtocolError::Truncated`].

use std::fmt;

use bytes::{Buf, BufMut};
use donation_core::{CharityRecord, TOP_K};

use crate::frames::{Request, Response, StatsReply};
use crate::wire_types::{
    request_frame_len, response_frame_len, FrameLayout, WireType, LEGACY_FRAME_LEN,
    LEGACY_PAYLOAD_OFFSET,
};

/// Errors that can arise when decoding a binary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too short for the frame its tag announces.
    Truncated,
    /// Tag is not valid in this direction.
    UnknownTag(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated => write!(f, "Frame truncated"),
            ProtocolError::UnknownTag(t) => write!(f, "Unknown frame tag: {:#04x}", t),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ============================================================================
// INPUT: client → server
// ============================================================================

/// Decode a single request frame.
///
/// The buffer must hold at least the whole frame announced by its tag.
pub fn decode_request(buf: &[u8], layout: FrameLayout) -> Result<Request, ProtocolError> {
    let tag = *buf.first().ok_or(ProtocolError::Truncated)?;
    let mut fields = FieldReader::new(buf, layout, request_frame_len(layout, tag))?;

    match WireType::from_u8(tag) {
        Some(WireType::Donate) => {
            let charity = fields.u8()?;
            let amount = fields.u64()?;
            Ok(Request::Donate { charity, amount })
        }
        Some(WireType::Cinfo) => Ok(Request::Cinfo {
            charity: fields.u8()?,
        }),
        Some(WireType::Top) => Ok(Request::Top),
        Some(WireType::Logout) => Ok(Request::Logout),
        Some(WireType::Stats) => Ok(Request::Stats),
        Some(WireType::Error) | None => Err(ProtocolError::UnknownTag(tag)),
    }
}

/// Encode a single request frame. The bytes are appended to `out`.
pub fn encode_request(msg: &Request, layout: FrameLayout, out: &mut Vec<u8>) {
    let mut fields = FieldWriter::begin(out, layout, msg.wire_type());

    match *msg {
        Request::Donate { charity, amount } => {
            fields.u8(charity);
            fields.u64(amount);
        }
        Request::Cinfo { charity } => fields.u8(charity),
        Request::Top | Request::Logout | Request::Stats => {}
    }

    fields.finish();
}

// ============================================================================
// OUTPUT: server → client
// ============================================================================

/// Encode a single response frame. The bytes are appended to `out`.
pub fn encode_response(msg: &Response, layout: FrameLayout, out: &mut Vec<u8>) {
    let mut fields = FieldWriter::begin(out, layout, msg.wire_type());

    match *msg {
        Response::Donate { charity, amount } => {
            fields.u8(charity);
            fields.u64(amount);
        }
        Response::Cinfo(rec) => {
            fields.u64(rec.total_donation_amt);
            fields.u64(rec.top_donation);
            fields.u32(rec.num_donations);
        }
        Response::Top(totals) => {
            for total in totals {
                fields.u64(total);
            }
        }
        Response::Stats(s) => {
            fields.u8(s.max_charity);
            fields.u8(s.min_charity);
            fields.u64(s.max_amount);
            fields.u64(s.min_amount);
        }
        Response::Logout | Response::Error => {}
    }

    fields.finish();
}

/// Decode a single response frame.
///
/// This is useful on the **client** side when reading from the server.
pub fn decode_response(buf: &[u8], layout: FrameLayout) -> Result<Response, ProtocolError> {
    let tag = *buf.first().ok_or(ProtocolError::Truncated)?;
    let frame_len = response_frame_len(layout, tag).ok_or(ProtocolError::UnknownTag(tag))?;
    let mut fields = FieldReader::new(buf, layout, frame_len)?;

    match WireType::from_u8(tag) {
        Some(WireType::Donate) => {
            let charity = fields.u8()?;
            let amount = fields.u64()?;
            Ok(Response::Donate { charity, amount })
        }
        Some(WireType::Cinfo) => {
            let total_donation_amt = fields.u64()?;
            let top_donation = fields.u64()?;
            let num_donations = fields.u32()?;
            Ok(Response::Cinfo(CharityRecord::new(
                total_donation_amt,
                top_donation,
                num_donations,
            )))
        }
        Some(WireType::Top) => {
            let mut totals = [0u64; TOP_K];
            for slot in totals.iter_mut() {
                *slot = fields.u64()?;
            }
            Ok(Response::Top(totals))
        }
        Some(WireType::Stats) => Ok(Response::Stats(StatsReply {
            max_charity: fields.u8()?,
            min_charity: fields.u8()?,
            max_amount: fields.u64()?,
            min_amount: fields.u64()?,
        })),
        Some(WireType::Logout) => Ok(Response::Logout),
        Some(WireType::Error) => Ok(Response::Error),
        None => Err(ProtocolError::UnknownTag(tag)),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Appends payload fields in the layout's byte order and alignment.
struct FieldWriter<'a> {
    out: &'a mut Vec<u8>,
    start: usize,
    layout: FrameLayout,
}

impl<'a> FieldWriter<'a> {
    fn begin(out: &'a mut Vec<u8>, layout: FrameLayout, ty: WireType) -> Self {
        let start = out.len();
        out.put_u8(ty as u8);
        if layout == FrameLayout::Legacy {
            out.put_bytes(0, LEGACY_PAYLOAD_OFFSET - 1);
        }
        FieldWriter { out, start, layout }
    }

    fn align(&mut self, width: usize) {
        if self.layout == FrameLayout::Legacy {
            let pos = self.out.len() - self.start;
            self.out.put_bytes(0, (width - pos % width) % width);
        }
    }

    fn u8(&mut self, v: u8) {
        self.out.put_u8(v);
    }

    fn u32(&mut self, v: u32) {
        self.align(4);
        match self.layout {
            FrameLayout::Compact => self.out.put_u32(v),
            FrameLayout::Legacy => self.out.put_u32_le(v),
        }
    }

    fn u64(&mut self, v: u64) {
        self.align(8);
        match self.layout {
            FrameLayout::Compact => self.out.put_u64(v),
            FrameLayout::Legacy => self.out.put_u64_le(v),
        }
    }

    fn finish(self) {
        if self.layout == FrameLayout::Legacy {
            let used = self.out.len() - self.start;
            self.out.put_bytes(0, LEGACY_FRAME_LEN - used);
        }
    }
}

/// Reads payload fields back out, mirroring [`FieldWriter`].
struct FieldReader<'a> {
    frame: &'a [u8],
    pos: usize,
    layout: FrameLayout,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8], layout: FrameLayout, frame_len: usize) -> Result<Self, ProtocolError> {
        if buf.len() < frame_len {
            return Err(ProtocolError::Truncated);
        }
        let pos = match layout {
            FrameLayout::Compact => 1,
            FrameLayout::Legacy => LEGACY_PAYLOAD_OFFSET,
        };
        Ok(FieldReader {
            frame: &buf[..frame_len],
            pos,
            layout,
        })
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8], ProtocolError> {
        if self.layout == FrameLayout::Legacy {
            self.pos += (width - self.pos % width) % width;
        }
        let field = self
            .frame
            .get(self.pos..self.pos + width)
            .ok_or(ProtocolError::Truncated)?;
        self.pos += width;
        Ok(field)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        let mut field = self.take(1)?;
        Ok(field.get_u8())
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let mut field = self.take(4)?;
        Ok(match self.layout {
            FrameLayout::Compact => field.get_u32(),
            FrameLayout::Legacy => field.get_u32_le(),
        })
    }

    fn u64(&mut self) -> Result<u64, ProtocolError> {
        let mut field = self.take(8)?;
        Ok(match self.layout {
            FrameLayout::Compact => field.get_u64(),
            FrameLayout::Legacy => field.get_u64_le(),
        })
    }
}
