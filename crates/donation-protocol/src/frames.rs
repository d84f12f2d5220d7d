//! Logical frames exchanged between clients and the server.

use donation_core::{CharityRecord, StatsSummary, TOP_K};

use crate::wire_types::WireType;

/// Client → server frames.
///
/// Charity ids are carried raw; range checks belong to the ledger so an
/// out-of-range id still decodes and earns an `ERROR` reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Request {
    Donate { charity: u8, amount: u64 },
    Cinfo { charity: u8 },
    Top,
    Logout,
    Stats,
}

impl Request {
    pub fn wire_type(&self) -> WireType {
        match self {
            Request::Donate { .. } => WireType::Donate,
            Request::Cinfo { .. } => WireType::Cinfo,
            Request::Top => WireType::Top,
            Request::Logout => WireType::Logout,
            Request::Stats => WireType::Stats,
        }
    }
}

/// STATS reply body as it travels on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct StatsReply {
    pub max_charity: u8,
    pub min_charity: u8,
    pub max_amount: u64,
    pub min_amount: u64,
}

impl From<StatsSummary> for StatsReply {
    fn from(s: StatsSummary) -> Self {
        StatsReply {
            max_charity: s.max_charity.get(),
            min_charity: s.min_charity.get(),
            max_amount: s.max_amount,
            min_amount: s.min_amount,
        }
    }
}

/// Server → client frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Response {
    /// Echo of an accepted donation.
    Donate { charity: u8, amount: u64 },
    Cinfo(CharityRecord),
    Top([u64; TOP_K]),
    Logout,
    Stats(StatsReply),
    Error,
}

impl Response {
    pub fn wire_type(&self) -> WireType {
        match self {
            Response::Donate { .. } => WireType::Donate,
            Response::Cinfo(_) => WireType::Cinfo,
            Response::Top(_) => WireType::Top,
            Response::Logout => WireType::Logout,
            Response::Stats(_) => WireType::Stats,
            Response::Error => WireType::Error,
        }
    }
}
