//! Per-charity aggregate record and validated charity ids.
//!
//! A `CharityRecord` is a plain value: the ledger owns the live copies
//! behind its locks and hands out copies as snapshots.

use std::fmt;

use crate::error::LedgerError;
use crate::CHARITY_COUNT;

/// A charity id known to be in `0..CHARITY_COUNT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CharityId(u8);

impl CharityId {
    /// Validate a raw id taken off the wire.
    pub fn new(raw: u8) -> Result<Self, LedgerError> {
        if (raw as usize) < CHARITY_COUNT {
            Ok(CharityId(raw))
        } else {
            Err(LedgerError::InvalidEntity(raw))
        }
    }

    /// All charity ids in ascending order.
    pub fn all() -> impl Iterator<Item = CharityId> {
        (0..CHARITY_COUNT as u8).map(CharityId)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for CharityId {
    type Error = LedgerError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        CharityId::new(raw)
    }
}

impl fmt::Display for CharityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Donation aggregates for one charity.
///
/// Invariants (maintained by [`CharityRecord::apply_donation`]):
/// - `total_donation_amt >= top_donation`
/// - `num_donations` counts every applied donation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CharityRecord {
    /// Sum of all donations made to this charity.
    pub total_donation_amt: u64,
    /// Largest single donation.
    pub top_donation: u64,
    /// Count of donations.
    pub num_donations: u32,
}

impl CharityRecord {
    pub fn new(total_donation_amt: u64, top_donation: u64, num_donations: u32) -> Self {
        CharityRecord {
            total_donation_amt,
            top_donation,
            num_donations,
        }
    }

    /// Apply one donation. Callers hold whatever lock guards this record.
    ///
    /// Counters saturate rather than wrap.
    pub fn apply_donation(&mut self, amount: u64) {
        self.num_donations = self.num_donations.saturating_add(1);
        self.total_donation_amt = self.total_donation_amt.saturating_add(amount);
        if amount > self.top_donation {
            self.top_donation = amount;
        }
    }
}
