//! STATS summary: which charity holds the largest and the smallest total.

use crate::charity::{CharityId, CharityRecord};
use crate::CHARITY_COUNT;

/// Highest and lowest `total_donation_amt` across all charities.
///
/// Ties go to the lowest charity id on both ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub max_charity: CharityId,
    pub min_charity: CharityId,
    pub max_amount: u64,
    pub min_amount: u64,
}

impl StatsSummary {
    /// Summarize a full ledger scan. `records[i]` belongs to charity `i`.
    pub fn from_records(records: &[CharityRecord; CHARITY_COUNT]) -> Self {
        let first = records[0].total_donation_amt;

        let mut summary = StatsSummary {
            max_charity: CharityId::default(),
            min_charity: CharityId::default(),
            max_amount: first,
            min_amount: first,
        };

        for (id, rec) in CharityId::all().zip(records.iter()).skip(1) {
            if rec.total_donation_amt > summary.max_amount {
                summary.max_charity = id;
                summary.max_amount = rec.total_donation_amt;
            }
            if rec.total_donation_amt < summary.min_amount {
                summary.min_charity = id;
                summary.min_amount = rec.total_donation_amt;
            }
        }

        summary
    }
}
