//! donation-core
//!
//! Pure shared-state logic for the donation server:
//! - per-charity records
//! - the charity ledger and its two locking disciplines
//! - the reader/writer gate used by the reader-preference discipline
//! - the top session-totals board
//! - server-wide counters and the aggregate that ties them together

pub mod board;
pub mod charity;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod state;
pub mod summary;

/// Number of charities the server tracks. Ids are `0..CHARITY_COUNT`.
pub const CHARITY_COUNT: usize = 5;

/// Number of session totals kept on the top board.
pub const TOP_K: usize = 3;

pub use board::{TopTotals, TopTotalsBoard};
pub use charity::{CharityId, CharityRecord};
pub use error::LedgerError;
pub use gate::{ReadGuard, ReaderWriterGate, WriteGuard};
pub use ledger::{CharityLedger, Discipline};
pub use state::{FinalStats, LedgerState, ServerStats};
pub use summary::StatsSummary;
