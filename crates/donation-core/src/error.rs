//! Error types for the ledger core.
//!
//! Ledger operations are infallible apart from entity validation:
//! an out-of-range charity id is the only way a caller can misuse them.

use thiserror::Error;

use crate::CHARITY_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The charity id is not in `0..CHARITY_COUNT`.
    #[error("invalid charity id {0} (expected 0..{CHARITY_COUNT})")]
    InvalidEntity(u8),
}
