//! The charity ledger.
//!
//! Owns one [`CharityRecord`] per charity and guards them with one of two
//! interchangeable disciplines, chosen when the ledger is built:
//!
//! - [`Discipline::FineGrained`]: one mutex per charity. Operations on
//!   different charities run in parallel; a full scan takes every lock in
//!   ascending id order.
//! - [`Discipline::ReaderWriter`]: a single [`ReaderWriterGate`] over the
//!   whole table. Donations are writers; lookups, scans and board reads
//!   are readers.
//!
//! Either way a donation is applied in one critical section, so no reader
//! ever sees a record with some of its fields updated and others not.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::charity::{CharityId, CharityRecord};
use crate::error::LedgerError;
use crate::gate::{ReadGuard, ReaderWriterGate};
use crate::CHARITY_COUNT;

type Table = [CharityRecord; CHARITY_COUNT];

/// Locking discipline for the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Discipline {
    /// One lock per charity.
    #[default]
    FineGrained,
    /// One reader-preference gate over the whole ledger.
    ReaderWriter,
}

impl Discipline {
    pub fn as_str(self) -> &'static str {
        match self {
            Discipline::FineGrained => "fine-grained",
            Discipline::ReaderWriter => "reader-writer",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fine-grained" => Ok(Discipline::FineGrained),
            "reader-writer" => Ok(Discipline::ReaderWriter),
            other => Err(format!("unknown ledger discipline: {other}")),
        }
    }
}

enum Slots {
    FineGrained([Mutex<CharityRecord>; CHARITY_COUNT]),
    ReaderWriter(ReaderWriterGate<Table>),
}

/// Shared table of per-charity donation aggregates.
pub struct CharityLedger {
    slots: Slots,
}

/// Proof of being inside the ledger's reader section.
///
/// Under the reader/writer discipline this holds the gate's read side, so
/// no donation can run until it is dropped. Under the fine-grained
/// discipline there is no global section and this holds nothing.
pub struct ReaderSection<'a> {
    _guard: Option<ReadGuard<'a, Table>>,
}

impl CharityLedger {
    pub fn new(discipline: Discipline) -> Self {
        let slots = match discipline {
            Discipline::FineGrained => {
                Slots::FineGrained(std::array::from_fn(|_| Mutex::new(CharityRecord::default())))
            }
            Discipline::ReaderWriter => {
                Slots::ReaderWriter(ReaderWriterGate::new([CharityRecord::default(); CHARITY_COUNT]))
            }
        };
        CharityLedger { slots }
    }

    pub fn discipline(&self) -> Discipline {
        match self.slots {
            Slots::FineGrained(_) => Discipline::FineGrained,
            Slots::ReaderWriter(_) => Discipline::ReaderWriter,
        }
    }

    /// Record one donation of `amount` to `charity`.
    pub async fn donate(&self, charity: u8, amount: u64) -> Result<(), LedgerError> {
        let id = CharityId::new(charity)?;

        match &self.slots {
            Slots::FineGrained(locks) => {
                lock_slot(&locks[id.index()]).apply_donation(amount);
            }
            Slots::ReaderWriter(gate) => {
                let mut table = gate.write().await;
                table[id.index()].apply_donation(amount);
            }
        }

        Ok(())
    }

    /// Snapshot of one charity's record.
    pub async fn info(&self, charity: u8) -> Result<CharityRecord, LedgerError> {
        let id = CharityId::new(charity)?;

        let record = match &self.slots {
            Slots::FineGrained(locks) => {
                // Copy out so the guard is gone before any await.
                let record = *lock_slot(&locks[id.index()]);
                record
            }
            Slots::ReaderWriter(gate) => gate.read().await.with(|table| table[id.index()]),
        };

        Ok(record)
    }

    /// Consistent snapshot of every record, indexed by charity id.
    pub async fn scan(&self) -> Table {
        match &self.slots {
            Slots::FineGrained(locks) => {
                // Ascending order; every caller that needs more than one
                // slot takes them this way.
                let guards: Vec<MutexGuard<'_, CharityRecord>> =
                    locks.iter().map(lock_slot).collect();
                std::array::from_fn(|i| *guards[i])
            }
            Slots::ReaderWriter(gate) => gate.read().await.get(),
        }
    }

    /// Enter the reader section for work that is not a ledger lookup
    /// itself, such as reading or updating the top board.
    pub async fn reader_section(&self) -> ReaderSection<'_> {
        let guard = match &self.slots {
            Slots::FineGrained(_) => None,
            Slots::ReaderWriter(gate) => Some(gate.read().await),
        };
        ReaderSection { _guard: guard }
    }

    /// Readers currently inside the gate. Always zero for fine-grained.
    pub fn active_readers(&self) -> usize {
        match &self.slots {
            Slots::FineGrained(_) => 0,
            Slots::ReaderWriter(gate) => gate.reader_count(),
        }
    }
}

impl Default for CharityLedger {
    fn default() -> Self {
        CharityLedger::new(Discipline::default())
    }
}

impl fmt::Debug for CharityLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharityLedger")
            .field("discipline", &self.discipline())
            .finish_non_exhaustive()
    }
}

fn lock_slot(slot: &Mutex<CharityRecord>) -> MutexGuard<'_, CharityRecord> {
    // `apply_donation` cannot panic halfway, so a poisoned slot is intact.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
