//! The shared state aggregate handed to every connection handler.
//!
//! `LedgerState` bundles the charity ledger, the top board and the server
//! counters. It lives for the whole process and is shared by `Arc`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::board::TopTotalsBoard;
use crate::charity::CharityRecord;
use crate::error::LedgerError;
use crate::ledger::{CharityLedger, Discipline};
use crate::summary::StatsSummary;
use crate::{CHARITY_COUNT, TOP_K};

/// Server-wide counters, guarded independently of the ledger.
#[derive(Debug, Default)]
pub struct ServerStats {
    client_count: AtomicU64,
}

impl ServerStats {
    /// Count one accepted connection. Returns the new total.
    pub fn record_connection(&self) -> u64 {
        self.client_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct LedgerState {
    ledger: CharityLedger,
    board: TopTotalsBoard,
    stats: ServerStats,
}

impl LedgerState {
    pub fn new(discipline: Discipline) -> Self {
        LedgerState {
            ledger: CharityLedger::new(discipline),
            board: TopTotalsBoard::new(),
            stats: ServerStats::default(),
        }
    }

    pub fn ledger(&self) -> &CharityLedger {
        &self.ledger
    }

    pub fn board(&self) -> &TopTotalsBoard {
        &self.board
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub async fn donate(&self, charity: u8, amount: u64) -> Result<(), LedgerError> {
        self.ledger.donate(charity, amount).await
    }

    pub async fn charity_info(&self, charity: u8) -> Result<CharityRecord, LedgerError> {
        self.ledger.info(charity).await
    }

    /// Top board for a TOP reply, zero padded.
    pub async fn top_totals(&self) -> [u64; TOP_K] {
        let _section = self.ledger.reader_section().await;
        self.board.padded()
    }

    /// Submit a finished session's total to the board.
    ///
    /// Runs inside the reader section, like every other board access.
    pub async fn close_session(&self, session_total: u64) {
        let _section = self.ledger.reader_section().await;
        self.board.update(session_total);
    }

    pub async fn summary(&self) -> StatsSummary {
        StatsSummary::from_records(&self.ledger.scan().await)
    }

    /// Everything printed at shutdown, captured at one instant.
    pub async fn snapshot(&self) -> FinalStats {
        let records = self.ledger.scan().await;
        let top = {
            let _section = self.ledger.reader_section().await;
            self.board.padded()
        };

        FinalStats {
            records,
            client_count: self.stats.client_count(),
            top,
        }
    }
}

/// Final statistics reported when the server stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalStats {
    pub records: [CharityRecord; CHARITY_COUNT],
    pub client_count: u64,
    pub top: [u64; TOP_K],
}

impl FinalStats {
    /// One `id, numDonations, topDonation, totalDonationAmt` line per charity.
    pub fn charity_report(&self) -> String {
        let mut out = String::new();
        for (id, rec) in self.records.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}, {}, {}, {}",
                id, rec.num_donations, rec.top_donation, rec.total_donation_amt
            );
        }
        out
    }

    /// Client count on one line, then the top board.
    pub fn aggregate_report(&self) -> String {
        let top: Vec<String> = self.top.iter().map(u64::to_string).collect();
        format!("{}\n{}\n", self.client_count, top.join(", "))
    }
}
