//! Top session-totals board.
//!
//! Holds the `TOP_K` largest per-connection session totals seen since the
//! server started, highest first. [`TopTotals`] is the plain ranking;
//! [`TopTotalsBoard`] puts it behind its own lock for sharing.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::TOP_K;

/// Bounded descending ranking of session totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopTotals {
    entries: Vec<u64>,
}

impl TopTotals {
    pub fn new() -> Self {
        TopTotals {
            entries: Vec::with_capacity(TOP_K),
        }
    }

    /// Offer a session total to the ranking.
    ///
    /// With a free slot the total is always taken. Once full, it only
    /// displaces the current minimum if strictly larger, so on a tie the
    /// entry that got there first stays.
    pub fn update(&mut self, total: u64) {
        if self.entries.len() < TOP_K {
            self.entries.push(total);
        } else {
            match self.entries.last_mut() {
                Some(min) if total > *min => *min = total,
                _ => return,
            }
        }
        self.entries.sort_by(|a, b| b.cmp(a));
    }

    /// Current entries, highest first. At most `TOP_K` long.
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// Entries padded with zeros to exactly `TOP_K` slots.
    pub fn padded(&self) -> [u64; TOP_K] {
        let mut out = [0u64; TOP_K];
        out[..self.entries.len()].copy_from_slice(&self.entries);
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The shared board: a [`TopTotals`] behind its own lock.
#[derive(Debug, Default)]
pub struct TopTotalsBoard {
    inner: Mutex<TopTotals>,
}

impl TopTotalsBoard {
    pub fn new() -> Self {
        TopTotalsBoard::default()
    }

    pub fn update(&self, total: u64) {
        self.lock().update(total);
    }

    /// Snapshot of the ranking, highest first.
    pub fn read(&self) -> Vec<u64> {
        self.lock().entries().to_vec()
    }

    pub fn padded(&self) -> [u64; TOP_K] {
        self.lock().padded()
    }

    fn lock(&self) -> MutexGuard<'_, TopTotals> {
        // `TopTotals::update` cannot panic between its writes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_free_slots_in_descending_order() {
        let mut top = TopTotals::new();
        top.update(10);
        top.update(30);

        assert_eq!(top.entries(), &[30, 10]);
        assert_eq!(top.padded(), [30, 10, 0]);
    }

    #[test]
    fn keeps_the_k_largest() {
        let mut top = TopTotals::new();
        for total in [5, 50, 20, 1, 40, 45, 3] {
            top.update(total);
        }

        assert_eq!(top.entries(), &[50, 45, 40]);
    }

    #[test]
    fn equal_to_minimum_is_not_admitted() {
        let mut top = TopTotals::new();
        for total in [9, 7, 4] {
            top.update(total);
        }
        let before = top.clone();

        top.update(4);
        assert_eq!(top, before);

        top.update(5);
        assert_eq!(top.entries(), &[9, 7, 5]);
    }

    #[test]
    fn zero_totals_take_free_slots_only() {
        let mut top = TopTotals::new();
        top.update(0);
        assert_eq!(top.entries(), &[0]);

        for total in [8, 6] {
            top.update(total);
        }
        top.update(0);
        assert_eq!(top.entries(), &[8, 6, 0]);
    }

    #[test]
    fn minimum_never_decreases() {
        let mut top = TopTotals::new();
        let mut last_min = 0;
        for total in [12, 3, 40, 2, 15, 15, 1, 99, 14] {
            top.update(total);
            if top.len() == TOP_K {
                let min = *top.entries().last().unwrap();
                assert!(min >= last_min);
                last_min = min;
            }
        }
        assert_eq!(top.entries(), &[99, 40, 15]);
    }

    #[test]
    fn shared_board_reads_back_updates() {
        let board = TopTotalsBoard::new();
        board.update(150);
        board.update(20);

        assert_eq!(board.read(), vec![150, 20]);
        assert_eq!(board.padded(), [150, 20, 0]);
    }
}
