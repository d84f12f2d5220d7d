//! First-readers-writers gate with reader preference.
//!
//! The gate is built from three pieces:
//! - `writer`: the writer-exclusion lock, which owns the data. Writers take
//!   it directly. The reader group as a whole holds it while at least one
//!   reader is inside.
//! - `readers`: the read count, guarded by its own lock, together with the
//!   writer-exclusion guard owned by the reader group.
//! - `admission`: serializes entering readers, so that while the first
//!   reader waits for a writer to leave, later readers queue behind it.
//!
//! The first reader in acquires `writer` and parks the owned guard in
//! `readers`; the last reader out takes it back and drops it. Readers never
//! wait for each other once the group is inside, and a writer only gets in
//! when the read count reaches zero. Under a steady stream of readers a
//! writer can therefore starve; that is the accepted cost of this discipline.
//!
//! Readers see the data through the parked guard, so a [`ReadGuard`] hands
//! out copies (or runs a closure) rather than a long-lived reference.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

struct Readers<T> {
    count: usize,
    /// Present exactly when `count > 0`.
    writer_hold: Option<OwnedMutexGuard<T>>,
}

/// Reader-preference reader/writer lock around a value of type `T`.
pub struct ReaderWriterGate<T> {
    admission: Mutex<()>,
    readers: StdMutex<Readers<T>>,
    writer: Arc<Mutex<T>>,
}

impl<T> ReaderWriterGate<T> {
    pub fn new(value: T) -> Self {
        ReaderWriterGate {
            admission: Mutex::new(()),
            readers: StdMutex::new(Readers {
                count: 0,
                writer_hold: None,
            }),
            writer: Arc::new(Mutex::new(value)),
        }
    }

    /// Enter as a reader.
    ///
    /// Returns immediately if other readers are already inside; otherwise
    /// waits until no writer holds the gate.
    pub async fn read(&self) -> ReadGuard<'_, T> {
        let _admission = self.admission.lock().await;

        {
            let mut readers = self.readers();
            if readers.count > 0 {
                readers.count += 1;
                return ReadGuard { gate: self };
            }
        }

        // First reader in. No reader is inside and later readers are held at
        // admission, so the count cannot move while we wait here.
        let hold = Arc::clone(&self.writer).lock_owned().await;
        let mut readers = self.readers();
        readers.writer_hold = Some(hold);
        readers.count = 1;

        ReadGuard { gate: self }
    }

    /// Enter as the single writer.
    pub async fn write(&self) -> WriteGuard<'_, T> {
        WriteGuard {
            hold: self.writer.lock().await,
        }
    }

    /// Number of readers currently inside.
    pub fn reader_count(&self) -> usize {
        self.readers().count
    }

    fn readers(&self) -> StdMutexGuard<'_, Readers<T>> {
        // The count is only touched by non-panicking code, so a poisoned
        // lock still holds a consistent value.
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn leave_reader(&self) {
        let released = {
            let mut readers = self.readers();
            readers.count -= 1;
            if readers.count == 0 {
                readers.writer_hold.take()
            } else {
                None
            }
        };
        drop(released);
    }
}

impl<T: Default> Default for ReaderWriterGate<T> {
    fn default() -> Self {
        ReaderWriterGate::new(T::default())
    }
}

impl<T> fmt::Debug for ReaderWriterGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderWriterGate")
            .field("readers", &self.reader_count())
            .finish_non_exhaustive()
    }
}

/// Shared access held by one member of the reader group.
pub struct ReadGuard<'a, T> {
    gate: &'a ReaderWriterGate<T>,
}

impl<T> ReadGuard<'_, T> {
    /// Run `f` against the guarded value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let readers = self.gate.readers();
        // The hold stays parked while any counted reader is inside.
        let value = readers
            .writer_hold
            .as_deref()
            .expect("counted reader without the writer hold");
        f(value)
    }

    /// Copy of the guarded value.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        self.with(|value| *value)
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.leave_reader();
    }
}

/// Exclusive access held by a writer.
pub struct WriteGuard<'a, T> {
    hold: MutexGuard<'a, T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.hold
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.hold
    }
}
