//! Append-only event log.
//!
//! One line per handled frame, `<connId> <EVENT> [fields...]`, flushed as
//! soon as it is written. Handlers only queue lines on an unbounded
//! channel; a dedicated blocking writer task owns the file, so no file I/O
//! runs on the async workers. Lines land in the order they were queued.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use donation_core::StatsSummary;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ServerError;
use crate::types::ConnectionId;

/// One loggable event, minus the connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    Donate { charity: u8, amount: u64 },
    Cinfo { charity: u8 },
    Top,
    Logout,
    Stats(StatsSummary),
    Error,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Donate { charity, amount } => write!(f, "DONATE {} {}", charity, amount),
            LogEvent::Cinfo { charity } => write!(f, "CINFO {}", charity),
            LogEvent::Top => f.write_str("TOP"),
            LogEvent::Logout => f.write_str("LOGOUT"),
            LogEvent::Stats(s) => write!(
                f,
                "STATS {}:{} {}:{}",
                s.min_charity, s.min_amount, s.max_charity, s.max_amount
            ),
            LogEvent::Error => f.write_str("ERROR"),
        }
    }
}

enum LogCommand {
    Line(String),
    Close,
}

type LogTx = mpsc::UnboundedSender<LogCommand>;
type LogRx = mpsc::UnboundedReceiver<LogCommand>;

pub struct EventLog {
    tx: LogTx,
    writer: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl EventLog {
    /// Create (or truncate) the log file at `path` and start its writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(path: &Path) -> Result<Self, ServerError> {
        let file = File::create(path).map_err(|source| ServerError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(EventLog::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let (tx, rx): (LogTx, LogRx) = mpsc::unbounded_channel();
        let writer = tokio::task::spawn_blocking(move || write_lines(writer, rx));
        EventLog {
            tx,
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Queue one line. Never waits on the file.
    pub fn record(&self, conn: ConnectionId, event: &LogEvent) -> io::Result<()> {
        self.tx
            .send(LogCommand::Line(format!("{} {}\n", conn, event)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "event log writer has stopped"))
    }

    /// Write out everything queued so far and stop the writer.
    ///
    /// Lines recorded afterwards are rejected.
    pub async fn close(&self) -> io::Result<()> {
        let _ = self.tx.send(LogCommand::Close);
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match writer {
            Some(task) => task
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => Ok(()),
        }
    }
}

fn write_lines(mut sink: impl Write, mut rx: LogRx) -> io::Result<()> {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            LogCommand::Line(line) => {
                sink.write_all(line.as_bytes())?;
                sink.flush()?;
            }
            LogCommand::Close => break,
        }
    }
    sink.flush()
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donation_core::{CharityId, CharityRecord, CHARITY_COUNT};
    use std::sync::{mpsc as std_mpsc, Arc};

    #[tokio::test]
    async fn writes_one_line_per_event_in_order() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let log = EventLog::create(file.path()).unwrap();

        let mut records = [CharityRecord::default(); CHARITY_COUNT];
        records[1].total_donation_amt = 40;
        records[3].total_donation_amt = 90;
        let stats = StatsSummary::from_records(&records);

        log.record(ConnectionId(4), &LogEvent::Donate { charity: 2, amount: 100 }).unwrap();
        log.record(ConnectionId(4), &LogEvent::Cinfo { charity: 2 }).unwrap();
        log.record(ConnectionId(5), &LogEvent::Stats(stats)).unwrap();
        log.record(ConnectionId(5), &LogEvent::Error).unwrap();
        log.close().await.unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "4 DONATE 2 100\n4 CINFO 2\n5 STATS 0:0 3:90\n5 ERROR\n");
        assert_eq!(stats.max_charity, CharityId::new(3).unwrap());
    }

    /// Sink whose every flush waits for the test to let it through.
    struct GatedSink {
        out: Arc<Mutex<Vec<u8>>>,
        gate: std_mpsc::Receiver<()>,
    }

    impl Write for GatedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.out.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            // A dropped sender opens the gate for good.
            let _ = self.gate.recv();
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_does_not_wait_for_a_stalled_sink() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let (open, gate) = std_mpsc::channel();
        let log = EventLog::from_writer(GatedSink {
            out: Arc::clone(&out),
            gate,
        });

        // The writer is stuck flushing the first line; queuing still succeeds.
        for conn in 1..=3 {
            log.record(ConnectionId(conn), &LogEvent::Top).unwrap();
        }
        assert!(!String::from_utf8_lossy(&out.lock().unwrap()).contains("3 TOP"));

        drop(open);
        log.close().await.unwrap();
        assert_eq!(&out.lock().unwrap()[..], b"1 TOP\n2 TOP\n3 TOP\n");
    }

    #[tokio::test]
    async fn closed_log_rejects_new_lines() {
        let log = EventLog::from_writer(io::sink());
        log.close().await.unwrap();

        let err = log.record(ConnectionId(1), &LogEvent::Logout).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn missing_directory_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("events.log");

        assert!(matches!(EventLog::create(&path), Err(ServerError::LogFile { .. })));
    }
}
