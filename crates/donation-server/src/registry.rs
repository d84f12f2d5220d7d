//! Live connection tracking.
//!
//! Every spawned handler is registered with its cancellation token and
//! join handle. The accept loop reaps finished handlers as it goes; at
//! shutdown `shutdown_all` cancels whatever is left and waits for it.
//! Both hand back each handler's outcome: how its session ended, or the
//! join error if the task panicked.

use std::mem;
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::SessionEnd;
use crate::types::ConnectionId;

/// How a handler task finished.
pub type Outcome = Result<SessionEnd, JoinError>;

/// A live connection as the registry sees it.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub cancel: CancellationToken,
    pub task: JoinHandle<SessionEnd>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: Mutex<Vec<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry::default()
    }

    pub fn register(&self, handle: ConnectionHandle) {
        self.lock().push(handle);
    }

    /// Remove handles whose task has already finished and collect their
    /// outcomes. Never waits on a running handler.
    pub fn reap(&self) -> Vec<(ConnectionId, Outcome)> {
        let finished: Vec<ConnectionHandle> = {
            let mut handles = self.lock();
            let (done, live): (Vec<_>, Vec<_>) = mem::take(&mut *handles)
                .into_iter()
                .partition(|h| h.task.is_finished());
            *handles = live;
            done
        };

        finished
            .into_iter()
            // The task is done, so this resolves on the first poll.
            .filter_map(|h| h.task.now_or_never().map(|outcome| (h.id, outcome)))
            .inspect(|(id, outcome)| report(*id, outcome, "reaped connection"))
            .collect()
    }

    /// Handles not yet reaped, finished or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every registered connection and wait for all of them.
    ///
    /// Handlers blocked in a read or write observe the cancellation and
    /// close their socket, so this completes even with idle clients.
    pub async fn shutdown_all(&self) -> Vec<(ConnectionId, Outcome)> {
        let handles = mem::take(&mut *self.lock());
        debug!(count = handles.len(), "cancelling connections");

        for handle in &handles {
            handle.cancel.cancel();
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle.task.await;
            report(handle.id, &outcome, "joined connection");
            outcomes.push((handle.id, outcome));
        }
        outcomes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ConnectionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn report(id: ConnectionId, outcome: &Outcome, msg: &str) {
    match outcome {
        Ok(end) => debug!(conn = %id, end = ?end, "{}", msg),
        Err(e) => error!(conn = %id, "connection task failed: {}", e),
    }
}
