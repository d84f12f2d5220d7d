//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Binds the configured port(s) and opens the event log.
//! - Accepts new TCP connections and assigns each a `ConnectionId`.
//! - Spawns a handler task per connection and registers it.
//! - On shutdown, stops accepting, cancels and joins every handler, and
//!   returns the final statistics.
//!
//! The per-connection logic lives in `client`, handle bookkeeping in
//! `registry`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use donation_core::{FinalStats, LedgerState};
use futures::future::{select_all, BoxFuture, FutureExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::ConnectionHandler;
use crate::config::{Config, Deployment};
use crate::error::ServerError;
use crate::event_log::EventLog;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::types::{ConnectionId, Role, ServerContext, SharedContext};

/// Pause after a failed accept, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Process-wide stop request.
///
/// `trigger` only stores a flag and fires a token; it never blocks, so it
/// is safe to call from the signal-observing task.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    flag: AtomicBool,
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    pub fn trigger(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called.
    pub async fn triggered(&self) {
        self.inner.token.cancelled().await
    }
}

/// Trigger `shutdown` on the first Ctrl-C.
pub fn listen_for_ctrl_c(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                shutdown.trigger();
            }
            Err(e) => error!("failed to listen for ctrl_c: {}", e),
        }
    })
}

#[derive(Debug)]
struct BoundListener {
    listener: TcpListener,
    role: Role,
}

/// A bound, not yet running, server.
#[derive(Debug)]
pub struct Server {
    listeners: Vec<BoundListener>,
    ctx: SharedContext,
    registry: ConnectionRegistry,
    shutdown: Shutdown,
    next_id: u64,
}

impl Server {
    /// Validate `config`, create the event log and bind every port.
    ///
    /// Any failure here is fatal; nothing is left running.
    pub async fn bind(config: Config) -> Result<Server, ServerError> {
        config.validate()?;

        let log = EventLog::create(&config.log_path)?;
        let ports = match config.deployment {
            Deployment::Combined { port } => vec![(port, Role::Combined)],
            Deployment::Split {
                observer_port,
                donor_port,
            } => vec![(observer_port, Role::Observer), (donor_port, Role::Donor)],
        };

        let mut listeners = Vec::with_capacity(ports.len());
        for (port, role) in ports {
            let addr = config.socket_addr_string(port);
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| ServerError::Bind { addr, source })?;
            listeners.push(BoundListener { listener, role });
        }

        let ctx = Arc::new(ServerContext {
            state: LedgerState::new(config.discipline),
            log,
            layout: config.layout,
        });

        Ok(Server {
            listeners,
            ctx,
            registry: ConnectionRegistry::new(),
            shutdown: Shutdown::new(),
            next_id: 0,
        })
    }

    /// Address of the listener serving `role`, if there is one.
    pub fn local_addr(&self, role: Role) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|l| l.role == role)
            .and_then(|l| l.listener.local_addr().ok())
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn context(&self) -> SharedContext {
        Arc::clone(&self.ctx)
    }

    /// Accept connections until shutdown is triggered, then cancel and
    /// join every handler and return the final statistics.
    pub async fn run(mut self) -> FinalStats {
        for l in &self.listeners {
            if let Ok(addr) = l.listener.local_addr() {
                info!(
                    %addr,
                    role = %l.role,
                    discipline = %self.ctx.state.ledger().discipline(),
                    layout = %self.ctx.layout,
                    "listening"
                );
            }
        }

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => None,
                accepted = accept_any(&self.listeners) => Some(accepted),
            };

            // Checked after every accept, successful or not.
            if self.shutdown.is_triggered() {
                break;
            }

            match accepted {
                Some((Ok((stream, peer)), role)) => self.spawn_handler(stream, peer, role),
                Some((Err(e), role)) => {
                    warn!(%role, "accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                None => break,
            }
        }

        drop(self.listeners);
        info!(live = self.registry.len(), "stopped accepting");

        let outcomes = self.registry.shutdown_all().await;
        let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
        if failed > 0 {
            warn!(failed, "connection tasks panicked");
        }
        if let Err(e) = self.ctx.log.close().await {
            warn!("event log did not close cleanly: {}", e);
        }

        let stats = self.ctx.state.snapshot().await;
        info!(clients = stats.client_count, "all connections closed");
        stats
    }

    fn spawn_handler(&mut self, stream: TcpStream, peer: SocketAddr, role: Role) {
        self.registry.reap();

        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        let clients = self.ctx.state.stats().record_connection();
        info!(conn = %id, %peer, %role, clients, "accepted connection");

        let cancel = CancellationToken::new();
        let handler = ConnectionHandler::new(id, role, Arc::clone(&self.ctx));
        let token = cancel.clone();
        let task = tokio::spawn(handler.run(stream, token));

        self.registry.register(ConnectionHandle { id, cancel, task });
    }
}

type Accepted = (io::Result<(TcpStream, SocketAddr)>, Role);

/// Wait on every listener at once; the first connection wins.
///
/// `TcpListener::accept` is cancel safe, so the losing futures can be
/// dropped without losing a connection.
async fn accept_any(listeners: &[BoundListener]) -> Accepted {
    let pending: Vec<BoxFuture<'_, Accepted>> = listeners
        .iter()
        .map(|l| async move { (l.listener.accept().await, l.role) }.boxed())
        .collect();

    let (accepted, _, _) = select_all(pending).await;
    accepted
}
