//! Per-connection handler.
//!
//! Each accepted connection runs one `ConnectionHandler` in its own task.
//! The handler is a small state machine:
//!
//! ```text
//! AwaitingFrame --frame--> Processing --reply sent--> AwaitingFrame
//!       |                       |
//!       | EOF / I/O error /     | LOGOUT / write error /
//!       | cancelled             | cancelled
//!       v                       v
//!     Closed <------------------+
//! ```
//!
//! The socket halves are owned by `run`, so the socket is closed exactly
//! once, when `run` returns, whichever way it exits.

use std::io;

use donation_core::LedgerError;
use donation_protocol::{ProtocolError, Request, Response};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event_log::LogEvent;
use crate::framing::{write_response, FrameReader, Incoming};
use crate::types::{ConnectionId, Role, SharedContext};

#[derive(Debug)]
enum HandlerState {
    AwaitingFrame,
    Processing(Result<Request, ProtocolError>),
    Closed(SessionEnd),
}

/// Why a connection's handler stopped.
#[derive(Debug)]
pub enum SessionEnd {
    Logout,
    EndOfStream,
    Cancelled,
    Io(io::Error),
}

/// What the handler sends back and logs for one frame.
struct Reply {
    response: Response,
    event: LogEvent,
    close: bool,
}

impl Reply {
    fn new(response: Response, event: LogEvent) -> Self {
        Reply {
            response,
            event,
            close: false,
        }
    }

    fn error() -> Self {
        Reply::new(Response::Error, LogEvent::Error)
    }
}

pub struct ConnectionHandler {
    id: ConnectionId,
    role: Role,
    ctx: SharedContext,
    /// Sum of this connection's accepted donations. Never shared.
    session_total: u64,
}

impl ConnectionHandler {
    pub fn new(id: ConnectionId, role: Role, ctx: SharedContext) -> Self {
        ConnectionHandler {
            id,
            role,
            ctx,
            session_total: 0,
        }
    }

    /// Serve the connection until LOGOUT, end of stream, an I/O error or
    /// cancellation.
    pub async fn run(mut self, stream: TcpStream, cancel: CancellationToken) -> SessionEnd {
        let layout = self.ctx.layout;
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half, layout);
        let mut state = HandlerState::AwaitingFrame;

        loop {
            state = match state {
                HandlerState::AwaitingFrame => {
                    let incoming = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            state = HandlerState::Closed(SessionEnd::Cancelled);
                            continue;
                        }
                        incoming = frames.next_request() => incoming,
                    };

                    match incoming {
                        Ok(Incoming::Frame(frame)) => HandlerState::Processing(frame),
                        Ok(Incoming::Closed) => HandlerState::Closed(SessionEnd::EndOfStream),
                        Err(e) => HandlerState::Closed(SessionEnd::Io(e)),
                    }
                }

                HandlerState::Processing(frame) => {
                    let reply = self.dispatch(frame).await;

                    if let Err(e) = self.ctx.log.record(self.id, &reply.event) {
                        warn!(conn = %self.id, "event log write failed: {}", e);
                    }

                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            state = HandlerState::Closed(SessionEnd::Cancelled);
                            continue;
                        }
                        sent = write_response(&mut write_half, &reply.response, layout) => sent,
                    };

                    match sent {
                        Err(e) => HandlerState::Closed(SessionEnd::Io(e)),
                        Ok(()) if reply.close => {
                            let _ = write_half.shutdown().await;
                            HandlerState::Closed(SessionEnd::Logout)
                        }
                        Ok(()) => HandlerState::AwaitingFrame,
                    }
                }

                HandlerState::Closed(end) => {
                    match &end {
                        SessionEnd::Io(e) => {
                            warn!(conn = %self.id, role = %self.role, "connection error: {}", e)
                        }
                        other => {
                            info!(conn = %self.id, role = %self.role, end = ?other, "connection closed")
                        }
                    }
                    return end;
                }
            };
        }
    }

    async fn dispatch(&mut self, frame: Result<Request, ProtocolError>) -> Reply {
        let req = match frame {
            Ok(req) => req,
            Err(e) => {
                debug!(conn = %self.id, "rejected frame: {}", e);
                return Reply::error();
            }
        };

        if !self.role.permits(&req) {
            debug!(conn = %self.id, role = %self.role, kind = %req.wire_type(), "kind not allowed for role");
            return Reply::error();
        }

        debug!(conn = %self.id, ?req, "frame");
        let state = &self.ctx.state;

        match req {
            Request::Donate { charity, amount } => match state.donate(charity, amount).await {
                Ok(()) => {
                    self.session_total = self.session_total.saturating_add(amount);
                    Reply::new(
                        Response::Donate { charity, amount },
                        LogEvent::Donate { charity, amount },
                    )
                }
                Err(LedgerError::InvalidEntity(_)) => Reply::error(),
            },

            Request::Cinfo { charity } => match state.charity_info(charity).await {
                Ok(record) => Reply::new(Response::Cinfo(record), LogEvent::Cinfo { charity }),
                Err(LedgerError::InvalidEntity(_)) => Reply::error(),
            },

            Request::Top => Reply::new(Response::Top(state.top_totals().await), LogEvent::Top),

            Request::Stats => {
                let summary = state.summary().await;
                Reply::new(Response::Stats(summary.into()), LogEvent::Stats(summary))
            }

            Request::Logout => {
                if self.role.records_session_total() {
                    state.close_session(self.session_total).await;
                }
                Reply {
                    response: Response::Logout,
                    event: LogEvent::Logout,
                    close: true,
                }
            }
        }
    }
}
