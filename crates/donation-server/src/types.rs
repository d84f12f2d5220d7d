//! Shared types for the donation TCP server.
//!
//! This module defines:
//! - `ConnectionId`: a lightweight handle for accepted connections
//! - `Role`: what a connection is allowed to do, decided by the port it came in on
//! - `ServerContext`: the state every connection handler shares

use std::fmt;
use std::sync::Arc;

use donation_core::LedgerState;
use donation_protocol::{FrameLayout, Request};

use crate::event_log::EventLog;

/// Identifier for an accepted connection.
///
/// Unique over the lifetime of the process; it is the first field of
/// every event-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a connection may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Single-port deployment: everything.
    Combined,
    /// Writer port: DONATE and LOGOUT.
    Donor,
    /// Reader port: CINFO, TOP, STATS and LOGOUT.
    Observer,
}

impl Role {
    pub fn permits(self, req: &Request) -> bool {
        match (self, req) {
            (_, Request::Logout) => true,
            (Role::Combined, _) => true,
            (Role::Donor, Request::Donate { .. }) => true,
            (Role::Donor, _) => false,
            (Role::Observer, Request::Donate { .. }) => false,
            (Role::Observer, _) => true,
        }
    }

    /// Whether LOGOUT submits the session total to the top board.
    pub fn records_session_total(self) -> bool {
        !matches!(self, Role::Observer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Combined => "combined",
            Role::Donor => "donor",
            Role::Observer => "observer",
        };
        f.write_str(name)
    }
}

/// Everything a connection handler needs, shared by all of them.
#[derive(Debug)]
pub struct ServerContext {
    pub state: LedgerState,
    pub log: EventLog,
    pub layout: FrameLayout,
}

pub type SharedContext = Arc<ServerContext>;
