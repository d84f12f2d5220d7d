//! donation-server
//!
//! Multi-client async TCP server for the shared donation ledger.

pub mod config;
pub mod error;
pub mod event_log;
pub mod framing;
pub mod registry;
pub mod server;
pub mod types;

// the handler is only driven through `server`
mod client;

pub use client::SessionEnd;
pub use config::{Config, Deployment};
pub use error::ServerError;
pub use server::{listen_for_ctrl_c, Server, Shutdown};
pub use types::{ConnectionId, Role};
