//! Configuration for the donation TCP server.
//!
//! A `Config` is built from the command line (see `main.rs`). The bind
//! address falls back to `DONATION_BIND_ADDR`, then "0.0.0.0".

use std::env;
use std::path::PathBuf;

use donation_core::Discipline;
use donation_protocol::FrameLayout;

use crate::error::ServerError;

/// Which ports the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// One port; every connection may donate and query.
    Combined { port: u16 },

    /// Separate ports for observers (queries) and donors (donations).
    Split { observer_port: u16, donor_port: u16 },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    pub deployment: Deployment,

    /// Event log; created or truncated at startup.
    pub log_path: PathBuf,

    pub discipline: Discipline,

    pub layout: FrameLayout,
}

impl Config {
    /// Single-port deployment with per-charity locking.
    pub fn combined(port: u16, log_path: impl Into<PathBuf>) -> Self {
        Config {
            bind_addr: default_bind_addr(),
            deployment: Deployment::Combined { port },
            log_path: log_path.into(),
            discipline: Discipline::FineGrained,
            layout: FrameLayout::default(),
        }
    }

    /// Observer/donor port pair behind the reader/writer gate.
    pub fn split(observer_port: u16, donor_port: u16, log_path: impl Into<PathBuf>) -> Self {
        Config {
            bind_addr: default_bind_addr(),
            deployment: Deployment::Split {
                observer_port,
                donor_port,
            },
            log_path: log_path.into(),
            discipline: Discipline::ReaderWriter,
            layout: FrameLayout::default(),
        }
    }

    pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = bind_addr.into();
        self
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if let Deployment::Split {
            observer_port,
            donor_port,
        } = self.deployment
        {
            if observer_port != 0 && observer_port == donor_port {
                return Err(ServerError::Config(format!(
                    "observer and donor ports must differ (both {observer_port})"
                )));
            }
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self, port: u16) -> String {
        format!("{}:{}", self.bind_addr, port)
    }
}

fn default_bind_addr() -> String {
    env::var("DONATION_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string())
}
