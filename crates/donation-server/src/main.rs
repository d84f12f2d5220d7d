//! Binary TCP server for the donation ledger.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use donation_core::Discipline;
use donation_protocol::FrameLayout;
use donation_server::{listen_for_ctrl_c, Config, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "donation-server")]
#[command(about = "Concurrent TCP server for the shared donation ledger")]
struct Cli {
    /// Address to bind (falls back to DONATION_BIND_ADDR, then 0.0.0.0)
    #[arg(short, long)]
    bind: Option<String>,

    /// Frame layout spoken on every port
    #[arg(short, long, default_value = "compact")]
    layout: FrameLayout,

    /// Ledger locking discipline (default depends on the deployment)
    #[arg(short, long)]
    discipline: Option<Discipline>,

    #[command(subcommand)]
    deployment: DeploymentArgs,
}

#[derive(Subcommand)]
enum DeploymentArgs {
    /// One port; clients may donate and query
    Combined {
        port: u16,
        log_filename: PathBuf,
    },
    /// Observer (query) port and donor (donate) port
    Split {
        observer_port: u16,
        donor_port: u16,
        log_filename: PathBuf,
    },
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = match self.deployment {
            DeploymentArgs::Combined { port, log_filename } => Config::combined(port, log_filename),
            DeploymentArgs::Split {
                observer_port,
                donor_port,
                log_filename,
            } => Config::split(observer_port, donor_port, log_filename),
        };

        if let Some(bind) = self.bind {
            config = config.with_bind_addr(bind);
        }
        if let Some(discipline) = self.discipline {
            config = config.with_discipline(discipline);
        }
        config.with_layout(self.layout)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Cli::parse().into_config();
    info!(
        bind = %config.bind_addr,
        deployment = ?config.deployment,
        log = %config.log_path.display(),
        "starting donation-server"
    );

    let server = Server::bind(config)
        .await
        .context("failed to start donation-server")?;
    listen_for_ctrl_c(server.shutdown_handle());

    let stats = server.run().await;

    let mut stdout = io::stdout().lock();
    stdout.write_all(stats.charity_report().as_bytes())?;
    stdout.flush()?;

    let mut stderr = io::stderr().lock();
    stderr.write_all(stats.aggregate_report().as_bytes())?;
    stderr.flush()?;

    Ok(())
}
