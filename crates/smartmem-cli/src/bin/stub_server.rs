//! Stand-in for `smart-memory-server` with the same process contract.
//!
//! Reads `CONFIG_PATH`, listens on `server.host:server.port`, exits on
//! SIGINT/SIGTERM (or Ctrl+C on Windows) and when the host named by
//! `SMARTMEM_PARENT_PID` goes away. Connections are accepted and dropped.
//! `--ignore-sigterm` makes it ignore shutdown requests so only a forced kill
//! stops it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use smartmem_core::ConfigFile;
use smartmem_runtime::{ParentMonitor, ServerSignals, SignalEvent, platform_control};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smartmem-stub-server")]
struct Args {
    /// Keep running after a shutdown signal
    #[arg(long)]
    ignore_sigterm: bool,

    /// Delay before binding the port
    #[arg(long, default_value_t = 0)]
    bind_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = std::env::var_os("CONFIG_PATH")
        .map(PathBuf::from)
        .context("CONFIG_PATH is not set")?;
    let config = ConfigFile::load(&config_path)?;

    // Install before binding so a stop request right after startup is seen.
    let mut signals = ServerSignals::install().context("Failed to install signal handlers")?;
    let parent = ParentMonitor::from_env(platform_control(), Duration::from_millis(500));

    tokio::time::sleep(Duration::from_millis(args.bind_delay_ms)).await;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, pid = std::process::id(), "Stub server listening");

    let parent_exited = async {
        match &parent {
            Some(monitor) => monitor.parent_exited().await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(parent_exited);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((_, peer)) => debug!(%peer, "Connection accepted"),
                Err(e) => warn!("Accept failed: {e}"),
            },
            event = signals.recv() => match event {
                SignalEvent::Shutdown if args.ignore_sigterm => {
                    warn!("Ignoring shutdown request");
                }
                SignalEvent::Shutdown => {
                    info!("Shutting down");
                    break;
                }
                SignalEvent::Reload => info!("Reload requested"),
                SignalEvent::DumpDiagnostics => info!(%addr, "Diagnostics requested"),
            },
            () = &mut parent_exited => {
                info!("Host process gone; shutting down");
                break;
            }
        }
    }
    Ok(())
}
