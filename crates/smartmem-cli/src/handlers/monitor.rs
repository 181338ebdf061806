//! Monitor command handler: host mode.
//!
//! Starts the server, then keeps it under the health monitor until this
//! process is asked to shut down. The server is stopped on the way out. If
//! this process dies without a chance to clean up, the watchdog (tied to
//! this process's PID by `main`) tears the server down instead.

use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;
use smartmem_runtime::{HealthEvent, HealthMonitor, ServerSignals, SignalEvent};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::{start, stop};

pub async fn execute(ctx: &CliContext, interval: Duration) -> Result<(), CliError> {
    start::execute(ctx).await?;

    let mut signals = ServerSignals::install()?;
    let cancel = CancellationToken::new();
    let monitor = HealthMonitor::new(ctx.supervisor.clone(), interval, cancel.clone());
    let mut events = pin!(monitor.monitor());

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => report(&event),
                None => break,
            },
            signal = signals.recv() => match signal {
                SignalEvent::Shutdown => {
                    info!("Shutdown requested");
                    cancel.cancel();
                    break;
                }
                SignalEvent::Reload => info!("Reload requested; configuration is read on the next start"),
                SignalEvent::DumpDiagnostics => {
                    let status = ctx.supervisor.status().await;
                    eprintln!("Server {status}");
                }
            },
        }
    }

    stop::execute(ctx).await
}

fn report(event: &HealthEvent) {
    match event {
        HealthEvent::Changed(status) => println!("Server {status}"),
        HealthEvent::Recovered { attempt, record } => {
            println!("Server recovered on attempt {attempt} (pid {})", record.pid);
        }
        HealthEvent::RecoveryFailed { code, message } => {
            warn!(%code, "Recovery failed");
            eprintln!("error[{code}]: {message}");
        }
    }
}
