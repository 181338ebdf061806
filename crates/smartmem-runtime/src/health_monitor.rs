//! Host-side periodic health monitoring.
//!
//! The monitor drives [`ProcessSupervisor::recover`] on a timer and yields
//! only when something changed. It holds no lock between ticks, so the host
//! can keep calling start/stop/status; those calls simply queue behind a tick
//! in progress. Cancel the token when the host shuts its supervision client
//! down, or the timer leaks.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_core::Stream;
use smartmem_core::{Liveness, ProcessRecord, ReasonCode, SupervisionState};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::supervisor::{ProcessSupervisor, RecoveryOutcome, ServerStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Status differs from the previous tick.
    Changed(ServerStatus),
    /// A crashed server was brought back automatically.
    Recovered { attempt: u32, record: ProcessRecord },
    /// Automatic recovery failed; the message is user-facing.
    RecoveryFailed { code: ReasonCode, message: String },
}

pub struct HealthMonitor {
    supervisor: Arc<ProcessSupervisor>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl HealthMonitor {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        check_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            supervisor,
            interval: check_interval,
            cancel_token,
        }
    }

    /// Stream of changes. Completes when the token is cancelled.
    pub fn monitor(self) -> impl Stream<Item = HealthEvent> {
        let Self {
            supervisor,
            interval: check_interval,
            cancel_token,
        } = self;

        stream! {
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut last: Option<(SupervisionState, Option<u32>, Liveness)> = None;
            debug!("Starting health monitor every {check_interval:?}");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = cancel_token.cancelled() => {
                        debug!("Health monitor cancelled");
                        break;
                    }
                }

                match supervisor.recover().await {
                    Ok(RecoveryOutcome::Idle(status)) => {
                        let key = (status.state, status.pid, status.liveness);
                        if last != Some(key) {
                            debug!(?key, ?last, "Server status changed");
                            last = Some(key);
                            yield HealthEvent::Changed(status);
                        }
                    }
                    Ok(RecoveryOutcome::Recovered { attempt, record }) => {
                        last = Some((SupervisionState::Running, Some(record.pid), Liveness::Responsive));
                        yield HealthEvent::Recovered { attempt, record };
                    }
                    Err(e) => {
                        warn!(code = %e.code(), "Automatic recovery failed: {e}");
                        last = None;
                        yield HealthEvent::RecoveryFailed { code: e.code(), message: e.to_string() };
                    }
                }
            }
        }
    }
}
