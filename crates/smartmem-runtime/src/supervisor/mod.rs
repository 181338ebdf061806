//! Process supervisor: start, stop, restart and status of the server.
//!
//! The supervisor keeps very little state of its own. Every operation first
//! re-derives ground truth from the PID registry, the port reconciler and a
//! liveness probe; the in-memory state only remembers what *this* supervisor
//! did, which is what distinguishes a crash from a server that was never
//! ours.
//!
//! Operations are serialized through an async mutex. Other actors (the
//! watchdog, a second host, a CLI invocation) are not locked out; they
//! converge through the same self-healing reads.

mod status;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use smartmem_core::{
    InvalidTransition, Liveness, Locator, PortBinding, ProcessRecord, ReasonCode,
    ResolvedPaths, SupervisionState, SupervisorConfig, SupervisorError, WatchdogHandle,
    paths::SERVER_BINARY_NAME,
};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::launch::{DetachedLauncher, LaunchSpec, Launcher, WatchdogSpec};
use crate::liveness;
use crate::os::{ProcessControl, platform_control};
use crate::pidfile::{Healed, PidRegistry};
use crate::reconcile::{ListenerSource, PortReconciler, platform_listeners};
use crate::recovery::RecoveryLedger;
use crate::shutdown::{EscalationFailure, Termination, TerminationEscalator};

pub use status::{RecoveryOutcome, RestartOutcome, ServerStatus, StartOutcome, StopOutcome};

/// Port-free checks after the stop phase of a restart.
const RESTART_PORT_ATTEMPTS: u32 = 3;

/// Interval between post-spawn probes.
const CONFIRM_POLL: Duration = Duration::from_millis(100);

/// OS-facing collaborators. Tests swap these for fakes.
#[derive(Debug, Clone)]
pub struct Components {
    pub control: Arc<dyn ProcessControl>,
    pub listeners: Arc<dyn ListenerSource>,
    pub launcher: Arc<dyn Launcher>,
}

impl Components {
    /// Real process control, listener enumeration and detached spawning.
    ///
    /// The watchdog runs from `config.watchdog_program`, or from the current
    /// executable when unset; that program must implement the `watchdog`
    /// subcommand.
    pub fn platform(config: &SupervisorConfig) -> Result<Self, SupervisorError> {
        let watchdog_program = match &config.watchdog_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()?,
        };
        Ok(Self {
            control: platform_control(),
            listeners: platform_listeners(),
            launcher: Arc::new(DetachedLauncher::new(
                watchdog_program,
                config.watchdog_log_file(),
            )),
        })
    }
}

/// Ground truth for the configured port.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observation {
    /// A server we manage exists (from the registry or adopted from the port).
    Managed { pid: u32, liveness: Liveness },
    /// The port is bound by something that is not ours.
    Foreign {
        owner: Option<PortBinding>,
        liveness: Liveness,
    },
    Free,
}

/// What this supervisor instance believes.
#[derive(Debug, Default)]
struct Inner {
    state: SupervisionState,
    record: Option<ProcessRecord>,
    watchdog: Option<WatchdogHandle>,
    /// Dead PID of a crash not yet handed to `recover()`.
    pending_crash: Option<u32>,
}

impl Inner {
    fn transition(&mut self, to: SupervisionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = %self.state, to = %to, "Supervision state change");
        self.state = to;
        Ok(())
    }

    /// Adopt a state re-derived from observation rather than driven by an
    /// operation.
    fn rederive(&mut self, to: SupervisionState) {
        if self.state != to {
            debug!(from = %self.state, to = %to, "Supervision state re-derived");
            self.state = to;
        }
    }
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    locator: Arc<dyn Locator>,
    control: Arc<dyn ProcessControl>,
    reconciler: PortReconciler,
    launcher: Arc<dyn Launcher>,
    registry: PidRegistry,
    watchdog_registry: PidRegistry,
    ledger: RecoveryLedger,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("port", &self.config.server.port)
            .field("registry", &self.registry.path())
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Supervisor using the real OS.
    pub fn new(config: SupervisorConfig, locator: Arc<dyn Locator>) -> Result<Self, SupervisorError> {
        let components = Components::platform(&config)?;
        Ok(Self::with_components(config, locator, components))
    }

    pub fn with_components(
        config: SupervisorConfig,
        locator: Arc<dyn Locator>,
        components: Components,
    ) -> Self {
        let Components {
            control,
            listeners,
            launcher,
        } = components;

        Self {
            registry: PidRegistry::new(config.server_pid_file(), Arc::clone(&control)),
            watchdog_registry: PidRegistry::new(config.watchdog_pid_file(), Arc::clone(&control)),
            ledger: RecoveryLedger::new(config.recovery_state_file()),
            reconciler: PortReconciler::new(listeners, Arc::clone(&control)),
            config,
            locator,
            control,
            launcher,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub async fn state(&self) -> SupervisionState {
        self.inner.lock().await.state
    }

    pub async fn record(&self) -> Option<ProcessRecord> {
        self.inner.lock().await.record.clone()
    }

    pub async fn watchdog(&self) -> Option<WatchdogHandle> {
        self.inner.lock().await.watchdog
    }

    /// Start the server, or confirm the one already running.
    ///
    /// Idempotent: a responsive managed server is left alone. An explicit
    /// start also resets the crash-recovery ledger.
    pub async fn start(&self) -> Result<StartOutcome, SupervisorError> {
        let mut inner = self.inner.lock().await;
        self.start_locked(&mut inner, true).await
    }

    /// Stop the server and its watchdog.
    ///
    /// Only reports success once the process is gone and the port is free.
    pub async fn stop(&self) -> Result<StopOutcome, SupervisorError> {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await
    }

    /// Stop, make sure the port is free, start.
    pub async fn restart(&self) -> Result<RestartOutcome, SupervisorError> {
        let mut inner = self.inner.lock().await;

        let previous_pid = match self.stop_locked(&mut inner).await? {
            StopOutcome::Stopped { pid, .. } => Some(pid),
            StopOutcome::NotRunning => None,
        };
        self.ensure_port_free().await?;

        let record = self.start_locked(&mut inner, true).await?.record().clone();
        info!(?previous_pid, pid = record.pid, "Server restarted");
        Ok(RestartOutcome {
            previous_pid,
            record,
        })
    }

    /// Re-derive the current state. Only side effect: registry self-healing
    /// (stale entries removed, a recognized port owner adopted).
    pub async fn status(&self) -> ServerStatus {
        let mut inner = self.inner.lock().await;
        self.status_locked(&mut inner).await
    }

    /// Status plus bounded automatic restart after a crash.
    ///
    /// Does nothing unless a crash was detected and `recovery.enabled` is set.
    /// Each failed attempt is counted in the ledger; once
    /// `recovery.max_restart_attempts` is reached the state becomes
    /// `Crashed` and only an explicit `start()` clears it.
    pub async fn recover(&self) -> Result<RecoveryOutcome, SupervisorError> {
        let mut inner = self.inner.lock().await;
        let status = self.status_locked(&mut inner).await;

        let Some(dead_pid) = inner.pending_crash else {
            return Ok(RecoveryOutcome::Idle(status));
        };
        if !self.config.recovery.enabled {
            debug!(dead_pid, "Crash detected, automatic recovery disabled");
            inner.pending_crash = None;
            return Ok(RecoveryOutcome::Idle(status));
        }
        if status.is_running() {
            // Someone else already brought a server back.
            inner.pending_crash = None;
            return Ok(RecoveryOutcome::Idle(status));
        }

        let max_attempts = self.config.recovery.max_restart_attempts;
        let ledger = self.ledger.load();
        let mut attempt = if ledger.exhausted {
            max_attempts
        } else {
            ledger.recovery_attempts
        };

        while attempt < max_attempts {
            attempt += 1;
            sleep(self.config.recovery.restart_delay()).await;
            if let Err(e) = self.ledger.record_attempt() {
                warn!("Failed to update recovery ledger: {e}");
            }
            info!(dead_pid, attempt, max_attempts, "Automatic restart");

            match self.start_locked(&mut inner, false).await {
                Ok(outcome) => {
                    if let Err(e) = self.ledger.record_recovered() {
                        warn!("Failed to update recovery ledger: {e}");
                    }
                    inner.pending_crash = None;
                    return Ok(RecoveryOutcome::Recovered {
                        attempt,
                        record: outcome.record().clone(),
                    });
                }
                Err(e) => warn!(code = %e.code(), attempt, "Automatic restart failed: {e}"),
            }
        }

        let attempts = self.ledger.load().recovery_attempts.max(attempt);
        if let Err(e) = self.ledger.mark_exhausted() {
            warn!("Failed to update recovery ledger: {e}");
        }
        inner.pending_crash = None;
        inner.rederive(SupervisionState::Crashed);
        error!(
            reason = %ReasonCode::RecoveryExhausted,
            attempts,
            "Automatic recovery gave up; explicit start required"
        );
        Err(SupervisorError::RecoveryExhausted { attempts })
    }

    async fn status_locked(&self, inner: &mut Inner) -> ServerStatus {
        let observation = self.refresh(inner).await;
        let (pid, liveness, foreign_owner) = match observation {
            Observation::Managed { pid, liveness } => (Some(pid), liveness, None),
            Observation::Foreign { owner, liveness } => (None, liveness, owner),
            Observation::Free => (None, Liveness::Unbound, None),
        };

        ServerStatus {
            state: inner.state,
            pid,
            liveness,
            port: self.config.server.port,
            record: inner.record.clone(),
            foreign_owner,
        }
    }

    async fn start_locked(
        &self,
        inner: &mut Inner,
        explicit: bool,
    ) -> Result<StartOutcome, SupervisorError> {
        let port = self.config.server.port;

        match self.refresh(inner).await {
            Observation::Managed {
                pid,
                liveness: Liveness::Responsive,
            } => {
                if explicit {
                    self.reset_ledger();
                }
                let record = self.ensure_record(inner, pid);
                info!(pid, port, "Server already running");
                return Ok(StartOutcome::AlreadyRunning(record));
            }
            Observation::Managed { pid, liveness } => {
                warn!(pid, port, %liveness, "Managed server not responsive, replacing it");
                self.terminate_managed(inner, pid).await?;
            }
            Observation::Foreign { owner, .. } => {
                warn!(
                    reason = %ReasonCode::PortInUseByOther,
                    port,
                    owner = ?owner,
                    "Refusing to start: port held by another process"
                );
                return Err(SupervisorError::PortInUseByOther { port, owner });
            }
            Observation::Free => {}
        }

        let paths = ResolvedPaths::from_locator(self.locator.as_ref())?;
        if !paths.binary_path.is_file() {
            error!(
                reason = %ReasonCode::BinaryNotFound,
                path = %paths.binary_path.display(),
                "Server binary missing"
            );
            return Err(SupervisorError::BinaryNotFound {
                path: paths.binary_path,
            });
        }

        inner.transition(SupervisionState::Starting)?;

        let spec = LaunchSpec::server(
            &paths.binary_path,
            &paths.config_path,
            &paths.database_path,
            &self.config.server_log_level,
            self.config.parent_pid,
            self.config.server_log_file(),
        )
        .with_args(self.config.tuning.server_args.iter().cloned());

        let pid = match self.launcher.spawn_server(&spec) {
            Ok(pid) => pid,
            Err(e) => {
                inner.transition(SupervisionState::Stopped)?;
                return Err(e);
            }
        };

        inner.watchdog = self.spawn_watchdog(pid);

        if let Err(e) = self.confirm_started(pid).await {
            self.abandon_spawn(inner, pid).await;
            inner.transition(SupervisionState::Stopped)?;
            return Err(e);
        }

        if let Err(e) = self.registry.write(pid) {
            // The server is up; a missing PID file only costs the next
            // operation a port reconciliation.
            warn!(pid, "Failed to write PID file: {e}");
        }
        let record = ProcessRecord::new(
            pid,
            port,
            paths.binary_path,
            paths.config_path,
            paths.database_path,
        );
        inner.record = Some(record.clone());
        inner.pending_crash = None;
        inner.transition(SupervisionState::Running)?;
        if explicit {
            self.reset_ledger();
        }

        info!(pid, port, "Server started");
        Ok(StartOutcome::Started(record))
    }

    async fn stop_locked(&self, inner: &mut Inner) -> Result<StopOutcome, SupervisorError> {
        let pid = match self.refresh(inner).await {
            Observation::Managed { pid, .. } => pid,
            Observation::Foreign { .. } | Observation::Free => {
                self.stop_watchdog(inner).await;
                if inner.state == SupervisionState::Crashed {
                    // An explicit stop closes the crash episode.
                    inner.pending_crash = None;
                    if let Err(e) = self.ledger.record_recovered() {
                        warn!("Failed to update recovery ledger: {e}");
                    }
                    inner.rederive(SupervisionState::Stopped);
                }
                debug!("Stop requested but no managed server is running");
                return Ok(StopOutcome::NotRunning);
            }
        };

        inner.transition(SupervisionState::Stopping)?;
        let forced = match self.terminate_pid(pid).await {
            Ok(forced) => forced,
            Err(e) => {
                if self.control.is_alive(pid) {
                    inner.transition(SupervisionState::Running)?;
                } else {
                    inner.record = None;
                    self.clear_registry_if(pid);
                    self.stop_watchdog(inner).await;
                    inner.transition(SupervisionState::Stopped)?;
                }
                return Err(e);
            }
        };

        self.clear_registry_if(pid);
        self.stop_watchdog(inner).await;
        inner.record = None;
        inner.transition(SupervisionState::Stopped)?;
        info!(pid, forced, "Server stopped");
        Ok(StopOutcome::Stopped { pid, forced })
    }

    /// Re-derive ground truth and fold it into `inner`.
    async fn refresh(&self, inner: &mut Inner) -> Observation {
        let port = self.config.server.port;
        let expected = self.expected_binary_name();

        let observation = match self.registry.heal() {
            Healed::Live(pid) if self.is_reused_pid(pid, &expected) => {
                info!(
                    reason = %ReasonCode::StalePidFileRepaired,
                    pid,
                    "PID file names an unrelated process, discarding"
                );
                self.clear_registry_if(pid);
                self.observe_port(&expected).await
            }
            Healed::Live(pid) => Observation::Managed {
                pid,
                liveness: self.probe().await,
            },
            Healed::Repaired(stale) => {
                if let Some(pid) = stale {
                    self.note_crash(inner, pid, "PID file pointed at a process that is gone");
                }
                self.observe_port(&expected).await
            }
            Healed::Absent => self.observe_port(&expected).await,
        };

        match &observation {
            Observation::Managed { pid, .. } => {
                self.ensure_record(inner, *pid);
                inner.rederive(SupervisionState::Running);
            }
            Observation::Foreign { .. } | Observation::Free => {
                if let Some(record) = inner.record.take() {
                    if inner.state == SupervisionState::Running {
                        self.note_crash(inner, record.pid, "server exited without a stop");
                        inner.rederive(SupervisionState::Crashed);
                    }
                } else if self.ledger.load().exhausted {
                    inner.rederive(SupervisionState::Crashed);
                } else if inner.state != SupervisionState::Crashed {
                    inner.rederive(SupervisionState::Stopped);
                }
            }
        }

        debug!(port, state = %inner.state, ?observation, "Observed server");
        observation
    }

    /// Registry empty or stale: ask the OS who listens on the port.
    async fn observe_port(&self, expected: &str) -> Observation {
        let port = self.config.server.port;
        let owners = self.reconciler.find_owners(port);

        if let Some(managed) = owners
            .iter()
            .find(|owner| PortReconciler::is_managed_server(owner, expected))
        {
            let pid = managed.owner_pid;
            info!(pid, port, "Adopting managed server found on port");
            if let Err(e) = self.registry.write(pid) {
                warn!(pid, "Failed to repair PID file: {e}");
            }
            return Observation::Managed {
                pid,
                liveness: self.probe().await,
            };
        }

        let liveness = self.probe().await;
        match owners.into_iter().next() {
            Some(owner) => Observation::Foreign {
                owner: Some(owner),
                liveness,
            },
            None if liveness.is_bound() => Observation::Foreign {
                owner: None,
                liveness,
            },
            None => Observation::Free,
        }
    }

    async fn probe(&self) -> Liveness {
        liveness::probe(
            &self.config.server.host,
            self.config.server.port,
            self.config.probe_timeout(),
        )
        .await
    }

    /// Poll the spawned server within the startup grace period.
    ///
    /// Success needs a responsive port, our PID still alive, and our PID
    /// among the port's listeners. Anything else answering means a competing
    /// process won the bind.
    async fn confirm_started(&self, pid: u32) -> Result<(), SupervisorError> {
        let host = &self.config.server.host;
        let port = self.config.server.port;
        let grace = self.config.startup_grace();
        let started = Instant::now();
        let deadline = started + grace;

        loop {
            if !self.control.is_alive(pid) {
                warn!(pid, port, "Server exited during startup");
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let limit = self
                .config
                .confirm_probe_timeout()
                .min(remaining)
                .max(CONFIRM_POLL);
            if liveness::probe(host, port, limit).await == Liveness::Responsive
                && self.control.is_alive(pid)
            {
                let owners = self.reconciler.find_owners(port);
                // No listener table available: the probe is all we have.
                if owners.is_empty() || owners.iter().any(|owner| owner.owner_pid == pid) {
                    debug!(pid, elapsed = ?started.elapsed(), "Server responsive");
                    return Ok(());
                }

                let expected = self.expected_binary_name();
                if let Some(foreign) = owners
                    .iter()
                    .find(|owner| !PortReconciler::is_managed_server(owner, &expected))
                {
                    warn!(
                        reason = %ReasonCode::PortInUseByOther,
                        pid,
                        port,
                        owner = %foreign,
                        "Port taken by another process during startup"
                    );
                    return Err(SupervisorError::PortInUseByOther {
                        port,
                        owner: Some(foreign.clone()),
                    });
                }
                warn!(pid, port, ?owners, "Another server instance won the bind");
                break;
            }

            if Instant::now() >= deadline {
                break;
            }
            sleep(CONFIRM_POLL).await;
        }

        error!(
            reason = %ReasonCode::ProcessUnresponsive,
            pid,
            port,
            "Server did not become responsive within {grace:?}"
        );
        Err(SupervisorError::ProcessUnresponsive {
            pid,
            port,
            waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Clean up after a start that was not confirmed.
    ///
    /// Only our own PID is terminated: whatever else holds the port was not
    /// started by this attempt. The watchdog goes last so the server is
    /// never left without one.
    async fn abandon_spawn(&self, inner: &mut Inner, pid: u32) {
        if self.control.is_alive(pid) {
            let stopped = self
                .escalator()
                .stop_process(pid, self.config.startup_grace(), self.config.server.force_timeout())
                .await;
            if let Err(failure) = stopped {
                warn!(pid, "Cleanup of failed start incomplete: {failure}");
            }
        }
        self.clear_registry_if(pid);
        self.stop_watchdog(inner).await;
    }

    /// Kill an unresponsive managed server before replacing it.
    async fn terminate_managed(&self, inner: &mut Inner, pid: u32) -> Result<(), SupervisorError> {
        inner.transition(SupervisionState::Stopping)?;
        match self.terminate_pid(pid).await {
            Ok(_) => {
                self.clear_registry_if(pid);
                self.stop_watchdog(inner).await;
                inner.record = None;
                inner.transition(SupervisionState::Stopped)?;
                Ok(())
            }
            Err(e) => {
                inner.transition(SupervisionState::Running)?;
                Err(e)
            }
        }
    }

    /// Escalate against `pid`; map failures to the error taxonomy.
    async fn terminate_pid(&self, pid: u32) -> Result<bool, SupervisorError> {
        let outcome = self
            .escalator()
            .terminate(
                pid,
                self.config.server.grace_period(),
                self.config.server.force_timeout(),
            )
            .await;

        match outcome {
            Termination::Terminated { forced } => Ok(forced),
            Termination::Failed(failure) => {
                error!(reason = %ReasonCode::KillFailed, pid, "Termination failed: {failure}");
                Err(self.escalation_error(pid, failure))
            }
        }
    }

    fn escalation_error(&self, pid: u32, failure: EscalationFailure) -> SupervisorError {
        match failure {
            EscalationFailure::PortHeldByForeign(owner) => SupervisorError::PortInUseByOther {
                port: self.config.server.port,
                owner: Some(owner),
            },
            other => SupervisorError::KillFailed {
                pid,
                reason: other.to_string(),
            },
        }
    }

    /// Between stop and start of a restart: the port must be free. Managed
    /// leftovers get force-killed, bounded by a few attempts.
    async fn ensure_port_free(&self) -> Result<(), SupervisorError> {
        let escalator = self.escalator();
        for attempt in 1..=RESTART_PORT_ATTEMPTS {
            if escalator.port_is_free().await {
                return Ok(());
            }
            debug!(attempt, port = escalator.port(), "Port still bound after stop");
            if let Err(failure) = escalator.force_release_port(None) {
                return Err(self.escalation_error(0, failure));
            }
            sleep(Duration::from_millis(200) * attempt).await;
        }

        if escalator.port_is_free().await {
            return Ok(());
        }
        let owner = self.reconciler.find_owners(escalator.port()).into_iter().next();
        Err(SupervisorError::KillFailed {
            pid: owner.as_ref().map_or(0, |o| o.owner_pid),
            reason: format!(
                "port {} still bound after {RESTART_PORT_ATTEMPTS} attempts",
                escalator.port()
            ),
        })
    }

    fn spawn_watchdog(&self, server_pid: u32) -> Option<WatchdogHandle> {
        if !self.config.tuning.watchdog_enabled {
            return None;
        }
        let parent_pid = self.config.parent_pid?;

        let spec = WatchdogSpec {
            parent_pid,
            server_pid,
            host: self.config.server.host.clone(),
            port: self.config.server.port,
            poll_interval: self.config.watchdog_poll_interval(),
            grace_period: self.config.server.grace_period(),
            force_timeout: self.config.server.force_timeout(),
            data_dir: self.config.data_dir.clone(),
            server_binary_name: self.expected_binary_name(),
        };

        match self.launcher.spawn_watchdog(&spec) {
            Ok(watchdog_pid) => {
                if let Err(e) = self.watchdog_registry.write(watchdog_pid) {
                    warn!(watchdog_pid, "Failed to write watchdog PID file: {e}");
                }
                Some(WatchdogHandle {
                    watchdog_pid,
                    monitored_parent_pid: parent_pid,
                    monitored_server_pid: server_pid,
                })
            }
            Err(e) => {
                // The server runs fine without it; only orphan cleanup is lost.
                warn!(server_pid, "Failed to spawn watchdog: {e}");
                None
            }
        }
    }

    /// Stop the watchdog, ours or one left behind by another supervisor.
    ///
    /// Called after the server is gone, so the watchdog's own cleanup on
    /// SIGTERM finds nothing to do and exits quickly.
    async fn stop_watchdog(&self, inner: &mut Inner) {
        let from_memory = inner.watchdog.take().map(|handle| handle.watchdog_pid);
        let Some(pid) = from_memory.or_else(|| self.watchdog_registry.read()) else {
            return;
        };

        if self.control.is_alive(pid) && !self.is_watchdog(pid) {
            info!(
                reason = %ReasonCode::StalePidFileRepaired,
                pid,
                "Watchdog PID file names an unrelated process, discarding"
            );
        } else if self.control.is_alive(pid) {
            if let Err(e) = self.control.request_stop(pid) {
                warn!(pid, "Failed to signal watchdog: {e}");
            }
            let window = self.config.server.force_timeout() + Duration::from_secs(2);
            if !wait_for_exit(self.control.as_ref(), pid, window).await {
                warn!(pid, "Watchdog ignored stop request, forcing");
                if let Err(e) = self.control.force_kill(pid) {
                    warn!(pid, "Forced kill of watchdog failed: {e}");
                }
            }
        }

        match self.watchdog_registry.clear_if(pid) {
            Ok(_) => debug!(pid, "Watchdog stopped"),
            Err(e) => warn!(pid, "Failed to clear watchdog PID file: {e}"),
        }
    }

    fn note_crash(&self, inner: &mut Inner, pid: u32, detail: &str) {
        if inner.pending_crash == Some(pid) {
            return;
        }
        warn!(reason = %ReasonCode::CrashDetected, pid, "Server crash detected: {detail}");
        inner.pending_crash = Some(pid);
        if let Err(e) = self
            .ledger
            .record_crash(ReasonCode::CrashDetected, &format!("pid {pid}: {detail}"))
        {
            warn!("Failed to update recovery ledger: {e}");
        }
    }

    fn ensure_record(&self, inner: &mut Inner, pid: u32) -> ProcessRecord {
        if let Some(record) = inner.record.as_ref().filter(|r| r.pid == pid) {
            return record.clone();
        }
        let record = ProcessRecord::new(
            pid,
            self.config.server.port,
            self.locator.binary_path().unwrap_or_default(),
            self.locator.config_path().unwrap_or_default(),
            self.locator.database_path().unwrap_or_default(),
        );
        inner.record = Some(record.clone());
        record
    }

    /// PID reuse: the registry PID is alive but is visibly not our server.
    /// An unreadable command line trusts the registry.
    fn is_reused_pid(&self, pid: u32, expected: &str) -> bool {
        self.control
            .command_line(pid)
            .is_some_and(|cmd| !expected.is_empty() && !cmd.contains(expected))
    }

    /// A watchdog runs our `watchdog` subcommand with `--server-pid`. An
    /// unreadable command line trusts the PID file.
    fn is_watchdog(&self, pid: u32) -> bool {
        self.control
            .command_line(pid)
            .is_none_or(|cmd| cmd.contains("watchdog") && cmd.contains("--server-pid"))
    }

    fn expected_binary_name(&self) -> String {
        self.locator
            .binary_path()
            .ok()
            .as_deref()
            .and_then(|path| path.file_stem())
            .map_or_else(
                || SERVER_BINARY_NAME.to_string(),
                |stem| stem.to_string_lossy().into_owned(),
            )
    }

    fn escalator(&self) -> TerminationEscalator {
        TerminationEscalator::new(
            Arc::clone(&self.control),
            self.reconciler.clone(),
            self.config.server.host.clone(),
            self.config.server.port,
            self.expected_binary_name(),
        )
    }

    fn clear_registry_if(&self, pid: u32) {
        if let Err(e) = self.registry.clear_if(pid) {
            warn!(pid, "Failed to clear PID file: {e}");
        }
    }

    fn reset_ledger(&self) {
        if let Err(e) = self.ledger.reset() {
            warn!("Failed to reset recovery ledger: {e}");
        }
    }
}

async fn wait_for_exit(control: &dyn ProcessControl, pid: u32, window: Duration) -> bool {
    let deadline = Instant::now() + window;
    while control.is_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(50)).await;
    }
    true
}

#[cfg(test)]
mod tests;
