//! Supervisor tests against a simulated process table.
//!
//! Simulated servers hold real loopback listeners so liveness probes behave
//! exactly as in production; killing a simulated process drops its listener.

use std::collections::HashMap;
use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use mockall::mock;
use smartmem_core::{LocateError, Locator, ResolvedPaths, SupervisionState, SupervisorConfig};
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::launch::{LaunchSpec, Launcher, WatchdogSpec};
use crate::os::Delivery;
use crate::reconcile::ListenerSource;

mock! {
    pub Paths {}
    impl Locator for Paths {
        fn binary_path(&self) -> Result<PathBuf, LocateError>;
        fn config_path(&self) -> Result<PathBuf, LocateError>;
        fn data_dir(&self) -> Result<PathBuf, LocateError>;
    }
}

struct SimProcess {
    command_line: String,
    obeys_term: bool,
    /// Survives SIGKILL too.
    unkillable: bool,
    listener: Option<TcpListener>,
    /// Takes over the listener when this process exits on SIGTERM.
    heir: Option<(u32, String)>,
}

/// Process table shared by the fake control, listener source and launcher.
#[derive(Default)]
struct World {
    procs: Mutex<HashMap<u32, SimProcess>>,
    /// PIDs in the order they left the table.
    exits: Mutex<Vec<u32>>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World").finish_non_exhaustive()
    }
}

impl World {
    fn add(&self, pid: u32, command_line: &str, obeys_term: bool, listen_on: Option<u16>) {
        let listener = listen_on.map(|port| TcpListener::bind(("127.0.0.1", port)).expect("bind"));
        self.procs.lock().unwrap().insert(
            pid,
            SimProcess {
                command_line: command_line.to_string(),
                obeys_term,
                unkillable: false,
                listener,
                heir: None,
            },
        );
    }

    fn make_unkillable(&self, pid: u32) {
        if let Some(p) = self.procs.lock().unwrap().get_mut(&pid) {
            p.unkillable = true;
        }
    }

    /// On SIGTERM, `pid` exits but its socket lives on in `heir_pid`, which
    /// ignores SIGTERM.
    fn bequeath(&self, pid: u32, heir_pid: u32, heir_command_line: &str) {
        if let Some(p) = self.procs.lock().unwrap().get_mut(&pid) {
            p.heir = Some((heir_pid, heir_command_line.to_string()));
        }
    }

    /// Process dies without anyone asking.
    fn crash(&self, pid: u32) {
        if self.procs.lock().unwrap().remove(&pid).is_some() {
            self.exits.lock().unwrap().push(pid);
        }
    }

    fn exits(&self) -> Vec<u32> {
        self.exits.lock().unwrap().clone()
    }
}

impl ProcessControl for World {
    fn is_alive(&self, pid: u32) -> bool {
        self.procs.lock().unwrap().contains_key(&pid)
    }

    fn request_stop(&self, pid: u32) -> io::Result<Delivery> {
        let mut procs = self.procs.lock().unwrap();
        match procs.get(&pid) {
            None => Ok(Delivery::NoSuchProcess),
            Some(p) if p.obeys_term => {
                if let Some(gone) = procs.remove(&pid) {
                    self.exits.lock().unwrap().push(pid);
                    if let Some((heir_pid, command_line)) = gone.heir {
                        procs.insert(
                            heir_pid,
                            SimProcess {
                                command_line,
                                obeys_term: false,
                                unkillable: false,
                                listener: gone.listener,
                                heir: None,
                            },
                        );
                    }
                }
                Ok(Delivery::Sent)
            }
            Some(_) => Ok(Delivery::Sent),
        }
    }

    fn force_kill(&self, pid: u32) -> io::Result<Delivery> {
        let mut procs = self.procs.lock().unwrap();
        match procs.get(&pid) {
            None => Ok(Delivery::NoSuchProcess),
            Some(p) if p.unkillable => Ok(Delivery::Sent),
            Some(_) => {
                procs.remove(&pid);
                self.exits.lock().unwrap().push(pid);
                Ok(Delivery::Sent)
            }
        }
    }

    fn command_line(&self, pid: u32) -> Option<String> {
        self.procs
            .lock()
            .unwrap()
            .get(&pid)
            .map(|p| p.command_line.clone())
    }
}

impl ListenerSource for World {
    fn listening_pids(&self, port: u16) -> io::Result<Vec<u32>> {
        Ok(self
            .procs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| {
                p.listener
                    .as_ref()
                    .and_then(|l| l.local_addr().ok())
                    .is_some_and(|addr| addr.port() == port)
            })
            .map(|(pid, _)| *pid)
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnMode {
    /// Binds the port and obeys SIGTERM.
    Serving,
    /// Binds the port, ignores SIGTERM.
    Stubborn,
    /// Alive but never binds.
    Silent,
    /// Alive but never binds; a process with this command line (pid
    /// [`RIVAL_PID`]) grabs the port at the same moment.
    Contested(&'static str),
}

const RIVAL_PID: u32 = 9001;

#[derive(Debug)]
struct SimLauncher {
    world: Arc<World>,
    port: u16,
    next_pid: AtomicU32,
    mode: Mutex<SpawnMode>,
    servers: Mutex<Vec<LaunchSpec>>,
    watchdogs: Mutex<Vec<WatchdogSpec>>,
}

impl SimLauncher {
    fn new(world: Arc<World>, port: u16) -> Self {
        Self {
            world,
            port,
            next_pid: AtomicU32::new(1000),
            mode: Mutex::new(SpawnMode::Serving),
            servers: Mutex::default(),
            watchdogs: Mutex::default(),
        }
    }

    fn set_mode(&self, mode: SpawnMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn server_spawns(&self) -> usize {
        self.servers.lock().unwrap().len()
    }
}

impl Launcher for SimLauncher {
    fn spawn_server(&self, spec: &LaunchSpec) -> Result<u32, SupervisorError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let cmd = spec.program.display().to_string();
        match *self.mode.lock().unwrap() {
            SpawnMode::Serving => self.world.add(pid, &cmd, true, Some(self.port)),
            SpawnMode::Stubborn => self.world.add(pid, &cmd, false, Some(self.port)),
            SpawnMode::Silent => self.world.add(pid, &cmd, true, None),
            SpawnMode::Contested(rival) => {
                self.world.add(pid, &cmd, true, None);
                self.world.add(RIVAL_PID, rival, true, Some(self.port));
            }
        }
        self.servers.lock().unwrap().push(spec.clone());
        Ok(pid)
    }

    fn spawn_watchdog(&self, spec: &WatchdogSpec) -> Result<u32, SupervisorError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let cmd = format!(
            "smartmem watchdog --parent-pid {} --server-pid {}",
            spec.parent_pid, spec.server_pid
        );
        self.world.add(pid, &cmd, true, None);
        self.watchdogs.lock().unwrap().push(spec.clone());
        Ok(pid)
    }
}

const HOST_PID: u32 = 1;

struct Harness {
    dir: tempfile::TempDir,
    port: u16,
    world: Arc<World>,
    launcher: Arc<SimLauncher>,
    supervisor: ProcessSupervisor,
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

fn test_config(dir: &Path, port: u16) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(dir).with_parent_pid(Some(HOST_PID));
    config.server.port = port;
    config.server.shutdown_timeout_seconds = 1;
    config.server.force_kill_timeout_seconds = 1;
    config.tuning.startup_grace_ms = 500;
    config.tuning.probe_timeout_ms = 200;
    config.tuning.confirm_probe_timeout_ms = 200;
    config.recovery.restart_delay_seconds = 0;
    config.recovery.max_restart_attempts = 2;
    config
}

fn resolved_paths(dir: &Path) -> ResolvedPaths {
    let binary_path = dir.join("smart-memory-server");
    std::fs::write(&binary_path, b"").expect("write binary");
    ResolvedPaths {
        binary_path,
        config_path: dir.join("config.json"),
        data_dir: dir.to_path_buf(),
        database_path: dir.join("memories.db"),
    }
}

fn harness_with(tweak: impl FnOnce(&mut SupervisorConfig)) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();
    let world = Arc::new(World::default());
    world.add(HOST_PID, "code --host", true, None);
    let launcher = Arc::new(SimLauncher::new(Arc::clone(&world), port));

    let mut config = test_config(dir.path(), port);
    tweak(&mut config);
    let supervisor = ProcessSupervisor::with_components(
        config,
        Arc::new(resolved_paths(dir.path())),
        Components {
            control: world.clone(),
            listeners: world.clone(),
            launcher: launcher.clone(),
        },
    );

    Harness {
        dir,
        port,
        world,
        launcher,
        supervisor,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

impl Harness {
    fn pid_file(&self) -> PathBuf {
        self.dir.path().join("server.pid")
    }

    fn pid_file_content(&self) -> Option<String> {
        std::fs::read_to_string(self.pid_file()).ok()
    }
}

#[tokio::test]
async fn start_spawns_confirms_and_commits() {
    let h = harness();

    let outcome = assert_ok!(h.supervisor.start().await);
    let StartOutcome::Started(record) = outcome else {
        panic!("expected a fresh start, got {outcome:?}");
    };

    assert_eq!(record.bound_port, h.port);
    assert_eq!(h.pid_file_content(), Some(format!("{}\n", record.pid)));
    assert_eq!(h.supervisor.state().await, SupervisionState::Running);

    let status = h.supervisor.status().await;
    assert!(status.is_running());
    assert_eq!(status.pid, Some(record.pid));
    assert_eq!(status.liveness, Liveness::Responsive);

    let spawned = h.launcher.servers.lock().unwrap().clone();
    assert_eq!(spawned.len(), 1);
    assert_eq!(
        spawned[0].env_value("DB_PATH").map(|v| PathBuf::from(v.clone())),
        Some(h.dir.path().join("memories.db"))
    );
}

#[tokio::test]
async fn start_pairs_a_watchdog_with_the_server() {
    let h = harness();
    let record = assert_ok!(h.supervisor.start().await).record().clone();

    let watchdogs = h.launcher.watchdogs.lock().unwrap().clone();
    assert_eq!(watchdogs.len(), 1);
    assert_eq!(watchdogs[0].parent_pid, HOST_PID);
    assert_eq!(watchdogs[0].server_pid, record.pid);
    assert_eq!(watchdogs[0].server_binary_name, "smart-memory-server");

    let handle = h.supervisor.watchdog().await.expect("watchdog handle");
    assert!(h.world.is_alive(handle.watchdog_pid));
    assert!(h.dir.path().join("watchdog.pid").exists());
}

#[tokio::test]
async fn no_watchdog_without_parent_pid() {
    let h = harness_with(|c| c.parent_pid = None);
    assert_ok!(h.supervisor.start().await);
    assert!(h.launcher.watchdogs.lock().unwrap().is_empty());
    assert!(h.supervisor.watchdog().await.is_none());
}

#[tokio::test]
async fn start_is_idempotent() {
    let h = harness();
    let first = assert_ok!(h.supervisor.start().await);
    let second = assert_ok!(h.supervisor.start().await);

    assert!(matches!(second, StartOutcome::AlreadyRunning(_)));
    assert_eq!(first.record().pid, second.record().pid);
    assert_eq!(h.launcher.server_spawns(), 1);
}

#[tokio::test]
async fn stale_pid_file_is_cleared_and_reports_stopped() {
    let h = harness();
    std::fs::write(h.pid_file(), "999999\n").expect("write");

    let status = h.supervisor.status().await;
    assert_eq!(status.state, SupervisionState::Stopped);
    assert_eq!(status.pid, None);
    assert!(!h.pid_file().exists());

    // And start proceeds as if there never was a file.
    let outcome = assert_ok!(h.supervisor.start().await);
    assert!(matches!(outcome, StartOutcome::Started(_)));
}

#[tokio::test]
async fn foreign_port_owner_blocks_start_and_survives() {
    let h = harness();
    h.world
        .add(77, "python3 -m http.server", true, Some(h.port));

    let err = assert_err!(h.supervisor.start().await);
    assert_eq!(err.code(), ReasonCode::PortInUseByOther);
    assert!(matches!(
        err,
        SupervisorError::PortInUseByOther { owner: Some(ref o), .. } if o.owner_pid == 77
    ));
    assert!(h.world.is_alive(77));
    assert_eq!(h.launcher.server_spawns(), 0);

    let status = h.supervisor.status().await;
    assert_eq!(status.state, SupervisionState::Stopped);
    assert_eq!(status.foreign_owner.map(|o| o.owner_pid), Some(77));
}

#[tokio::test]
async fn managed_port_owner_is_adopted() {
    let h = harness();
    h.world.add(
        55,
        "/usr/local/bin/smart-memory-server --verbose",
        true,
        Some(h.port),
    );

    let status = h.supervisor.status().await;
    assert_eq!(status.state, SupervisionState::Running);
    assert_eq!(status.pid, Some(55));
    assert_eq!(h.pid_file_content().as_deref(), Some("55\n"));

    let outcome = assert_ok!(h.supervisor.start().await);
    assert_eq!(outcome, StartOutcome::AlreadyRunning(outcome.record().clone()));
    assert_eq!(h.launcher.server_spawns(), 0);
}

#[tokio::test]
async fn reused_pid_in_registry_is_discarded() {
    let h = harness();
    h.world.add(4242, "/usr/bin/vim notes.txt", true, None);
    std::fs::write(h.pid_file(), "4242\n").expect("write");

    let status = h.supervisor.status().await;
    assert_eq!(status.state, SupervisionState::Stopped);
    assert!(!h.pid_file().exists());
    assert!(h.world.is_alive(4242));
}

#[tokio::test]
async fn missing_binary_fails_without_spawning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();
    let world = Arc::new(World::default());
    let launcher = Arc::new(SimLauncher::new(Arc::clone(&world), port));

    let mut locator = MockPaths::new();
    locator
        .expect_binary_path()
        .returning(|| Err(LocateError::BinaryNotFound { searched: vec![] }));
    let data = dir.path().to_path_buf();
    locator
        .expect_config_path()
        .returning(move || Ok(PathBuf::from("config.json")));
    locator.expect_data_dir().returning(move || Ok(data.clone()));

    let supervisor = ProcessSupervisor::with_components(
        test_config(dir.path(), port),
        Arc::new(locator),
        Components {
            control: world.clone(),
            listeners: world.clone(),
            launcher: launcher.clone(),
        },
    );

    let err = assert_err!(supervisor.start().await);
    assert_eq!(err.code(), ReasonCode::BinaryNotFound);
    assert_eq!(launcher.server_spawns(), 0);
    assert_eq!(supervisor.state().await, SupervisionState::Stopped);
}

#[tokio::test]
async fn unresponsive_spawn_is_cleaned_up() {
    let h = harness();
    h.launcher.set_mode(SpawnMode::Silent);

    let err = assert_err!(h.supervisor.start().await);
    let SupervisorError::ProcessUnresponsive { pid, port, .. } = err else {
        panic!("expected ProcessUnresponsive, got {err:?}");
    };

    assert_eq!(port, h.port);
    assert!(!h.world.is_alive(pid));
    assert!(!h.pid_file().exists());
    assert!(h.supervisor.watchdog().await.is_none());
    assert_eq!(h.supervisor.state().await, SupervisionState::Stopped);

    // Server first, then its watchdog.
    let watchdog_pid = h.launcher.watchdogs.lock().unwrap()[0].server_pid + 1;
    assert_eq!(h.world.exits(), vec![pid, watchdog_pid]);
}

#[tokio::test]
async fn start_fails_when_another_instance_wins_the_bind() {
    let h = harness();
    h.launcher
        .set_mode(SpawnMode::Contested("/opt/smartmem/smart-memory-server --port 0"));

    let err = assert_err!(h.supervisor.start().await);
    let SupervisorError::ProcessUnresponsive { pid, .. } = err else {
        panic!("expected ProcessUnresponsive, got {err:?}");
    };

    assert!(!h.world.is_alive(pid));
    // Not started by this attempt, so not ours to kill.
    assert!(h.world.is_alive(RIVAL_PID));
    assert!(!h.pid_file().exists());
    assert_eq!(h.supervisor.state().await, SupervisionState::Stopped);
}

#[tokio::test]
async fn start_fails_when_a_foreign_process_takes_the_port() {
    let h = harness();
    h.launcher
        .set_mode(SpawnMode::Contested("python3 -m http.server"));

    let err = assert_err!(h.supervisor.start().await);
    assert!(matches!(
        err,
        SupervisorError::PortInUseByOther { owner: Some(ref o), .. } if o.owner_pid == RIVAL_PID
    ));
    assert!(h.world.is_alive(RIVAL_PID));
    assert!(!h.world.is_alive(1000));
    assert!(!h.pid_file().exists());
}

#[tokio::test]
async fn unresponsive_registered_server_is_replaced() {
    let h = harness();
    h.world
        .add(500, "/opt/smartmem/smart-memory-server", true, None);
    std::fs::write(h.pid_file(), "500\n").expect("write");

    let outcome = assert_ok!(h.supervisor.start().await);
    let StartOutcome::Started(record) = outcome else {
        panic!("expected a fresh start, got {outcome:?}");
    };

    assert_ne!(record.pid, 500);
    assert!(!h.world.is_alive(500));
    assert_eq!(h.launcher.server_spawns(), 1);
    assert_eq!(h.pid_file_content(), Some(format!("{}\n", record.pid)));
}

#[tokio::test]
async fn stop_escalates_and_confirms_port_release() {
    let h = harness();
    h.launcher.set_mode(SpawnMode::Stubborn);
    let record = assert_ok!(h.supervisor.start().await).record().clone();
    let watchdog = h.supervisor.watchdog().await.expect("watchdog");

    let outcome = assert_ok!(h.supervisor.stop().await);
    assert_eq!(
        outcome,
        StopOutcome::Stopped {
            pid: record.pid,
            forced: true
        }
    );
    assert!(!h.world.is_alive(record.pid));
    assert!(!h.world.is_alive(watchdog.watchdog_pid));
    assert!(!h.pid_file().exists());
    assert!(!h.dir.path().join("watchdog.pid").exists());
    assert_eq!(
        liveness::probe("127.0.0.1", h.port, Duration::from_millis(200)).await,
        Liveness::Unbound
    );
    assert_eq!(h.supervisor.state().await, SupervisionState::Stopped);
}

#[tokio::test]
async fn stop_without_server_is_a_no_op() {
    let h = harness();
    assert_eq!(
        assert_ok!(h.supervisor.stop().await),
        StopOutcome::NotRunning
    );
}

#[tokio::test]
async fn stop_ignores_unrelated_process_in_watchdog_pid_file() {
    let h = harness();
    let watchdog_file = h.dir.path().join("watchdog.pid");
    h.world.add(4242, "/usr/bin/vim notes.txt", true, None);
    std::fs::write(&watchdog_file, "4242\n").expect("write");

    assert_eq!(
        assert_ok!(h.supervisor.stop().await),
        StopOutcome::NotRunning
    );
    assert!(h.world.is_alive(4242));
    assert!(!watchdog_file.exists());
}

#[tokio::test]
async fn stop_reports_unkillable_server_and_keeps_it_registered() {
    let h = harness();
    h.world
        .add(300, "/opt/smartmem/smart-memory-server", false, Some(h.port));
    h.world.make_unkillable(300);
    std::fs::write(h.pid_file(), "300\n").expect("write");

    let err = assert_err!(h.supervisor.stop().await);
    assert!(matches!(err, SupervisorError::KillFailed { pid: 300, .. }));
    assert_eq!(err.code(), ReasonCode::KillFailed);

    assert!(h.world.is_alive(300));
    assert_eq!(h.supervisor.state().await, SupervisionState::Running);
    assert_eq!(h.pid_file_content().as_deref(), Some("300\n"));
}

#[tokio::test]
async fn stop_after_crash_settles_on_stopped() {
    let h = harness();
    let pid = assert_ok!(h.supervisor.start().await).record().pid;
    h.world.crash(pid);
    assert_eq!(h.supervisor.status().await.state, SupervisionState::Crashed);

    assert_eq!(
        assert_ok!(h.supervisor.stop().await),
        StopOutcome::NotRunning
    );
    assert_eq!(h.supervisor.state().await, SupervisionState::Stopped);
    assert_eq!(h.supervisor.status().await.state, SupervisionState::Stopped);
    assert!(!h.dir.path().join("watchdog.pid").exists());
}

#[tokio::test]
async fn restart_produces_a_new_pid() {
    let h = harness();
    let before = assert_ok!(h.supervisor.start().await).record().pid;

    let outcome = assert_ok!(h.supervisor.restart().await);
    assert_eq!(outcome.previous_pid, Some(before));
    assert_ne!(outcome.record.pid, before);
    assert!(!h.world.is_alive(before));
    assert_eq!(
        h.pid_file_content(),
        Some(format!("{}\n", outcome.record.pid))
    );
}

#[tokio::test]
async fn restart_kills_a_managed_process_left_on_the_port() {
    let h = harness();
    let before = assert_ok!(h.supervisor.start().await).record().pid;
    h.world
        .bequeath(before, 60, "/opt/smartmem/smart-memory-server --worker");

    let outcome = assert_ok!(h.supervisor.restart().await);
    assert_eq!(outcome.previous_pid, Some(before));
    assert!(!h.world.is_alive(60));
    assert!(h.world.is_alive(outcome.record.pid));
}

#[tokio::test]
async fn restart_fails_when_a_foreign_process_holds_the_port_after_stop() {
    let h = harness();
    let before = assert_ok!(h.supervisor.start().await).record().pid;
    h.world.bequeath(before, 77, "python3 -m http.server");

    let err = assert_err!(h.supervisor.restart().await);
    assert_eq!(err.code(), ReasonCode::PortInUseByOther);
    assert!(h.world.is_alive(77));
    assert!(!h.world.is_alive(before));
    assert_eq!(h.launcher.server_spawns(), 1);
    assert_eq!(h.supervisor.state().await, SupervisionState::Stopped);
}

#[tokio::test]
async fn port_check_between_restart_phases_kills_managed_leftovers() {
    let h = harness();
    h.world
        .add(60, "/opt/smartmem/smart-memory-server --orphan", false, Some(h.port));

    assert_ok!(h.supervisor.ensure_port_free().await);
    assert!(!h.world.is_alive(60));
}

#[tokio::test]
async fn port_check_between_restart_phases_spares_foreign_owner() {
    let h = harness();
    h.world
        .add(77, "python3 -m http.server", true, Some(h.port));

    let err = assert_err!(h.supervisor.ensure_port_free().await);
    assert!(matches!(
        err,
        SupervisorError::PortInUseByOther { owner: Some(ref o), .. } if o.owner_pid == 77
    ));
    assert!(h.world.is_alive(77));
}

#[tokio::test]
async fn vanished_server_is_reported_crashed() {
    let h = harness();
    let pid = assert_ok!(h.supervisor.start().await).record().pid;

    h.world.crash(pid);
    let status = h.supervisor.status().await;

    assert_eq!(status.state, SupervisionState::Crashed);
    assert!(!h.pid_file().exists());
    let ledger = RecoveryLedger::new(h.dir.path().join("recovery.json")).load();
    assert_eq!(ledger.crash_count, 1);
}

#[tokio::test]
async fn recover_is_idle_when_disabled() {
    let h = harness();
    let pid = assert_ok!(h.supervisor.start().await).record().pid;
    h.world.crash(pid);

    let outcome = assert_ok!(h.supervisor.recover().await);
    assert!(matches!(outcome, RecoveryOutcome::Idle(ref s) if s.state == SupervisionState::Crashed));
    assert_eq!(h.launcher.server_spawns(), 1);
}

#[tokio::test]
async fn recover_restarts_after_crash() {
    let h = harness_with(|c| c.recovery.enabled = true);
    let pid = assert_ok!(h.supervisor.start().await).record().pid;
    h.world.crash(pid);

    let outcome = assert_ok!(h.supervisor.recover().await);
    let RecoveryOutcome::Recovered { attempt, record } = outcome else {
        panic!("expected recovery, got {outcome:?}");
    };
    assert_eq!(attempt, 1);
    assert_ne!(record.pid, pid);
    assert_eq!(h.supervisor.state().await, SupervisionState::Running);

    // Nothing pending any more.
    assert!(matches!(
        assert_ok!(h.supervisor.recover().await),
        RecoveryOutcome::Idle(_)
    ));
}

#[tokio::test]
async fn exhausted_recovery_needs_explicit_start() {
    let h = harness_with(|c| c.recovery.enabled = true);
    let pid = assert_ok!(h.supervisor.start().await).record().pid;
    h.world.crash(pid);
    h.launcher.set_mode(SpawnMode::Silent);

    let err = assert_err!(h.supervisor.recover().await);
    assert!(matches!(err, SupervisorError::RecoveryExhausted { attempts: 2 }));
    assert_eq!(err.code(), ReasonCode::RecoveryExhausted);
    assert_eq!(h.launcher.server_spawns(), 3);
    assert_eq!(h.supervisor.status().await.state, SupervisionState::Crashed);

    // Sticky across status polls and further recover calls.
    assert!(matches!(
        assert_ok!(h.supervisor.recover().await),
        RecoveryOutcome::Idle(ref s) if s.state == SupervisionState::Crashed
    ));

    h.launcher.set_mode(SpawnMode::Serving);
    assert_ok!(h.supervisor.start().await);
    assert_eq!(h.supervisor.state().await, SupervisionState::Running);
    let ledger = RecoveryLedger::new(h.dir.path().join("recovery.json")).load();
    assert!(!ledger.exhausted);
}
