//! Crash-recovery ledger persisted next to the PID file.
//!
//! Survives host restarts so that a crash loop is bounded across CLI
//! invocations too, not only within one supervisor instance.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartmem_core::ReasonCode;
use tracing::warn;

/// On-disk ledger content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryState {
    /// Crashes observed since the last explicit start.
    pub crash_count: u32,
    pub last_crash: Option<DateTime<Utc>>,
    pub last_crash_reason: Option<String>,
    /// Automatic restarts tried for the current crash.
    pub recovery_attempts: u32,
    /// Set once automatic restarts hit the bound.
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct RecoveryLedger {
    path: PathBuf,
}

impl RecoveryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. Missing or unreadable ledgers read as a clean slate.
    pub fn load(&self) -> RecoveryState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return RecoveryState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read recovery ledger: {e}");
                return RecoveryState::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Discarding malformed recovery ledger: {e}");
            RecoveryState::default()
        })
    }

    /// Write atomically using temp file + rename.
    pub fn save(&self, state: &RecoveryState) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(io::Error::other)?;

        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)
    }

    /// Count a crash. Returns the updated state.
    pub fn record_crash(&self, reason: ReasonCode, detail: &str) -> io::Result<RecoveryState> {
        let mut state = self.load();
        state.crash_count = state.crash_count.saturating_add(1);
        state.last_crash = Some(Utc::now());
        state.last_crash_reason = Some(format!("{reason}: {detail}"));
        self.save(&state)?;
        Ok(state)
    }

    /// Count one automatic restart attempt.
    pub fn record_attempt(&self) -> io::Result<RecoveryState> {
        let mut state = self.load();
        state.recovery_attempts = state.recovery_attempts.saturating_add(1);
        self.save(&state)?;
        Ok(state)
    }

    pub fn mark_exhausted(&self) -> io::Result<RecoveryState> {
        let mut state = self.load();
        state.exhausted = true;
        self.save(&state)?;
        Ok(state)
    }

    /// Close the current crash episode (a successful automatic restart, or
    /// an operator stop) but keep the crash count for diagnostics.
    pub fn record_recovered(&self) -> io::Result<()> {
        let mut state = self.load();
        state.recovery_attempts = 0;
        state.exhausted = false;
        self.save(&state)
    }

    /// Explicit operator action: forget everything.
    pub fn reset(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, RecoveryLedger) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = RecoveryLedger::new(dir.path().join("recovery.json"));
        (dir, ledger)
    }

    #[test]
    fn missing_ledger_is_clean() {
        let (_dir, ledger) = ledger();
        assert_eq!(ledger.load(), RecoveryState::default());
    }

    #[test]
    fn crash_and_attempts_accumulate() {
        let (_dir, ledger) = ledger();
        ledger
            .record_crash(ReasonCode::CrashDetected, "pid 42 vanished")
            .expect("crash");
        ledger.record_attempt().expect("attempt");
        let state = ledger.record_attempt().expect("attempt");

        assert_eq!(state.crash_count, 1);
        assert_eq!(state.recovery_attempts, 2);
        assert!(state.last_crash.is_some());
        assert_eq!(
            state.last_crash_reason.as_deref(),
            Some("CRASH_DETECTED: pid 42 vanished")
        );
        assert_eq!(ledger.load(), state);
    }

    #[test]
    fn recovered_keeps_crash_count() {
        let (_dir, ledger) = ledger();
        ledger.record_crash(ReasonCode::CrashDetected, "x").expect("crash");
        ledger.record_attempt().expect("attempt");
        ledger.mark_exhausted().expect("exhausted");
        ledger.record_recovered().expect("recovered");

        let state = ledger.load();
        assert_eq!(state.crash_count, 1);
        assert_eq!(state.recovery_attempts, 0);
        assert!(!state.exhausted);
    }

    #[test]
    fn reset_removes_file_and_is_idempotent() {
        let (_dir, ledger) = ledger();
        ledger.mark_exhausted().expect("exhausted");
        assert!(ledger.path().exists());

        ledger.reset().expect("reset");
        ledger.reset().expect("second reset");
        assert!(!ledger.path().exists());
        assert!(!ledger.load().exhausted);
    }

    #[test]
    fn malformed_ledger_reads_clean() {
        let (_dir, ledger) = ledger();
        fs::write(ledger.path(), "{ broken").expect("write");
        assert_eq!(ledger.load(), RecoveryState::default());
    }
}
