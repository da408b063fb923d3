//! Process launcher
//!
//! Spawns the Chrome binary with remote debugging enabled against the
//! managed profile, and owns termination of the resulting OS process.
//! Profile preparation (lock sweep, crash repair, preference merge) happens
//! here so that every spawn sees the same reproducible profile state.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use ch_core::BrowserConfig;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{BrowserError, Result};
use crate::{locks, profile};

/// Initial delay of the readiness probe backoff
const PROBE_INITIAL_DELAY: Duration = Duration::from_millis(100);
/// Backoff cap between readiness probes
const PROBE_MAX_DELAY: Duration = Duration::from_secs(2);

/// How a managed process went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Exited within the grace period after SIGTERM
    Graceful,
    /// Ignored the grace period and was killed
    Forced,
    /// Was not running to begin with
    NotRunning,
}

/// Handle to one launched Chrome process
#[derive(Debug)]
pub struct ChromeProcess {
    child: Child,
}

impl ChromeProcess {
    /// OS process id, if the process has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminate the process: graceful signal, bounded wait, then a kill
    ///
    /// Escalation is not an error; the returned outcome says whether the
    /// grace period was honored.
    pub async fn shutdown(&mut self, grace: Duration) -> ShutdownOutcome {
        if !self.is_running() {
            return ShutdownOutcome::NotRunning;
        }

        self.send_terminate();

        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Chrome exited gracefully: {}", status);
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                warn!("Failed waiting on Chrome exit: {}", e);
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                warn!("Chrome ignored terminate for {:?}, killing", grace);
                if let Err(e) = self.child.start_kill() {
                    warn!("Kill failed: {}", e);
                }
                let _ = self.child.wait().await;
                ShutdownOutcome::Forced
            }
        }
    }

    /// Send a graceful terminate signal (SIGTERM on unix)
    #[cfg(unix)]
    fn send_terminate(&self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: signaling a pid obtained from our own Child; the
            // caller just observed it running.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&self) {
        // No graceful signal available; the bounded wait will escalate.
    }
}

/// Launches Chrome with a fixed, debugging-enabled argument list
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    /// Create a launcher for the given browser configuration
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Prepare the profile and spawn a Chrome process
    ///
    /// Sequence: stale lock sweep, crash-flag repair (both best-effort),
    /// then the preference merge, which is the launch contract and fatal on
    /// failure. The child's stdout/stderr are discarded.
    ///
    /// The process takes non-deterministic time to open its debugging
    /// endpoint; follow up with [`wait_for_endpoint`].
    pub async fn spawn(&self, download_dir: &Path) -> Result<ChromeProcess> {
        let profile_dir = &self.config.profile_dir;

        locks::clear_stale_locks(profile_dir).await;
        profile::repair_crash_flag(profile_dir).await;
        profile::merge_preferences(profile_dir, download_dir).await?;

        let child = Command::new(&self.config.chrome_path)
            .args(self.chrome_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BrowserError::Spawn(format!(
                    "{}: {}",
                    self.config.chrome_path.display(),
                    e
                ))
            })?;

        info!(
            "Launched Chrome (pid {:?}) on debugging port {}",
            child.id(),
            self.config.debug_port
        );

        Ok(ChromeProcess { child })
    }

    /// The fixed argument list every managed Chrome instance is started with
    fn chrome_args(&self) -> Vec<String> {
        vec![
            format!("--remote-debugging-port={}", self.config.debug_port),
            format!("--user-data-dir={}", self.config.profile_dir.display()),
            "--start-maximized".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-session-crashed-bubble".to_string(),
            "--disable-infobars".to_string(),
            "--disable-extensions".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--kiosk-printing".to_string(),
            "--disable-password-manager".to_string(),
        ]
    }
}

/// Wait for the debugging endpoint to accept connections
///
/// Bounded retry loop with exponential backoff probing
/// `127.0.0.1:<port>`. Surfaces `NotReady` with the bound when the endpoint
/// never comes up, instead of letting a later attach fail obscurely.
pub async fn wait_for_endpoint(port: u16, bound: Duration) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let deadline = tokio::time::Instant::now() + bound;
    let mut delay = PROBE_INITIAL_DELAY;

    loop {
        match TcpStream::connect(&addr).await {
            Ok(_) => {
                debug!("Debugging endpoint {} is accepting connections", addr);
                return Ok(());
            }
            Err(e) => {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    warn!("Debugging endpoint {} never became ready: {}", addr, e);
                    return Err(BrowserError::NotReady(bound));
                }
                // Never sleep past the deadline; the last probe runs at the
                // full bound rather than a backoff step short of it.
                sleep(delay.min(deadline - now)).await;
                delay = (delay * 2).min(PROBE_MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    /// Write an executable stub script standing in for the Chrome binary
    fn stub_binary(dir: &TempDir, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-chrome");
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn test_config(dir: &TempDir, binary: PathBuf) -> BrowserConfig {
        BrowserConfig {
            chrome_path: binary,
            profile_dir: dir.path().join("profile"),
            ..BrowserConfig::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_prepares_profile() {
        let dir = tempdir().unwrap();
        let binary = stub_binary(&dir, "#!/bin/sh\nsleep 30\n");
        let config = test_config(&dir, binary);
        let profile_dir = config.profile_dir.clone();

        let launcher = ChromeLauncher::new(config);
        let mut process = launcher.spawn(Path::new("/tmp/dl")).await.unwrap();

        assert!(process.is_running());
        // Preference merge ran before the spawn
        let prefs = std::fs::read_to_string(profile_dir.join("Default/Preferences")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&prefs).unwrap();
        assert_eq!(doc["download"]["default_directory"], "/tmp/dl");

        process.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_is_fatal() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir, dir.path().join("no-such-binary"));

        let err = ChromeLauncher::new(config)
            .spawn(Path::new("/tmp/dl"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_shutdown_graceful() {
        let dir = tempdir().unwrap();
        let binary = stub_binary(&dir, "#!/bin/sh\nsleep 30\n");
        let launcher = ChromeLauncher::new(test_config(&dir, binary));
        let mut process = launcher.spawn(Path::new("/tmp/dl")).await.unwrap();

        let outcome = process.shutdown(Duration::from_secs(5)).await;

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert!(!process.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_escalates_to_kill() {
        let dir = tempdir().unwrap();
        // Stub that ignores the graceful terminate signal
        let binary = stub_binary(&dir, "#!/bin/sh\ntrap '' TERM\nwhile true; do sleep 1; done\n");
        let launcher = ChromeLauncher::new(test_config(&dir, binary));
        let mut process = launcher.spawn(Path::new("/tmp/dl")).await.unwrap();

        // Give the shell a moment to install the trap
        sleep(Duration::from_millis(300)).await;

        let started = std::time::Instant::now();
        let outcome = process.shutdown(Duration::from_secs(1)).await;

        assert_eq!(outcome, ShutdownOutcome::Forced);
        assert!(!process.is_running());
        // Bounded wait plus a small margin, not the full sleep loop
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_shutdown_not_running() {
        let dir = tempdir().unwrap();
        let binary = stub_binary(&dir, "#!/bin/sh\nexit 0\n");
        let launcher = ChromeLauncher::new(test_config(&dir, binary));
        let mut process = launcher.spawn(Path::new("/tmp/dl")).await.unwrap();

        // Let the stub exit on its own
        sleep(Duration::from_millis(300)).await;
        assert!(!process.is_running());

        let outcome = process.shutdown(Duration::from_secs(1)).await;
        assert_eq!(outcome, ShutdownOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_wait_for_endpoint_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        wait_for_endpoint(port, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_endpoint_times_out() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let bound = Duration::from_millis(400);
        let started = std::time::Instant::now();
        let err = wait_for_endpoint(port, bound).await.unwrap_err();

        assert!(matches!(err, BrowserError::NotReady(_)));
        // The full bound is used up, including a final probe at the
        // deadline instead of giving up a backoff step early
        assert!(started.elapsed() >= bound);
    }
}
