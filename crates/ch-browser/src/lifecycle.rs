//! Lifecycle manager
//!
//! The façade callers drive: `launch_chrome → connect_driver → (use) →
//! close_chrome`. Tracks zero-or-one process and zero-or-one control
//! session through the state machine
//! `Idle → Launching → Launched → Attached → Closing → Idle`.
//!
//! Designed for one session in flight per instance and sequential use by a
//! single caller; concurrent calls on the same instance must be serialized
//! by the caller.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ch_core::{BrowserConfig, DriverRegistry, RemoteDriver};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::attach::ControlSession;
use crate::error::{BrowserError, Result};
use crate::process::{ChromeLauncher, ChromeProcess, ShutdownOutcome, wait_for_endpoint};

/// Where the managed session currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    Launched,
    Attached,
    Closing,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Launching => "Launching",
            SessionState::Launched => "Launched",
            SessionState::Attached => "Attached",
            SessionState::Closing => "Closing",
        }
    }
}

/// Manages one Chrome process and its control session
///
/// Owns both handles exclusively. Operations return short status strings
/// for the benign "nothing to do" cases instead of failing; real failures
/// (launch-blocking, attach-blocking) propagate as errors.
pub struct ChromeLifecycle {
    config: BrowserConfig,
    registry: Arc<Mutex<DriverRegistry>>,
    state: SessionState,
    process: Option<ChromeProcess>,
    session: Option<Arc<ControlSession>>,
}

impl ChromeLifecycle {
    /// Create a lifecycle manager with its own driver registry
    pub fn new(config: BrowserConfig) -> Self {
        Self::with_registry(config, Arc::new(Mutex::new(DriverRegistry::new())))
    }

    /// Create a lifecycle manager sharing an existing driver registry
    pub fn with_registry(config: BrowserConfig, registry: Arc<Mutex<DriverRegistry>>) -> Self {
        Self {
            config,
            registry,
            state: SessionState::Idle,
            process: None,
            session: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The driver registry control sessions are registered in
    pub fn registry(&self) -> Arc<Mutex<DriverRegistry>> {
        self.registry.clone()
    }

    /// Launch Chrome with remote debugging enabled
    ///
    /// Idempotent: if the tracked process still reports running, nothing is
    /// spawned and the call reports "Chrome already running". Otherwise the
    /// profile is prepared, the process spawned, and the call returns once
    /// the debugging endpoint accepts connections.
    pub async fn launch_chrome(&mut self, download_dir: impl AsRef<Path>) -> Result<&'static str> {
        if let Some(process) = self.process.as_mut() {
            if process.is_running() {
                debug!("Launch requested but Chrome (pid {:?}) is already running", process.id());
                return Ok("Chrome already running");
            }
            // Tracked process died on its own; fall through to a fresh
            // launch, dropping any session still bound to the dead process
            // so its alias is free for the next attach.
            warn!("Tracked Chrome process died externally, clearing stale session");
            self.detach_session().await;
            self.process = None;
        }

        self.state = SessionState::Launching;

        let launcher = ChromeLauncher::new(self.config.clone());
        let process = match launcher.spawn(download_dir.as_ref()).await {
            Ok(process) => process,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };
        self.process = Some(process);

        let ready_bound = Duration::from_secs(self.config.ready_timeout_secs);
        if let Err(e) = wait_for_endpoint(self.config.debug_port, ready_bound).await {
            // The endpoint never came up; tear the half-launched process
            // down rather than leaving it to fail at attach time.
            warn!("Endpoint never became ready, tearing down pid {:?}", self.process.as_ref().and_then(|p| p.id()));
            if let Some(mut process) = self.process.take() {
                process.shutdown(self.shutdown_bound()).await;
            }
            self.state = SessionState::Idle;
            return Err(e);
        }

        self.state = SessionState::Launched;
        Ok("Chrome launched")
    }

    /// Attach the control session and register it in the driver registry
    ///
    /// Requires a launched, un-attached session; anything else is an
    /// ordering violation. Propagates a failed connection (no listener) and
    /// duplicate-alias rejection from the registry.
    pub async fn connect_driver(&mut self) -> Result<&'static str> {
        if self.state != SessionState::Launched {
            return Err(BrowserError::State {
                state: self.state.name(),
                message: "connect_driver requires a launched, un-attached session".to_string(),
            });
        }

        let session = Arc::new(ControlSession::connect(self.config.debug_port).await?);
        self.registry
            .lock()
            .await
            .register(&self.config.driver_alias, session.clone())?;
        info!("Driver registered under alias {}", self.config.driver_alias);

        self.session = Some(session);
        self.state = SessionState::Attached;
        Ok("Driver connected")
    }

    /// Tear the session down: client first, then the process
    ///
    /// Driver quit failures are advisory (the client may already be gone).
    /// A process that outlives the graceful bound is killed; that
    /// escalation still counts as a successful close. Both handles are
    /// cleared unconditionally, so close is idempotent.
    pub async fn close_chrome(&mut self) -> Result<&'static str> {
        self.state = SessionState::Closing;

        self.detach_session().await;

        let status = match self.process.take() {
            Some(mut process) => {
                if process.is_running() {
                    match process.shutdown(self.shutdown_bound()).await {
                        ShutdownOutcome::Forced => info!("Chrome killed after graceful timeout"),
                        _ => info!("Chrome closed"),
                    }
                    "Chrome closed"
                } else {
                    debug!("Tracked Chrome process had already exited");
                    "No Chrome process to close"
                }
            }
            None => "No Chrome process to close",
        };

        self.state = SessionState::Idle;
        Ok(status)
    }

    /// Quit and deregister the tracked control session, if any
    ///
    /// Both steps are advisory: the client may already be gone and the
    /// alias may never have been registered.
    async fn detach_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.quit().await {
                warn!("Driver quit failed (ignored): {}", e);
            }
            if self
                .registry
                .lock()
                .await
                .deregister(&self.config.driver_alias)
                .is_none()
            {
                debug!("Alias {} was not registered at detach", self.config.driver_alias);
            }
        }
    }

    fn shutdown_bound(&self) -> Duration {
        Duration::from_secs(self.config.shutdown_timeout_secs)
    }
}
