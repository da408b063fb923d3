//! ch-browser: Chrome session lifecycle management
//!
//! This crate owns the lifecycle of one externally-launched Chrome process
//! with remote debugging enabled, and the control session attached to it.
//!
//! ## Features
//!
//! - Profile preparation before launch (crash-flag repair, preference merge,
//!   stale single-instance lock cleanup)
//! - Process launch with a fixed, debugging-enabled argument list
//! - Readiness probing of the debugging endpoint
//! - Control session attach + registration in the harness driver registry
//! - Deterministic teardown: client first, then graceful terminate with a
//!   bounded wait and a forced-kill escalation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ch_browser::ChromeLifecycle;
//! use ch_core::HarnessConfig;
//!
//! let config = HarnessConfig::from_env()?;
//! let mut chrome = ChromeLifecycle::new(config.browser);
//!
//! chrome.launch_chrome("/tmp/downloads").await?;
//! chrome.connect_driver().await?;
//! // ... harness steps run against the registered driver ...
//! chrome.close_chrome().await?;
//! ```

pub mod attach;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod process;
pub mod profile;

pub use attach::ControlSession;
pub use error::{BrowserError, Result};
pub use lifecycle::{ChromeLifecycle, SessionState};
pub use process::{ChromeLauncher, ChromeProcess, ShutdownOutcome};
