//! Error types for ch-browser
//!
//! Only launch-blocking and attach-blocking failures become errors here.
//! Advisory failures (crash-flag repair, individual lock deletions, driver
//! quit during close) are logged and swallowed at their call sites and never
//! surface through this type.

use thiserror::Error;

/// ch-browser error type
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Preference merge failed: {0}")]
    Preferences(String),

    #[error("Failed to spawn browser process: {0}")]
    Spawn(String),

    #[error("Debugging endpoint not ready after {0:?}")]
    NotReady(std::time::Duration),

    #[error("Attach failed: {0}")]
    Attach(String),

    #[error("Driver registry error: {0}")]
    Registry(#[from] ch_core::Error),

    #[error("Invalid operation in state {state}: {message}")]
    State { state: &'static str, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ch-browser
pub type Result<T> = std::result::Result<T, BrowserError>;
