//! Configuration management
//!
//! Settings are resolved in the following order:
//! 1. Environment variables
//! 2. Default values
//!
//! Everything has a usable default so the harness runs out of the box
//! against a stock Chrome install.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Browser/session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to the Chrome binary
    #[serde(default = "default_chrome_path")]
    pub chrome_path: PathBuf,

    /// Remote debugging port Chrome is started with
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Profile directory (`--user-data-dir`), kept across runs
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Bound for waiting on the debugging endpoint after spawn, in seconds
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Bound for graceful termination before escalating to a kill, in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Alias the control session is registered under in the driver registry
    #[serde(default = "default_driver_alias")]
    pub driver_alias: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: default_chrome_path(),
            debug_port: default_debug_port(),
            profile_dir: default_profile_dir(),
            ready_timeout_secs: default_ready_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            driver_alias: default_driver_alias(),
        }
    }
}

/// Main configuration for the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Command invoked to run a test-suite file
    #[serde(default = "default_runner_command")]
    pub runner_command: String,

    /// Default download directory handed to the browser preferences
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            runner_command: default_runner_command(),
            download_dir: default_download_dir(),
        }
    }
}

fn default_chrome_path() -> PathBuf {
    PathBuf::from("/usr/bin/google-chrome")
}

fn default_debug_port() -> u16 {
    9222
}

fn default_profile_dir() -> PathBuf {
    // Relative default is made absolute by from_env(); Chrome resolves
    // --user-data-dir against its own cwd otherwise.
    PathBuf::from("chrome-profile")
}

fn default_ready_timeout() -> u64 {
    15
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_driver_alias() -> String {
    "ChromeDebug".to_string()
}

fn default_runner_command() -> String {
    "robot".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl HarnessConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> crate::Result<Self> {
        let debug_port = match std::env::var("CHROME_DEBUG_PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("invalid CHROME_DEBUG_PORT: {}", p)))?,
            Err(_) => default_debug_port(),
        };

        let browser = BrowserConfig {
            chrome_path: std::env::var("CHROME_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_chrome_path()),
            debug_port,
            profile_dir: absolutize(
                std::env::var("CHROME_PROFILE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_profile_dir()),
            ),
            ready_timeout_secs: env_u64("CHROME_READY_TIMEOUT", default_ready_timeout()),
            shutdown_timeout_secs: env_u64("CHROME_SHUTDOWN_TIMEOUT", default_shutdown_timeout()),
            driver_alias: std::env::var("CHROME_DRIVER_ALIAS")
                .unwrap_or_else(|_| default_driver_alias()),
        };

        Ok(Self {
            browser,
            runner_command: std::env::var("SUITE_RUNNER")
                .unwrap_or_else(|_| default_runner_command()),
            download_dir: absolutize(
                std::env::var("DOWNLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_download_dir()),
            ),
        })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_default() {
        let config = BrowserConfig::default();
        assert_eq!(config.debug_port, 9222);
        assert_eq!(config.driver_alias, "ChromeDebug");
        assert_eq!(config.ready_timeout_secs, 15);
        assert_eq!(config.shutdown_timeout_secs, 5);
    }

    #[test]
    fn test_harness_config_default() {
        let config = HarnessConfig::default();
        assert_eq!(config.runner_command, "robot");
        assert_eq!(config.browser.debug_port, 9222);
    }

    #[test]
    fn test_absolutize_keeps_absolute() {
        let p = PathBuf::from("/tmp/profile");
        assert_eq!(absolutize(p.clone()), p);
    }

    #[test]
    fn test_absolutize_relative() {
        let p = absolutize(PathBuf::from("some-profile"));
        assert!(p.is_absolute());
        assert!(p.ends_with("some-profile"));
    }
}
