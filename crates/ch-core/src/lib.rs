//! ch-core: Chrome Harness Core Library
//!
//! Shared foundation for the harness: configuration, error types and the
//! driver registry that automation steps resolve their control session from.

pub mod config;
pub mod error;
pub mod registry;

pub use config::{BrowserConfig, HarnessConfig};
pub use error::{Error, Result};
pub use registry::{DriverRegistry, RemoteDriver};
