//! Driver registry
//!
//! Control sessions are registered here under an alias so that harness
//! steps can resolve the automation target they should run against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Error, Result};

/// A remote-control client session that can be asked to shut down
///
/// Implemented by whatever owns the actual connection to the browser's
/// debugging endpoint.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    /// Request a graceful shutdown of the client connection
    ///
    /// # Errors
    /// Returns an error if the connection is already gone or the close
    /// handshake fails. Callers on a teardown path are expected to log and
    /// swallow this.
    async fn quit(&self) -> Result<()>;
}

/// Registry of control sessions indexed by alias
///
/// Handles registration, lookup and removal. Unlike a tool registry,
/// aliases are unique: registering a second driver under an existing alias
/// is rejected rather than replacing the first.
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn RemoteDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register a driver under an alias
    ///
    /// # Errors
    /// Returns `Error::DuplicateAlias` if the alias is already taken.
    pub fn register(&mut self, alias: &str, driver: Arc<dyn RemoteDriver>) -> Result<()> {
        if self.drivers.contains_key(alias) {
            return Err(Error::DuplicateAlias(alias.to_string()));
        }
        self.drivers.insert(alias.to_string(), driver);
        Ok(())
    }

    /// Remove and return the driver registered under an alias
    pub fn deregister(&mut self, alias: &str) -> Option<Arc<dyn RemoteDriver>> {
        self.drivers.remove(alias)
    }

    /// Get a driver by alias
    pub fn get(&self, alias: &str) -> Option<Arc<dyn RemoteDriver>> {
        self.drivers.get(alias).cloned()
    }

    /// Check if an alias is registered
    pub fn contains(&self, alias: &str) -> bool {
        self.drivers.contains_key(alias)
    }

    /// Get the number of registered drivers
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Check if no drivers are registered
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Get all registered aliases
    pub fn aliases(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopDriver;

    #[async_trait]
    impl RemoteDriver for NoopDriver {
        async fn quit(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = DriverRegistry::new();
        registry.register("ChromeDebug", Arc::new(NoopDriver)).unwrap();

        assert!(registry.contains("ChromeDebug"));
        assert!(registry.get("ChromeDebug").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut registry = DriverRegistry::new();
        registry.register("ChromeDebug", Arc::new(NoopDriver)).unwrap();

        let err = registry
            .register("ChromeDebug", Arc::new(NoopDriver))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deregister() {
        let mut registry = DriverRegistry::new();
        registry.register("ChromeDebug", Arc::new(NoopDriver)).unwrap();

        assert!(registry.deregister("ChromeDebug").is_some());
        assert!(registry.is_empty());
        assert!(registry.deregister("ChromeDebug").is_none());

        // Alias is free again after deregistration
        registry.register("ChromeDebug", Arc::new(NoopDriver)).unwrap();
    }

    #[tokio::test]
    async fn test_quit_through_registry() {
        let mut registry = DriverRegistry::new();
        registry.register("ChromeDebug", Arc::new(NoopDriver)).unwrap();

        let driver = registry.get("ChromeDebug").unwrap();
        driver.quit().await.unwrap();
    }
}
