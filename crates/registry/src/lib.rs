//! # registry
//!
//! Service registration against a coordination service.
//!
//! A server registers its [`ServerInfo`] once under a path so peers can
//! discover it. Discovery itself and watching for changes belong to the
//! coordination service; this crate only publishes and pings.
//!
//! ## Example
//!
//! ```
//! use registry::{ServerInfo, ServiceDiscovery};
//! use registry::backend::MockBackend;
//!
//! let backend = MockBackend::new();
//! let discovery = ServiceDiscovery::new(Box::new(backend.clone()));
//!
//! discovery.ping().unwrap();
//! discovery
//!     .register("/services/setsync", &ServerInfo::new("10.0.0.5", 9000))
//!     .unwrap();
//! assert_eq!(backend.registrations().len(), 1);
//!
//! // The any-address is never a reachable advertisement.
//! let other = ServiceDiscovery::new(Box::new(MockBackend::new()));
//! assert!(other.register("/services/setsync", &ServerInfo::new("0.0.0.0", 9000)).is_err());
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ServerInfo, UNSPECIFIED_IP};

use backend::Backend;
use std::sync::{Mutex, PoisonError};

/// Registers one server with a coordination service.
pub struct ServiceDiscovery {
    backend: Box<dyn Backend>,
    registered: Mutex<Option<String>>,
}

impl ServiceDiscovery {
    /// Create a discovery handle over `backend`.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            registered: Mutex::new(None),
        }
    }

    /// Check that the coordination service is reachable.
    pub fn ping(&self) -> Result<()> {
        self.backend.ping()
    }

    /// Register `info` under `path`.
    ///
    /// Can only succeed once per handle. An `ip` of `0.0.0.0` is rejected
    /// before anything is sent.
    pub fn register(&self, path: &str, info: &ServerInfo) -> Result<()> {
        if info.ip == UNSPECIFIED_IP {
            return Err(Error::InvalidAddress(info.ip.clone()));
        }

        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = registered.as_ref() {
            return Err(Error::AlreadyRegistered {
                path: existing.clone(),
            });
        }

        let value = serde_json::to_string(info)?;
        self.backend.register(path, &value)?;
        log::info!("registered {} at {}", info.address(), path);

        *registered = Some(path.to_string());
        Ok(())
    }

    /// Path this handle registered at, if any.
    pub fn registered_path(&self) -> Option<String> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::MockBackend;

    fn discovery() -> (ServiceDiscovery, MockBackend) {
        let backend = MockBackend::new();
        (ServiceDiscovery::new(Box::new(backend.clone())), backend)
    }

    #[test]
    fn test_register_publishes_json() {
        let (discovery, backend) = discovery();
        let info = ServerInfo::new("10.0.0.5", 9000).hostname("node-1");
        discovery.register("/services/setsync", &info).unwrap();

        let registrations = backend.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].0, "/services/setsync");
        let published: ServerInfo = serde_json::from_str(&registrations[0].1).unwrap();
        assert_eq!(published, info);
        assert_eq!(
            discovery.registered_path().as_deref(),
            Some("/services/setsync")
        );
    }

    #[test]
    fn test_register_rejects_unspecified_ip() {
        let (discovery, backend) = discovery();
        let err = discovery
            .register("/services/setsync", &ServerInfo::new("0.0.0.0", 9000))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        assert!(backend.registrations().is_empty());
        assert_eq!(discovery.registered_path(), None);
    }

    #[test]
    fn test_register_only_checks_exact_unspecified_ip() {
        let (discovery, _backend) = discovery();
        assert!(discovery
            .register("/services/setsync", &ServerInfo::new("127.0.0.1", 9000))
            .is_ok());
    }

    #[test]
    fn test_register_only_once() {
        let (discovery, backend) = discovery();
        let info = ServerInfo::new("10.0.0.5", 9000);
        discovery.register("/a", &info).unwrap();
        let err = discovery.register("/b", &info).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { ref path } if path == "/a"));
        assert_eq!(backend.registrations().len(), 1);
    }

    #[test]
    fn test_failed_register_can_be_retried() {
        let (discovery, backend) = discovery();
        let info = ServerInfo::new("10.0.0.5", 9000);
        backend.set_unhealthy(true);
        assert!(discovery.register("/a", &info).is_err());

        backend.set_unhealthy(false);
        discovery.register("/a", &info).unwrap();
        assert_eq!(backend.registrations().len(), 1);
    }

    #[test]
    fn test_ping_delegates() {
        let (discovery, backend) = discovery();
        discovery.ping().unwrap();
        backend.set_unhealthy(true);
        assert!(discovery.ping().is_err());
        assert_eq!(backend.pings(), 2);
    }
}
