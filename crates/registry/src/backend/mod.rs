//! Backend traits and implementations for coordination services.
//!
//! The primary implementation is [`etcd::EtcdBackend`], which speaks the
//! etcd v2 keys API over HTTP.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use registry::backend::{Backend, MockBackend};
//!
//! let mock = MockBackend::new();
//! mock.register("/services/setsync", r#"{"ip":"10.0.0.5"}"#).unwrap();
//! assert_eq!(mock.registrations().len(), 1);
//! ```

pub mod etcd;

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};

/// Backend trait for a coordination service.
pub trait Backend: Send + Sync {
    /// Publish `value` under `path`.
    fn register(&self, path: &str, value: &str) -> Result<()>;

    /// Check that the service is reachable and healthy.
    fn ping(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MockState {
    registrations: Vec<(String, String)>,
    pings: usize,
    unhealthy: bool,
}

/// In-memory backend for testing without network access.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new healthy mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as unhealthy.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state.lock().unwrap().unhealthy = unhealthy;
    }

    /// All `(path, value)` pairs registered so far.
    pub fn registrations(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().registrations.clone()
    }

    /// Number of pings received.
    pub fn pings(&self) -> usize {
        self.state.lock().unwrap().pings
    }
}

impl Backend for MockBackend {
    fn register(&self, path: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unhealthy {
            return Err(Error::Unhealthy("mock backend down".to_string()));
        }
        state
            .registrations
            .push((path.to_string(), value.to_string()));
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pings += 1;
        if state.unhealthy {
            return Err(Error::Unhealthy("mock backend down".to_string()));
        }
        Ok(())
    }
}
