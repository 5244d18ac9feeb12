//! Request context and progress reporting
//!
//! A [`RequestContext`] travels explicitly through every call of a
//! reconciliation run: it carries the request id that is attached to each
//! outbound request and log line, and the cancellation/deadline signal
//! checked before each remote call.

use crate::diff::ModuleDiff;
use crate::error::{Error, Result};
use crate::types::{SetInst, SyncOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Shared cancellation flag
///
/// Clones observe the same flag, so a token handed to a signal handler or
/// another thread can abort a run in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-request context: correlation id, cancellation and deadline
#[derive(Debug, Clone)]
pub struct RequestContext {
    rid: String,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a context with the given request id and no deadline
    pub fn new(rid: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Create a context with a freshly generated request id
    pub fn generate() -> Self {
        Self::new(generate_rid())
    }

    /// Bound the whole run by `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Bound the whole run by an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share an existing cancellation token
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Request id attached to every outbound call
    pub fn rid(&self) -> &str {
        &self.rid
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` if unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and every clone of it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether the run may continue
    ///
    /// Returns `Error::Cancelled` or `Error::DeadlineExceeded` once the
    /// context is done.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }
}

fn generate_rid() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("cc{:x}{:x}", nanos, std::process::id())
}

/// Progress callback for reconciliation runs
///
/// Implement this trait to receive progress updates while a set is synced.
pub trait ProgressCallback: Send {
    /// Called before the first diff of a set is applied
    fn on_set_start(&mut self, set: &SetInst, count: usize);

    /// Called before a diff is applied
    fn on_diff_start(&mut self, index: usize, diff: &ModuleDiff);

    /// Called after a diff is applied, successfully or not
    fn on_diff_complete(&mut self, index: usize, diff: &ModuleDiff, result: &Result<SyncOutcome>);

    /// Called when the set is done, including after a failure
    fn on_set_complete(&mut self, set: &SetInst);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_set_start(&mut self, _set: &SetInst, _count: usize) {}
    fn on_diff_start(&mut self, _index: usize, _diff: &ModuleDiff) {}
    fn on_diff_complete(
        &mut self,
        _index: usize,
        _diff: &ModuleDiff,
        _result: &Result<SyncOutcome>,
    ) {
    }
    fn on_set_complete(&mut self, _set: &SetInst) {}
}
