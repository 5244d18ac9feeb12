//! # Reconcile
//!
//! Converges the modules of a set to what its set template declares.
//!
//! The topology server computes, per set, an ordered list of module diffs
//! (add, remove, changed, unchanged). This crate applies them: each diff
//! turns into exactly one remote mutation, issued in order, stopping at
//! the first failure.
//!
//! ## Core Concepts
//!
//! - **SetInst**: the set whose modules are reconciled
//! - **ModuleDiff**: one required change, resolved into a typed [`ModuleAction`]
//! - **TopoClient**: the remote operations the worker needs
//! - **BackendWorker**: applies diffs through a client
//! - **RequestContext**: request id, cancellation and deadline for a run
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     BackendWorker, MockClient, ModuleDiff, RequestContext, ServiceTemplate, SetInst,
//! };
//!
//! let client = MockClient::new();
//! client.add_template(ServiceTemplate {
//!     id: 9,
//!     name: "web".to_string(),
//!     service_category_id: 1,
//! });
//!
//! let worker = BackendWorker::new(client);
//! let ctx = RequestContext::new("rid-1");
//! let set = SetInst::new(2, 10, 5);
//!
//! let summary = worker
//!     .apply_all(
//!         &ctx,
//!         &set,
//!         &[ModuleDiff::remove(100), ModuleDiff::add(9, "web"), ModuleDiff::unchanged()],
//!     )
//!     .unwrap();
//! assert_eq!(summary.total_changes(), 2);
//! ```
//!
//! ## Provider Traits
//!
//! - [`TopoClient`]: remote topology operations
//! - [`ProgressCallback`]: receives progress updates
//!
//! This keeps the crate free of any HTTP stack or UI framework.

pub mod client;
pub mod context;
pub mod diff;
pub mod error;
pub mod types;
pub mod worker;

// Re-export main types at crate root
pub use client::{MockClient, TopoClient};
pub use context::{CancellationToken, NoProgress, ProgressCallback, RequestContext};
pub use diff::{DiffSummary, DiffType, ModuleAction, ModuleDiff};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ApiResponse, CreateModule, ServiceTemplate, SetDiff, SetInst, SyncOutcome, SyncSummary,
    UpdateModule,
};
pub use worker::BackendWorker;
