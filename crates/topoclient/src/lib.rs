//! # topoclient
//!
//! Blocking HTTP client for the topology server.
//!
//! This crate provides:
//! - [`HttpTopoClient`], an implementation of [`reconcile::TopoClient`]
//!   (service template lookup, module create/update/delete)
//! - set template endpoints: fetching module diffs for sets and triggering
//!   a server-side sync
//!
//! Every request carries the request id of its [`reconcile::RequestContext`]
//! and is bounded by the context's remaining deadline. Failures are never
//! retried here.

#![warn(missing_docs)]

pub mod envelope;
pub mod http;

pub use envelope::Envelope;
pub use http::{HttpTopoClient, REQUEST_ID_HEADER, SUPPLIER_ACCOUNT_HEADER, USER_HEADER};
