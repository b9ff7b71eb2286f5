//! Server-side object copy for RustStack object storage.
//!
//! This crate turns copy-like requests into a read of the source object followed
//! by a streamed write of the destination object. It handles:
//!
//! - **Classification** ([`operation`]): decides whether a request is a
//!   `PUT` with `X-Copy-From`, a `COPY` with `Destination`, a `POST` handled as
//!   a copy onto itself, an object `OPTIONS`, or something to pass through.
//!
//! - **Validation** ([`path`]): path-shaped copy headers and account names are
//!   checked before any sub-request is issued.
//!
//! - **Source read** ([`fetch`]): the source is read with "newest replica"
//!   semantics and rejected when its size is unknown or too large.
//!
//! - **Metadata** ([`meta`], [`merge`]): system, user and transient system
//!   metadata are propagated according to the copy policy, including large
//!   object manifest handling.
//!
//! - **Responses** ([`response`]): `X-Copied-From*` headers, the `201 → 202`
//!   downgrade for POST-as-copy, and COPY advertised on OPTIONS.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> ServerSideCopy (ObjectService)
//!     -> detect / normalize (CopyOperation)
//!     -> SourceFetcher (GET sub-request)
//!     -> merge_headers (destination headers)
//!     -> PUT sub-request (source body streamed)
//!     -> adapt_copy_response / adapt_options_response
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ruststack_copy_core::{CopyConfig, ObjectService, ServerSideCopy};
//!
//! fn wrap(store: Arc<dyn ObjectService>) -> ServerSideCopy<Arc<dyn ObjectService>> {
//!     ServerSideCopy::new(store, CopyConfig::from_env())
//! }
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod legacy;
pub mod merge;
pub mod meta;
pub mod middleware;
pub mod operation;
pub mod path;
pub mod query;
pub mod response;
pub mod service;

#[cfg(test)]
mod testing;

// Re-export key types for convenience.
pub use body::CopyBody;
pub use config::CopyConfig;
pub use error::{CopyError, CopyResult};
pub use middleware::{CopyStage, ServerSideCopy};
pub use operation::{Classification, CopyMethod, CopyOperation, ManifestMode, classify};
pub use service::{ObjectService, SubRequestContext};
