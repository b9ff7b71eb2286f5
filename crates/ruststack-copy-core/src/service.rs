//! The object service boundary.
//!
//! [`ObjectService`] is whatever actually stores and serves objects: a proxy
//! application, an in-memory store, or another middleware layered on top. The copy
//! pipeline consumes it for its sub-requests and implements it itself, so layers
//! compose.
//!
//! Sub-requests issued by the pipeline carry a [`SubRequestContext`] in their
//! request extensions instead of untyped environment flags.

use std::future::Future;
use std::pin::Pin;

use crate::body::CopyBody;
use crate::operation::CopyMethod;

/// Boxed future returned by [`ObjectService::call`].
pub type ServiceFuture<'a> = Pin<Box<dyn Future<Output = http::Response<CopyBody>> + Send + 'a>>;

/// An object storage service handling one request at a time.
///
/// Errors are expressed as HTTP responses; the service never fails out-of-band.
///
/// # Object Safety
///
/// The trait returns a boxed future so it can be used as `Arc<dyn ObjectService>`.
pub trait ObjectService: Send + Sync + 'static {
    /// Handle a request and produce a response.
    fn call(&self, req: http::Request<CopyBody>) -> ServiceFuture<'_>;
}

impl<S: ObjectService + ?Sized> ObjectService for std::sync::Arc<S> {
    fn call(&self, req: http::Request<CopyBody>) -> ServiceFuture<'_> {
        (**self).call(req)
    }
}

/// Typed context attached to requests generated inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRequestContext {
    /// Tag identifying the layer that issued the sub-request.
    pub swift_source: &'static str,
    /// The read is authorised by the write that follows it; skip read authorisation.
    pub authorize_override: bool,
    /// The method the client actually sent (COPY, POST, PUT).
    pub original_method: CopyMethod,
}
