//! The server-side copy layer.
//!
//! [`ServerSideCopy`] wraps an [`ObjectService`] and is itself an
//! [`ObjectService`]. Each request moves through the [`CopyStage`]s strictly in
//! order:
//!
//! 1. Classification (pass through, OPTIONS, or copy-like)
//! 2. Path and header validation, before any sub-request
//! 3. Source read ([`SourceFetcher`])
//! 4. Destination header merge ([`merge_headers`])
//! 5. Write sub-request, streaming the source body into it
//! 6. Response adjustment ([`crate::response`])
//!
//! A failure at any stage ends the request with the error response. An opened
//! source body is dropped on every exit path.

use std::sync::Arc;

use http::HeaderValue;
use http::header::{CONTENT_LENGTH, ETAG};
use tracing::{debug, info, warn};

use crate::body::CopyBody;
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::fetch::{SourceFetcher, SourceResponse};
use crate::headers::{MULTIPART_MANIFEST, SWIFT_SOURCE};
use crate::merge::{DestinationHeaders, MergePolicy, merge_headers};
use crate::operation::{CopyMethod, CopyOperation, ManifestMode, RequestKind, detect, normalize};
use crate::response::{adapt_copy_response, adapt_options_response, copied_from_headers};
use crate::service::{ObjectService, ServiceFuture, SubRequestContext};

/// Per-request progress of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CopyStage {
    /// Nothing happened yet.
    Idle,
    /// Deciding what kind of request this is.
    ClassifyingRequest,
    /// Checking the copy headers and normalising the request.
    ValidatingPaths,
    /// Reading the source object.
    Fetching,
    /// Building the destination headers.
    Merging,
    /// Writing the destination object.
    Writing,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl CopyStage {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Forward-only tracker of a request's [`CopyStage`].
#[derive(Debug)]
pub struct StageTracker {
    stage: CopyStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// Start in [`CopyStage::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: CopyStage::Idle,
        }
    }

    /// The current stage.
    #[must_use]
    pub fn stage(&self) -> CopyStage {
        self.stage
    }

    /// Move forward to `next`. Returns `false` and stays put if that would go
    /// backwards or leave a terminal stage.
    pub fn advance(&mut self, next: CopyStage) -> bool {
        if self.stage.is_terminal() || next <= self.stage {
            return false;
        }
        debug!(from = ?self.stage, to = ?next, "copy stage transition");
        self.stage = next;
        true
    }

    /// Move to [`CopyStage::Failed`] from any non-terminal stage.
    pub fn fail(&mut self) {
        self.advance(CopyStage::Failed);
    }
}

/// Server-side copy layer in front of an object service.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use ruststack_copy_core::config::CopyConfig;
/// use ruststack_copy_core::middleware::ServerSideCopy;
/// use ruststack_copy_core::service::ObjectService;
///
/// fn layer(store: Arc<dyn ObjectService>) -> ServerSideCopy<Arc<dyn ObjectService>> {
///     ServerSideCopy::new(store, CopyConfig::default())
/// }
/// ```
#[derive(Debug)]
pub struct ServerSideCopy<S: ObjectService> {
    inner: Arc<S>,
    config: Arc<CopyConfig>,
}

impl<S: ObjectService> Clone for ServerSideCopy<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ObjectService> ServerSideCopy<S> {
    /// Wrap `inner` with the copy layer.
    #[must_use]
    pub fn new(inner: S, config: CopyConfig) -> Self {
        Self::from_shared(Arc::new(inner), config)
    }

    /// Wrap a shared `inner` with the copy layer.
    #[must_use]
    pub fn from_shared(inner: Arc<S>, config: CopyConfig) -> Self {
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// The wrapped service.
    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    async fn handle(&self, req: http::Request<CopyBody>) -> http::Response<CopyBody> {
        let mut tracker = StageTracker::new();
        tracker.advance(CopyStage::ClassifyingRequest);

        let (parts, body) = req.into_parts();
        let (method, path) = match detect(&parts, &self.config) {
            RequestKind::PassThrough => {
                return self.inner.call(http::Request::from_parts(parts, body)).await;
            }
            RequestKind::Options => {
                let resp = self.inner.call(http::Request::from_parts(parts, body)).await;
                return adapt_options_response(resp);
            }
            RequestKind::Copy { method, path } => (method, path),
        };

        tracker.advance(CopyStage::ValidatingPaths);
        let op = match normalize(&parts, method, path) {
            Ok(op) => op,
            Err(err) => {
                tracker.fail();
                warn!(%method, uri = %parts.uri, error = %err, "rejected copy request");
                return err.into_response();
            }
        };
        // Copy requests are bodiless.
        drop(body);

        match self.execute(&op, &mut tracker).await {
            Ok(resp) => {
                tracker.advance(CopyStage::Done);
                resp
            }
            Err(err) => {
                tracker.fail();
                debug!(source = %op.source, destination = %op.destination, error = %err, "copy failed");
                err.into_response()
            }
        }
    }

    async fn execute(
        &self,
        op: &CopyOperation,
        tracker: &mut StageTracker,
    ) -> Result<http::Response<CopyBody>, CopyError> {
        if op.method != CopyMethod::Post {
            info!(
                source = %op.source,
                destination = %op.destination,
                "Copying object from {} to {}",
                op.source,
                op.destination
            );
        }

        tracker.advance(CopyStage::Fetching);
        let source = SourceFetcher::new(self.inner.as_ref(), self.config.max_object_size)
            .fetch(op)
            .await?;

        tracker.advance(CopyStage::Merging);
        let destination = merge_headers(
            &source.headers,
            &op.headers,
            MergePolicy::for_operation(op),
            op.manifest_mode,
        );
        let extra = copied_from_headers(op, &source, &destination.headers);

        tracker.advance(CopyStage::Writing);
        let write = build_write_request(op, source, destination)?;
        debug!(uri = %write.uri(), "issuing destination write");
        let resp = self.inner.call(write).await;

        Ok(adapt_copy_response(resp, op.is_post_as_copy, extra))
    }
}

impl<S: ObjectService> ObjectService for ServerSideCopy<S> {
    fn call(&self, req: http::Request<CopyBody>) -> ServiceFuture<'_> {
        Box::pin(self.handle(req))
    }
}

/// Build the PUT sub-request writing the destination of `op`.
///
/// Takes ownership of the source so its body streams straight into the write.
///
/// # Errors
///
/// Returns [`CopyError::PreconditionFailed`] if the destination path does not
/// form a valid URI.
pub fn build_write_request(
    op: &CopyOperation,
    source: SourceResponse,
    destination: DestinationHeaders,
) -> Result<http::Request<CopyBody>, CopyError> {
    let mut query = op.query.clone();
    match destination.manifest_mode.as_query_value() {
        Some(value) => query.set(MULTIPART_MANIFEST, value),
        None => query.remove(MULTIPART_MANIFEST),
    }
    if op.manifest_mode != ManifestMode::None && destination.manifest_mode == ManifestMode::None {
        debug!(destination = %op.destination, "copying dynamic manifest pointer");
    }

    let uri: http::Uri = query
        .with_path(&op.destination.to_request_path(&op.version))
        .parse()
        .map_err(|_| CopyError::invalid_destination())?;

    let mut req = http::Request::new(source.body);
    *req.method_mut() = http::Method::PUT;
    *req.uri_mut() = uri;

    let headers = req.headers_mut();
    *headers = destination.headers;
    match source.content_length {
        Some(len) => {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
        None => {
            headers.remove(CONTENT_LENGTH);
        }
    }
    match source
        .etag
        .as_deref()
        .and_then(|etag| HeaderValue::from_str(etag).ok())
    {
        Some(etag) => {
            headers.insert(ETAG, etag);
        }
        None => {
            headers.remove(ETAG);
        }
    }

    let extensions = req.extensions_mut();
    extensions.clone_from(&op.extensions);
    extensions.insert(SubRequestContext {
        swift_source: SWIFT_SOURCE,
        authorize_override: false,
        original_method: op.method,
    });

    Ok(req)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, StatusCode};

    use super::*;
    use crate::error::{
        COPY_FROM_FORMAT_MESSAGE, DESTINATION_REQUIRED_MESSAGE, ZERO_BYTE_BODY_MESSAGE,
    };
    use crate::headers::{X_COPIED_FROM, X_COPIED_FROM_ACCOUNT, X_COPIED_FROM_LAST_MODIFIED};
    use crate::testing::{RecordingService, SourceObject, body_string, response};

    fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> http::Request<CopyBody> {
        let mut builder = http::Request::builder()
            .method(Method::from_bytes(method.as_bytes()).expect("valid method"))
            .uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(CopyBody::empty()).expect("valid request")
    }

    fn layer(service: &Arc<RecordingService>) -> ServerSideCopy<RecordingService> {
        ServerSideCopy::from_shared(Arc::clone(service), CopyConfig::default())
    }

    #[test]
    fn test_should_only_move_forward_through_stages() {
        let mut tracker = StageTracker::new();
        assert!(tracker.advance(CopyStage::ClassifyingRequest));
        assert!(tracker.advance(CopyStage::Fetching));
        assert!(!tracker.advance(CopyStage::ValidatingPaths));
        assert_eq!(tracker.stage(), CopyStage::Fetching);

        tracker.fail();
        assert_eq!(tracker.stage(), CopyStage::Failed);
        assert!(!tracker.advance(CopyStage::Done));
        assert!(tracker.stage().is_terminal());
    }

    #[tokio::test]
    async fn test_should_pass_through_plain_requests_untouched() {
        let service = RecordingService::new(|_| response(StatusCode::OK, &[("x-seen", "1")], "hi"));
        let resp = layer(&service)
            .call(request("GET", "/v1/AUTH_a/c/o", &[("X-Object-Meta-A", "1")]))
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "hi");
        let recorded = service.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].uri, "/v1/AUTH_a/c/o");
        assert!(recorded[0].context.is_none());
    }

    #[tokio::test]
    async fn test_should_copy_via_put() {
        let service = RecordingService::with_source(
            SourceObject::new("hello world")
                .header("x-object-meta-color", "blue")
                .header("last-modified", "Tue, 01 Jan 2030 00:00:00 GMT"),
        );
        let resp = layer(&service)
            .call(request(
                "PUT",
                "/v1/AUTH_a/dst/obj",
                &[("X-Copy-From", "/src/obj"), ("X-Object-Meta-Size", "big")],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()[X_COPIED_FROM], "src/obj");
        assert!(!resp.headers().contains_key(X_COPIED_FROM_ACCOUNT));
        assert_eq!(
            resp.headers()[X_COPIED_FROM_LAST_MODIFIED],
            "Tue, 01 Jan 2030 00:00:00 GMT"
        );
        assert_eq!(resp.headers()["x-object-meta-color"], "blue");
        assert_eq!(resp.headers()["x-object-meta-size"], "big");

        let recorded = service.requests();
        assert_eq!(recorded.len(), 2);
        let (read, write) = (&recorded[0], &recorded[1]);
        assert_eq!(read.method, Method::GET);
        assert_eq!(read.uri, "/v1/AUTH_a/src/obj");

        assert_eq!(write.method, Method::PUT);
        assert_eq!(write.uri, "/v1/AUTH_a/dst/obj");
        assert_eq!(write.body, Bytes::from_static(b"hello world"));
        assert_eq!(write.headers[CONTENT_LENGTH], "11");
        assert_eq!(write.headers[ETAG], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(write.headers["content-type"], "text/plain");
        assert!(!write.headers.contains_key("x-copy-from"));
        let ctx = write.context.expect("write carries context");
        assert_eq!(ctx.swift_source, "SSC");
        assert_eq!(ctx.original_method, CopyMethod::Put);
    }

    #[tokio::test]
    async fn test_should_reject_body_without_any_sub_request() {
        let service = RecordingService::with_source(SourceObject::new("x"));
        let resp = layer(&service)
            .call(request(
                "PUT",
                "/v1/AUTH_a/c/o",
                &[("X-Copy-From", "/c/src"), ("Content-Length", "3")],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(resp).await, ZERO_BYTE_BODY_MESSAGE);
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_malformed_headers_without_any_sub_request() {
        let service = RecordingService::with_source(SourceObject::new("x"));
        let copy = layer(&service);

        let resp = copy
            .call(request("PUT", "/v1/AUTH_a/c/o", &[("X-Copy-From", "/only")]))
            .await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(body_string(resp).await, COPY_FROM_FORMAT_MESSAGE);

        let resp = copy.call(request("COPY", "/v1/AUTH_a/c/o", &[])).await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(body_string(resp).await, DESTINATION_REQUIRED_MESSAGE);

        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_not_write_when_source_is_too_large() {
        let service = RecordingService::with_source(SourceObject::new("0123456789"));
        let config = CopyConfig::builder().max_object_size(4).build();
        let copy = ServerSideCopy::from_shared(Arc::clone(&service), config);

        let resp = copy
            .call(request("PUT", "/v1/AUTH_a/c/o", &[("X-Copy-From", "/c/src")]))
            .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(service.methods(), vec![Method::GET]);
    }

    #[tokio::test]
    async fn test_should_not_write_when_source_length_is_unknown() {
        let mut source = SourceObject::new("streamed");
        source.content_length = None;
        let service = RecordingService::with_source(source);

        let resp = layer(&service)
            .call(request("PUT", "/v1/AUTH_a/c/o", &[("X-Copy-From", "/c/src")]))
            .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(service.methods(), vec![Method::GET]);
    }

    #[tokio::test]
    async fn test_should_return_source_error_without_writing() {
        let service = RecordingService::new(|_| response(StatusCode::NOT_FOUND, &[], "missing"));
        let resp = layer(&service)
            .call(request("COPY", "/v1/AUTH_a/c/o", &[("Destination", "/c/o2")]))
            .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "missing");
        assert_eq!(service.methods(), vec![Method::GET]);
    }

    #[tokio::test]
    async fn test_should_pass_write_failure_through() {
        let service = RecordingService::new(|req| match req.method {
            Method::GET => SourceObject::new("abc").response(),
            _ => response(StatusCode::INSUFFICIENT_STORAGE, &[], "full"),
        });
        let resp = layer(&service)
            .call(request("PUT", "/v1/AUTH_a/c/o", &[("X-Copy-From", "/c/src")]))
            .await;

        assert_eq!(resp.status(), StatusCode::INSUFFICIENT_STORAGE);
        assert!(!resp.headers().contains_key(X_COPIED_FROM));
        assert_eq!(body_string(resp).await, "full");
    }

    #[tokio::test]
    async fn test_should_copy_across_accounts() {
        let service = RecordingService::with_source(SourceObject::new("data"));
        let resp = layer(&service)
            .call(request(
                "COPY",
                "/v1/AUTH_a/c/o",
                &[("Destination", "c2/o2"), ("Destination-Account", "AUTH_b")],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()[X_COPIED_FROM_ACCOUNT], "AUTH_a");
        assert_eq!(resp.headers()[X_COPIED_FROM], "c/o");

        let recorded = service.requests();
        assert_eq!(recorded[0].uri, "/v1/AUTH_a/c/o");
        assert_eq!(recorded[1].uri, "/v1/AUTH_b/c2/o2");
        assert!(!recorded[1].headers.contains_key("x-copy-from-account"));
        assert!(!recorded[1].headers.contains_key("destination-account"));
        assert_eq!(
            recorded[1].context.map(|c| c.original_method),
            Some(CopyMethod::Copy)
        );
    }

    #[tokio::test]
    async fn test_should_report_post_as_copy_as_accepted() {
        let service = RecordingService::with_source(
            SourceObject::new("body")
                .header("x-object-meta-old", "1")
                .header("x-object-sysmeta-keep", "src"),
        );
        let resp = layer(&service)
            .call(request(
                "POST",
                "/v1/AUTH_a/c/o",
                &[
                    ("X-Object-Meta-New", "2"),
                    ("X-Object-Sysmeta-Keep", "forged"),
                    ("Content-Length", "0"),
                ],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(!resp.headers().contains_key(X_COPIED_FROM));

        let recorded = service.requests();
        let (read, write) = (&recorded[0], &recorded[1]);
        assert_eq!(read.uri, "/v1/AUTH_a/c/o?multipart-manifest=get&format=raw");
        assert!(read.context.is_some_and(|c| c.authorize_override));

        assert_eq!(write.uri, "/v1/AUTH_a/c/o?multipart-manifest=get");
        assert_eq!(write.headers["x-object-meta-new"], "2");
        assert_eq!(write.headers["x-object-sysmeta-keep"], "src");
        assert!(!write.headers.contains_key("x-object-meta-old"));
        assert_eq!(write.body, Bytes::from_static(b"body"));
    }

    #[tokio::test]
    async fn test_should_pass_post_through_when_post_as_copy_disabled() {
        let service = RecordingService::new(|_| response(StatusCode::ACCEPTED, &[], ""));
        let config = CopyConfig::builder().object_post_as_copy(false).build();
        let copy = ServerSideCopy::from_shared(Arc::clone(&service), config);

        let resp = copy.call(request("POST", "/v1/AUTH_a/c/o", &[])).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(service.methods(), vec![Method::POST]);
    }

    #[tokio::test]
    async fn test_should_store_static_manifest_with_put_mode() {
        let service = RecordingService::with_source(
            SourceObject::new("[{\"path\": \"/seg/1\"}]").header("x-static-large-object", "True"),
        );
        let resp = layer(&service)
            .call(request(
                "PUT",
                "/v1/AUTH_a/c/manifest-copy?multipart-manifest=get",
                &[("X-Copy-From", "/c/manifest")],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let recorded = service.requests();
        assert_eq!(
            recorded[0].uri,
            "/v1/AUTH_a/c/manifest?multipart-manifest=get&format=raw"
        );
        assert_eq!(
            recorded[1].uri,
            "/v1/AUTH_a/c/manifest-copy?multipart-manifest=put"
        );
    }

    #[tokio::test]
    async fn test_should_copy_dynamic_manifest_pointer() {
        let service = RecordingService::with_source(
            SourceObject::new("").header("x-object-manifest", "segs/prefix"),
        );
        let resp = layer(&service)
            .call(request(
                "PUT",
                "/v1/AUTH_a/c/dlo-copy?multipart-manifest=get",
                &[("X-Copy-From", "/c/dlo")],
            ))
            .await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let write = &service.requests()[1];
        assert_eq!(write.uri, "/v1/AUTH_a/c/dlo-copy");
        assert_eq!(write.headers["x-object-manifest"], "segs/prefix");
    }

    #[tokio::test]
    async fn test_should_advertise_copy_in_options() {
        let service = RecordingService::new(|_| {
            response(StatusCode::OK, &[("allow", "GET, PUT, OPTIONS")], "")
        });
        let resp = layer(&service)
            .call(request("OPTIONS", "/v1/AUTH_a/c/o", &[]))
            .await;
        assert_eq!(resp.headers()["allow"], "GET, PUT, OPTIONS, COPY");
    }

    #[tokio::test]
    async fn test_should_not_touch_options_outside_object_scope() {
        let service = RecordingService::new(|_| response(StatusCode::OK, &[("allow", "GET")], ""));
        let resp = layer(&service)
            .call(request("OPTIONS", "/v1/AUTH_a/c", &[]))
            .await;
        assert_eq!(resp.headers()["allow"], "GET");
    }

    #[tokio::test]
    async fn test_should_stack_as_object_service() {
        let service = RecordingService::with_source(SourceObject::new("abc"));
        let inner = layer(&service);
        let outer: Arc<dyn ObjectService> = Arc::new(inner);
        let resp = outer
            .call(request("COPY", "/v1/AUTH_a/c/o", &[("Destination", "/c/o2")]))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
