//! Source object retrieval.
//!
//! [`SourceFetcher`] issues the GET sub-request for the copy source and checks
//! that the response can be copied: a success status and a known length no
//! larger than the configured ceiling. The body is never read here; it stays a
//! lazy stream until the write sub-request consumes it.

use http::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::debug;

use crate::body::CopyBody;
use crate::error::CopyError;
use crate::headers::{FORMAT, SWIFT_SOURCE, X_BACKEND_STORAGE_POLICY_INDEX, X_NEWEST};
use crate::operation::{CopyOperation, ManifestMode};
use crate::service::{ObjectService, SubRequestContext};

/// The source object's response.
#[derive(Debug)]
pub struct SourceResponse {
    /// Status of the read.
    pub status: StatusCode,
    /// Response headers of the read.
    pub headers: HeaderMap,
    /// Object content, not yet consumed.
    pub body: CopyBody,
    /// Declared length. `None` means the size is unbounded.
    pub content_length: Option<u64>,
    /// Entity tag with surrounding quotes removed.
    pub etag: Option<String>,
}

impl SourceResponse {
    /// Split a sub-request response into its parts.
    #[must_use]
    pub fn from_response(resp: http::Response<CopyBody>) -> Self {
        let (parts, body) = resp.into_parts();
        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let etag = parts
            .headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_owned());
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
            content_length,
            etag,
        }
    }

    /// The source's `Last-Modified` header, if it exposed one.
    #[must_use]
    pub fn last_modified(&self) -> Option<&HeaderValue> {
        self.headers.get(LAST_MODIFIED)
    }
}

/// Issues and validates the source read of a copy.
#[derive(Debug)]
pub struct SourceFetcher<'a, S: ?Sized> {
    service: &'a S,
    max_object_size: u64,
}

impl<'a, S: ObjectService + ?Sized> SourceFetcher<'a, S> {
    /// Create a fetcher reading through `service`.
    pub fn new(service: &'a S, max_object_size: u64) -> Self {
        Self {
            service,
            max_object_size,
        }
    }

    /// Fetch the source object of `op`.
    ///
    /// # Errors
    ///
    /// - [`CopyError::Upstream`] with the read's own response if it did not succeed.
    /// - [`CopyError::EntityTooLarge`] if the length is unknown or above the ceiling.
    ///   The body is dropped before returning.
    pub async fn fetch(&self, op: &CopyOperation) -> Result<SourceResponse, CopyError> {
        let req = build_source_request(op)?;
        debug!(uri = %req.uri(), "issuing source read");

        let resp = self.service.call(req).await;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), source = %op.source, "source read failed");
            return Err(CopyError::Upstream(Box::new(resp)));
        }

        let source = SourceResponse::from_response(resp);
        match source.content_length {
            Some(len) if len <= self.max_object_size => Ok(source),
            length => {
                debug!(?length, max = self.max_object_size, "source cannot be copied");
                drop(source.body);
                Err(CopyError::EntityTooLarge)
            }
        }
    }
}

/// Build the GET sub-request for the source of `op`.
///
/// # Errors
///
/// Returns [`CopyError::PreconditionFailed`] if the source path does not form a
/// valid URI.
pub fn build_source_request(op: &CopyOperation) -> Result<http::Request<CopyBody>, CopyError> {
    let mut query = op.query.clone();
    if op.manifest_mode == ManifestMode::Get {
        query.set(FORMAT, "raw");
    }
    let uri: http::Uri = query
        .with_path(&op.source.to_request_path(&op.version))
        .parse()
        .map_err(|_| CopyError::invalid_copy_from())?;

    let mut req = http::Request::new(CopyBody::empty());
    *req.method_mut() = Method::GET;
    *req.uri_mut() = uri;

    let headers = req.headers_mut();
    headers.clone_from(&op.headers);
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    headers.insert(X_NEWEST, HeaderValue::from_static("true"));
    headers.remove(X_BACKEND_STORAGE_POLICY_INDEX);

    let extensions = req.extensions_mut();
    extensions.clone_from(&op.extensions);
    extensions.insert(SubRequestContext {
        swift_source: SWIFT_SOURCE,
        authorize_override: op.is_post_as_copy,
        original_method: op.method,
    });

    Ok(req)
}
