//! In-memory object store.
//!
//! A small object backend good enough to sit behind the copy layer: objects are
//! kept whole in memory, keyed by `/<account>/<container>/<object>`, and served
//! back as a chunked stream.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use md5::{Digest, Md5};
use tracing::debug;

use ruststack_copy_core::body::CopyBody;
use ruststack_copy_core::headers::{MULTIPART_MANIFEST, X_OBJECT_MANIFEST, X_STATIC_LARGE_OBJECT};
use ruststack_copy_core::meta::{
    copy_header_subset, is_copied_metadata, is_pass_through, is_user_meta_or_transient,
    remove_items,
};
use ruststack_copy_core::path::{ObjectPath, RequestPath};
use ruststack_copy_core::query::QueryParams;
use ruststack_copy_core::service::{ObjectService, ServiceFuture, SubRequestContext};

/// Size of the chunks an object body is streamed in.
const CHUNK_SIZE: usize = 64 * 1024;

/// Methods an object supports.
const ALLOWED_METHODS: &str = "HEAD, GET, PUT, POST, OPTIONS, DELETE";

/// Content type stored when a PUT does not name one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
    headers: HeaderMap,
}

impl StoredObject {
    fn response_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.data.len() as u64));
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", self.etag)) {
            headers.insert(ETAG, etag);
        }
        if let Ok(lm) = HeaderValue::from_str(&http_date(self.last_modified)) {
            headers.insert(LAST_MODIFIED, lm);
        }
        headers
    }
}

/// Thread-safe in-memory object store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<DashMap<ObjectPath, StoredObject>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, req: http::Request<CopyBody>) -> http::Response<CopyBody> {
        let (parts, body) = req.into_parts();
        let Some(path) = RequestPath::parse(parts.uri.path()) else {
            return text(StatusCode::NOT_FOUND, "Not Found");
        };
        if let Some(ctx) = parts.extensions.get::<SubRequestContext>() {
            debug!(
                method = %parts.method,
                object = %path.object,
                swift_source = ctx.swift_source,
                original_method = %ctx.original_method,
                "store sub-request"
            );
        }

        match parts.method {
            Method::GET => self.get(&path.object, true),
            Method::HEAD => self.get(&path.object, false),
            Method::PUT => self.put(path.object, &parts, body).await,
            Method::POST => self.post(&path.object, &parts.headers),
            Method::DELETE => match self.objects.remove(&path.object) {
                Some(_) => status(StatusCode::NO_CONTENT),
                None => text(StatusCode::NOT_FOUND, "Not Found"),
            },
            Method::OPTIONS => {
                let mut resp = status(StatusCode::OK);
                resp.headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
                resp
            }
            _ => text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
        }
    }

    fn get(&self, path: &ObjectPath, with_body: bool) -> http::Response<CopyBody> {
        let Some(object) = self.objects.get(path).map(|o| o.value().clone()) else {
            return text(StatusCode::NOT_FOUND, "Not Found");
        };

        let body = if with_body {
            let chunks: Vec<Bytes> = (0..object.data.len())
                .step_by(CHUNK_SIZE)
                .map(|start| object.data.slice(start..object.data.len().min(start + CHUNK_SIZE)))
                .collect();
            CopyBody::from_chunks(chunks)
        } else {
            CopyBody::empty()
        };

        let mut resp = http::Response::new(body);
        *resp.headers_mut() = object.response_headers();
        resp
    }

    async fn put(
        &self,
        path: ObjectPath,
        parts: &http::request::Parts,
        body: CopyBody,
    ) -> http::Response<CopyBody> {
        let data = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                debug!(error = %err, object = %path, "failed to read object body");
                return text(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len != data.len() as u64) {
            return text(StatusCode::BAD_REQUEST, "Content-Length does not match body");
        }

        let etag = hex::encode(Md5::digest(&data));
        if let Some(expected) = parts.headers.get(ETAG).and_then(|v| v.to_str().ok()) {
            if !expected.trim_matches('"').eq_ignore_ascii_case(&etag) {
                return text(StatusCode::UNPROCESSABLE_ENTITY, "Unprocessable Entity");
            }
        }

        let mut headers = HeaderMap::new();
        copy_header_subset(&parts.headers, &mut headers, is_stored_header);
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        if QueryParams::from_uri(&parts.uri).get(MULTIPART_MANIFEST) == Some("put") {
            headers.insert(X_STATIC_LARGE_OBJECT, HeaderValue::from_static("True"));
        }

        let object = StoredObject {
            data,
            etag,
            last_modified: Utc::now(),
            headers,
        };
        let stored = object.response_headers();
        let mut resp = status(StatusCode::CREATED);
        let resp_headers = resp.headers_mut();
        for name in [ETAG, LAST_MODIFIED] {
            if let Some(value) = stored.get(&name) {
                resp_headers.insert(name, value.clone());
            }
        }
        debug!(object = %path, size = object.data.len(), "stored object");
        self.objects.insert(path, object);
        resp
    }

    fn post(&self, path: &ObjectPath, headers: &HeaderMap) -> http::Response<CopyBody> {
        let Some(mut object) = self.objects.get_mut(path) else {
            return text(StatusCode::NOT_FOUND, "Not Found");
        };
        remove_items(&mut object.headers, is_user_meta_or_transient);
        copy_header_subset(headers, &mut object.headers, |name| {
            is_user_meta_or_transient(name) || is_pass_through(name) || name == CONTENT_TYPE
        });
        object.last_modified = Utc::now();
        status(StatusCode::ACCEPTED)
    }
}

impl ObjectService for MemoryStore {
    fn call(&self, req: http::Request<CopyBody>) -> ServiceFuture<'_> {
        Box::pin(self.handle(req))
    }
}

/// Whether a PUT header is persisted with the object.
fn is_stored_header(name: &HeaderName) -> bool {
    is_copied_metadata(name)
        || name == CONTENT_TYPE
        || name == http::header::CONTENT_ENCODING
        || name == http::header::CONTENT_DISPOSITION
        || name.as_str() == X_OBJECT_MANIFEST
}

/// Format a timestamp as an HTTP date.
fn http_date(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn status(code: StatusCode) -> http::Response<CopyBody> {
    let mut resp = http::Response::new(CopyBody::empty());
    *resp.status_mut() = code;
    resp.headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    resp
}

fn text(code: StatusCode, message: &'static str) -> http::Response<CopyBody> {
    let mut resp = http::Response::new(CopyBody::from_string(message));
    *resp.status_mut() = code;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(message.len() as u64));
    resp
}
