//! Recording fake object service used by the pipeline tests.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::BodyExt;
use parking_lot::Mutex;

use crate::body::CopyBody;
use crate::service::{ObjectService, ServiceFuture, SubRequestContext};

/// A request as seen by the fake service, body fully read.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub context: Option<SubRequestContext>,
    pub body: Bytes,
}

type Responder = dyn Fn(&RecordedRequest) -> http::Response<CopyBody> + Send + Sync;

/// Object service that records every request and answers through a closure.
pub struct RecordingService {
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Box<Responder>,
}

impl std::fmt::Debug for RecordingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingService")
            .field("requests", &self.requests.lock().len())
            .finish_non_exhaustive()
    }
}

impl RecordingService {
    pub fn new(
        responder: impl Fn(&RecordedRequest) -> http::Response<CopyBody> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Serves `source` for every GET and answers every PUT with 201.
    pub fn with_source(source: SourceObject) -> Arc<Self> {
        Self::new(move |req| match req.method {
            Method::GET => source.response(),
            Method::PUT => response(StatusCode::CREATED, &[("etag", "\"written\"")], ""),
            _ => response(StatusCode::NO_CONTENT, &[], ""),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn methods(&self) -> Vec<Method> {
        self.requests.lock().iter().map(|r| r.method.clone()).collect()
    }
}

impl ObjectService for RecordingService {
    fn call(&self, req: http::Request<CopyBody>) -> ServiceFuture<'_> {
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
            let recorded = RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                context: parts.extensions.get::<SubRequestContext>().copied(),
                body,
            };
            let resp = (self.responder)(&recorded);
            self.requests.lock().push(recorded);
            resp
        })
    }
}

/// A canned source object.
#[derive(Debug, Clone)]
pub struct SourceObject {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
    pub content_length: Option<u64>,
}

impl SourceObject {
    pub fn new(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![
                ("content-type", "text/plain"),
                ("etag", "\"5d41402abc4b2a76b9719d911017c592\""),
            ],
            body,
            content_length: Some(body.len() as u64),
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn response(&self) -> http::Response<CopyBody> {
        let mut resp = http::Response::builder().status(self.status);
        for (k, v) in &self.headers {
            resp = resp.header(*k, *v);
        }
        if let Some(len) = self.content_length {
            resp = resp.header(http::header::CONTENT_LENGTH, len);
        }
        let chunks: Vec<Bytes> = self
            .body
            .as_bytes()
            .chunks(4)
            .map(Bytes::copy_from_slice)
            .collect();
        resp.body(CopyBody::from_chunks(chunks))
            .expect("valid test response")
    }
}

pub fn response(
    status: StatusCode,
    headers: &[(&'static str, &'static str)],
    body: &'static str,
) -> http::Response<CopyBody> {
    let mut resp = http::Response::builder().status(status);
    for (k, v) in headers {
        resp = resp.header(*k, *v);
    }
    resp.body(CopyBody::from_string(body))
        .expect("valid test response")
}

pub async fn body_string(resp: http::Response<CopyBody>) -> String {
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
