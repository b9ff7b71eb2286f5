//! hyper front end for an [`ObjectService`].
//!
//! [`Gateway`] implements hyper's `Service` trait. It answers the health probe
//! itself, streams every other request body into a [`CopyBody`] without
//! buffering it, and stamps a transaction id on each response.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::debug;
use uuid::Uuid;

use ruststack_copy_core::body::CopyBody;
use ruststack_copy_core::service::ObjectService;

/// Path of the health probe.
pub const HEALTH_CHECK_PATH: &str = "/healthcheck";

/// Server version reported by the health probe.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// hyper service dispatching requests to an object service.
#[derive(Debug)]
pub struct Gateway<S: ObjectService> {
    inner: Arc<S>,
}

impl<S: ObjectService> Clone for Gateway<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ObjectService> Gateway<S> {
    /// Serve `inner`.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The served object service.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Handle a request whose body is already a [`CopyBody`].
    pub async fn dispatch(&self, req: http::Request<CopyBody>) -> http::Response<CopyBody> {
        let trans_id = format!("tx{}", Uuid::new_v4().simple());
        debug!(method = %req.method(), uri = %req.uri(), %trans_id, "processing request");

        let resp = if is_health_check(req.method(), req.uri().path()) {
            health_check_response()
        } else {
            self.inner.call(req).await
        };
        add_common_headers(resp, &trans_id)
    }
}

impl<S: ObjectService> Service<http::Request<Incoming>> for Gateway<S> {
    type Response = http::Response<CopyBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.dispatch(req.map(streaming_body)).await) })
    }
}

/// Wrap a hyper body as a lazily read [`CopyBody`].
fn streaming_body(incoming: Incoming) -> CopyBody {
    CopyBody::from_stream(incoming.into_data_stream().map_err(std::io::Error::other))
}

fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == HEALTH_CHECK_PATH
}

fn health_check_response() -> http::Response<CopyBody> {
    let body = serde_json::json!({ "status": "running", "version": VERSION }).to_string();
    let mut resp = http::Response::new(CopyBody::from_string(body));
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    resp
}

/// Add the headers every response carries.
fn add_common_headers(
    mut response: http::Response<CopyBody>,
    trans_id: &str,
) -> http::Response<CopyBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = http::HeaderValue::from_str(trans_id) {
        headers.insert("x-trans-id", hv.clone());
        headers.insert("x-openstack-request-id", hv);
    }
    let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    if let Ok(hv) = http::HeaderValue::from_str(&date) {
        headers.insert(http::header::DATE, hv);
    }
    response
}
