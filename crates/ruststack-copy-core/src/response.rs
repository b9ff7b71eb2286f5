//! Final adjustments to responses leaving the copy pipeline.

use http::header::{ALLOW, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::body::CopyBody;
use crate::fetch::SourceResponse;
use crate::headers::{
    ACCESS_CONTROL_ALLOW_METHODS, COPY_METHOD, X_COPIED_FROM, X_COPIED_FROM_ACCOUNT,
    X_COPIED_FROM_LAST_MODIFIED,
};
use crate::meta::{is_pass_through, is_sys_or_user_meta};
use crate::operation::CopyOperation;
use crate::path::quote;

/// Headers reported back to the client after a successful copy.
///
/// `X-Copied-From` and `X-Copied-From-Account` are URL-encoded. The metadata
/// that ended up on the destination is included as well.
#[must_use]
pub fn copied_from_headers(
    op: &CopyOperation,
    source: &SourceResponse,
    written: &HeaderMap,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let copied_from = op.source.container_object();
    insert_quoted(&mut headers, X_COPIED_FROM, copied_from.trim_start_matches('/'));
    if op.is_cross_account() {
        insert_quoted(&mut headers, X_COPIED_FROM_ACCOUNT, &op.source.account);
    }
    if let Some(last_modified) = source.last_modified() {
        headers.insert(X_COPIED_FROM_LAST_MODIFIED, last_modified.clone());
    }

    for (name, value) in written {
        if is_sys_or_user_meta(name) || is_pass_through(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn insert_quoted(headers: &mut HeaderMap, name: &'static str, value: &str) {
    // `quote` escapes every control and non-ASCII byte, so this always converts.
    if let Ok(value) = HeaderValue::from_str(&quote(value)) {
        headers.insert(name, value);
    }
}

/// Adjust the write sub-request's response for the client.
///
/// A post-as-copy reporting `201 Created` becomes `202 Accepted`. Any other
/// successful write gets `extra` appended. Failures pass through unchanged.
#[must_use]
pub fn adapt_copy_response(
    mut resp: http::Response<CopyBody>,
    is_post_as_copy: bool,
    extra: HeaderMap,
) -> http::Response<CopyBody> {
    if is_post_as_copy {
        if resp.status() == StatusCode::CREATED {
            *resp.status_mut() = StatusCode::ACCEPTED;
        }
    } else if resp.status().is_success() {
        let headers = resp.headers_mut();
        let mut current: Option<HeaderName> = None;
        for (name, value) in extra {
            if let Some(name) = name {
                headers.remove(&name);
                current = Some(name);
            }
            if let Some(name) = &current {
                headers.append(name.clone(), value);
            }
        }
    }
    resp
}

/// Advertise COPY in the `Allow` and CORS allowed-methods headers of a
/// successful OPTIONS response.
///
/// Applying it twice gives the same result as applying it once.
///
/// # Examples
///
/// ```
/// use ruststack_copy_core::body::CopyBody;
/// use ruststack_copy_core::response::adapt_options_response;
///
/// let resp = http::Response::builder()
///     .header("allow", "GET, PUT")
///     .body(CopyBody::empty())
///     .unwrap();
/// let resp = adapt_options_response(adapt_options_response(resp));
/// assert_eq!(resp.headers()["allow"], "GET, PUT, COPY");
/// ```
#[must_use]
pub fn adapt_options_response(mut resp: http::Response<CopyBody>) -> http::Response<CopyBody> {
    if !resp.status().is_success() {
        return resp;
    }
    let headers = resp.headers_mut();
    for name in [ALLOW, HeaderName::from_static(ACCESS_CONTROL_ALLOW_METHODS)] {
        let Some(current) = headers.get(&name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let has_copy = current
            .split(',')
            .any(|m| m.trim().eq_ignore_ascii_case(COPY_METHOD));
        if has_copy {
            continue;
        }
        let updated = if current.trim().is_empty() {
            COPY_METHOD.to_owned()
        } else {
            format!("{current}, {COPY_METHOD}")
        };
        if let Ok(value) = HeaderValue::from_str(&updated) {
            headers.insert(name, value);
        }
    }
    resp
}
