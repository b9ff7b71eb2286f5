//! Request classification and the per-request copy descriptor.
//!
//! [`classify`] is a pure function from the inbound request head to a
//! [`Classification`]. COPY and POST-as-copy requests are normalised into the
//! same shape as a PUT carrying `X-Copy-From`: the resulting [`CopyOperation`]
//! holds a rewritten copy of the request headers and query, never the inbound
//! request itself.
//!
//! Classification rules (first match wins):
//!
//! | Method | Condition | Result |
//! |--------|-----------|--------|
//! | any | path is not `/<ver>/<acct>/<cont>/<obj>` | pass through |
//! | PUT | `X-Copy-From` present | copy |
//! | COPY | | copy (rewritten to PUT at `Destination`) |
//! | POST | post-as-copy enabled | copy onto itself |
//! | OPTIONS | | options augmentation |
//! | other | | pass through |

use http::header::{CONTENT_LENGTH, RANGE};
use http::{HeaderMap, HeaderValue, Method};

use crate::config::{CopyConfig, parse_bool};
use crate::error::{CopyError, INVALID_CONTENT_LENGTH_MESSAGE};
use crate::headers::{
    DESTINATION, DESTINATION_ACCOUNT, MULTIPART_MANIFEST, X_COPY_FROM, X_COPY_FROM_ACCOUNT,
    X_FRESH_METADATA,
};
use crate::path::{
    ObjectPath, PathHeader, RequestPath, check_account_format, quote, resolve_path_header,
};
use crate::query::QueryParams;

/// The method a copy-like request arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    /// PUT carrying `X-Copy-From`.
    Put,
    /// COPY carrying `Destination`.
    Copy,
    /// POST translated into a copy of the object onto itself.
    Post,
}

impl CopyMethod {
    /// The method as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Copy => "COPY",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for CopyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a large object manifest is treated by the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestMode {
    /// No manifest handling requested; large objects are copied by content.
    #[default]
    None,
    /// `multipart-manifest=get`: read the manifest itself.
    Get,
    /// `multipart-manifest=put`: store the source manifest verbatim.
    Put,
}

impl ManifestMode {
    /// The query parameter value, if any.
    #[must_use]
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Get => Some("get"),
            Self::Put => Some("put"),
        }
    }
}

/// What to do with an inbound request.
#[derive(Debug)]
pub enum Classification {
    /// Not a copy-like request; hand it to the underlying service unchanged.
    PassThrough,
    /// Object OPTIONS request; advertise COPY in the response.
    Options,
    /// A copy-like request, normalised.
    Copy(Box<CopyOperation>),
}

/// A fully resolved copy request.
///
/// Source and destination are always fully qualified.
#[derive(Debug, Clone)]
pub struct CopyOperation {
    /// Object to read.
    pub source: ObjectPath,
    /// Object to write.
    pub destination: ObjectPath,
    /// Method the client sent.
    pub method: CopyMethod,
    /// The request is a metadata update carried out as a copy onto itself.
    pub is_post_as_copy: bool,
    /// `X-Fresh-Metadata` was set to a true value.
    pub fresh_metadata_requested: bool,
    /// Manifest handling requested through the query string.
    pub manifest_mode: ManifestMode,
    /// API version segment of the request path.
    pub version: String,
    /// Headers of the request after normalisation into a PUT.
    pub headers: HeaderMap,
    /// Query parameters after normalisation.
    pub query: QueryParams,
    /// Extensions of the inbound request.
    pub extensions: http::Extensions,
}

impl CopyOperation {
    /// Whether source and destination live in different accounts.
    #[must_use]
    pub fn is_cross_account(&self) -> bool {
        self.source.account != self.destination.account
    }
}

/// Classify an inbound request.
///
/// No I/O happens here. Every validation failure of a copy-like request is
/// reported before anything is fetched.
///
/// # Errors
///
/// Returns [`CopyError`] for a malformed copy request: missing or malformed
/// `Destination`/`X-Copy-From`, a bad account header, or a non-empty body.
pub fn classify(
    parts: &http::request::Parts,
    config: &CopyConfig,
) -> Result<Classification, CopyError> {
    match detect(parts, config) {
        RequestKind::PassThrough => Ok(Classification::PassThrough),
        RequestKind::Options => Ok(Classification::Options),
        RequestKind::Copy { method, path } => {
            normalize(parts, method, path).map(|op| Classification::Copy(Box::new(op)))
        }
    }
}

/// The kind of an inbound request, decided from its method, path and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Not handled by the copy pipeline.
    PassThrough,
    /// Object OPTIONS request.
    Options,
    /// A copy-like request that still has to be validated.
    Copy {
        /// Method the client sent.
        method: CopyMethod,
        /// Parsed object path of the request.
        path: RequestPath,
    },
}

/// Decide what kind of request this is without validating any copy header.
#[must_use]
pub fn detect(parts: &http::request::Parts, config: &CopyConfig) -> RequestKind {
    let Some(path) = RequestPath::parse(parts.uri.path()) else {
        return RequestKind::PassThrough;
    };

    let method = match parts.method.as_str() {
        "PUT" if has_value(&parts.headers, X_COPY_FROM) => CopyMethod::Put,
        "COPY" => CopyMethod::Copy,
        "POST" if config.object_post_as_copy => CopyMethod::Post,
        _ if parts.method == Method::OPTIONS => return RequestKind::Options,
        _ => return RequestKind::PassThrough,
    };
    RequestKind::Copy { method, path }
}

/// Validate a copy-like request and normalise it into a [`CopyOperation`].
///
/// # Errors
///
/// See [`classify`].
pub fn normalize(
    parts: &http::request::Parts,
    method: CopyMethod,
    path: RequestPath,
) -> Result<CopyOperation, CopyError> {
    let query = QueryParams::from_uri(&parts.uri);
    match method {
        CopyMethod::Put => normalize_put(parts, path, query),
        CopyMethod::Copy => normalize_copy(parts, path, query),
        CopyMethod::Post => normalize_post(parts, path, query),
    }
}

/// PUT with `X-Copy-From`: the request already has the target shape.
fn normalize_put(
    parts: &http::request::Parts,
    path: RequestPath,
    query: QueryParams,
) -> Result<CopyOperation, CopyError> {
    build_operation(
        parts,
        parts.headers.clone(),
        path.version,
        path.object,
        query,
        CopyMethod::Put,
    )
}

/// COPY: rewrite into a PUT at `Destination`, copying from the request path.
fn normalize_copy(
    parts: &http::request::Parts,
    path: RequestPath,
    query: QueryParams,
) -> Result<CopyOperation, CopyError> {
    let destination = parts
        .headers
        .get(DESTINATION)
        .filter(|v| !v.is_empty())
        .ok_or_else(CopyError::destination_required)?;

    let source = path.object;
    let mut headers = parts.headers.clone();
    let mut dest_account = source.account.clone();

    if let Some(value) = parts.headers.get(DESTINATION_ACCOUNT) {
        dest_account = check_account_format(value.as_bytes())?;
        headers.insert(
            X_COPY_FROM_ACCOUNT,
            quoted_header(&source.account, PathHeader::CopyFrom)?,
        );
        headers.remove(DESTINATION_ACCOUNT);
    }

    let (container, object) =
        resolve_path_header(destination.as_bytes(), PathHeader::Destination)?;

    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    headers.insert(
        X_COPY_FROM,
        quoted_header(&source.container_object(), PathHeader::CopyFrom)?,
    );
    headers.remove(DESTINATION);

    build_operation(
        parts,
        headers,
        path.version,
        ObjectPath::new(dest_account, container, object),
        query,
        CopyMethod::Copy,
    )
}

/// POST-as-copy: a PUT of the whole object onto itself, manifest copied as-is.
fn normalize_post(
    parts: &http::request::Parts,
    path: RequestPath,
    mut query: QueryParams,
) -> Result<CopyOperation, CopyError> {
    let mut headers = parts.headers.clone();
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    headers.remove(RANGE);
    headers.insert(
        X_COPY_FROM,
        quoted_header(&path.object.container_object(), PathHeader::CopyFrom)?,
    );
    query.set(MULTIPART_MANIFEST, "get");

    build_operation(
        parts,
        headers,
        path.version,
        path.object,
        query,
        CopyMethod::Post,
    )
}

/// Shared tail of every copy-like request, operating on the PUT-shaped headers.
fn build_operation(
    parts: &http::request::Parts,
    headers: HeaderMap,
    version: String,
    destination: ObjectPath,
    query: QueryParams,
    method: CopyMethod,
) -> Result<CopyOperation, CopyError> {
    if let Some(len) = headers.get(CONTENT_LENGTH) {
        let len = len
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(CopyError::BadRequest {
                message: INVALID_CONTENT_LENGTH_MESSAGE,
            })?;
        if len != 0 {
            return Err(CopyError::non_empty_body());
        }
    }

    let source_account = match headers.get(X_COPY_FROM_ACCOUNT) {
        Some(value) if !value.is_empty() => check_account_format(value.as_bytes())?,
        _ => destination.account.clone(),
    };

    let copy_from = headers
        .get(X_COPY_FROM)
        .ok_or_else(CopyError::invalid_copy_from)?;
    let (container, object) = resolve_path_header(copy_from.as_bytes(), PathHeader::CopyFrom)?;

    let fresh_metadata_requested = header_str(&headers, X_FRESH_METADATA).is_some_and(parse_bool);
    let manifest_mode = if query.get(MULTIPART_MANIFEST) == Some("get") {
        ManifestMode::Get
    } else {
        ManifestMode::None
    };

    Ok(CopyOperation {
        source: ObjectPath::new(source_account, container, object),
        destination,
        method,
        is_post_as_copy: method == CopyMethod::Post,
        fresh_metadata_requested,
        manifest_mode,
        version,
        headers,
        query,
        extensions: parts.extensions.clone(),
    })
}

/// Header value as a string, if present and visible ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Whether the header is present with a non-empty value, whatever its encoding.
fn has_value(headers: &HeaderMap, name: &str) -> bool {
    headers.get(name).is_some_and(|v| !v.is_empty())
}

/// Quote a path or account for a synthesized copy header.
fn quoted_header(raw: &str, header: PathHeader) -> Result<HeaderValue, CopyError> {
    HeaderValue::from_str(&quote(raw)).map_err(|_| header.error())
}
