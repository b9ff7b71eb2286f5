//! Path parsing and path-shaped header validation.
//!
//! Object requests are addressed as `/<version>/<account>/<container>/<object>`,
//! where the object name may itself contain slashes. The copy headers
//! (`X-Copy-From`, `Destination`) carry a `/<container>/<object>` pair; the
//! account headers (`X-Copy-From-Account`, `Destination-Account`) carry a bare
//! account name.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, utf8_percent_encode};

use crate::error::CopyError;

/// Characters left untouched when quoting a path: unreserved characters and `/`.
const PATH_QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode a path, keeping `/` and unreserved characters.
///
/// # Examples
///
/// ```
/// use ruststack_copy_core::path::quote;
///
/// assert_eq!(quote("/c/o with space"), "/c/o%20with%20space");
/// ```
#[must_use]
pub fn quote(path: &str) -> String {
    utf8_percent_encode(path, PATH_QUOTE_SET).to_string()
}

/// Percent-decode a value, failing on invalid UTF-8.
///
/// Header values may carry raw non-ASCII bytes; those pass through undecoded and
/// only have to form valid UTF-8 together with the decoded escapes.
#[must_use]
pub fn unquote(value: impl AsRef<[u8]>) -> Option<String> {
    percent_decode(value.as_ref())
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// Split a `/`-separated path into between `min_segs` and `max_segs` segments.
///
/// The path must start with `/`. The first `min_segs` segments must be non-empty;
/// optional trailing segments come back as `None`. With `rest_with_last`, the last
/// segment absorbs the remainder of the path, slashes included.
///
/// Returns `None` if the path does not fit.
///
/// # Examples
///
/// ```
/// use ruststack_copy_core::path::split_path;
///
/// let segs = split_path("/c/o/with/slashes", 2, 2, true).unwrap();
/// assert_eq!(segs, vec![Some("c".to_owned()), Some("o/with/slashes".to_owned())]);
/// assert!(split_path("/c/", 2, 2, true).is_none());
/// ```
#[must_use]
pub fn split_path(
    path: &str,
    min_segs: usize,
    max_segs: usize,
    rest_with_last: bool,
) -> Option<Vec<Option<String>>> {
    if min_segs == 0 || min_segs > max_segs {
        return None;
    }
    let rest = path.strip_prefix('/')?;

    let segs: Vec<&str> = if rest_with_last {
        rest.splitn(max_segs, '/').collect()
    } else {
        rest.split('/').collect()
    };

    if segs.len() < min_segs || segs.len() > max_segs {
        return None;
    }
    if segs[..min_segs].iter().any(|s| s.is_empty()) {
        return None;
    }
    if !rest_with_last && segs[min_segs..].iter().any(|s| s.is_empty()) {
        return None;
    }

    let mut out: Vec<Option<String>> = segs
        .into_iter()
        .map(|s| Some(s.to_owned()))
        .collect();
    out.resize(max_segs, None);
    Some(out)
}

/// A fully-qualified object location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    /// Account name.
    pub account: String,
    /// Container name.
    pub container: String,
    /// Object name, possibly containing `/`.
    pub object: String,
}

impl ObjectPath {
    /// Create an object path from its three components.
    #[must_use]
    pub fn new(
        account: impl Into<String>,
        container: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            container: container.into(),
            object: object.into(),
        }
    }

    /// The `/<container>/<object>` part, unquoted.
    #[must_use]
    pub fn container_object(&self) -> String {
        format!("/{}/{}", self.container, self.object)
    }

    /// The full request path `/<version>/<account>/<container>/<object>`, quoted.
    #[must_use]
    pub fn to_request_path(&self, version: &str) -> String {
        quote(&format!(
            "/{version}/{}/{}/{}",
            self.account, self.container, self.object
        ))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.account, self.container, self.object)
    }
}

/// The parsed path of an object-level request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    /// API version segment (e.g. `v1`).
    pub version: String,
    /// Addressed object.
    pub object: ObjectPath,
}

impl RequestPath {
    /// Parse a raw (percent-encoded) URI path into an object request path.
    ///
    /// Returns `None` for anything that is not `/<version>/<account>/<container>/<object>`,
    /// e.g. account or container requests and `/info`.
    #[must_use]
    pub fn parse(raw_path: &str) -> Option<Self> {
        let decoded = unquote(raw_path)?;
        let mut segs = split_path(&decoded, 4, 4, true)?.into_iter().flatten();
        Some(Self {
            version: segs.next()?,
            object: ObjectPath::new(segs.next()?, segs.next()?, segs.next()?),
        })
    }
}

/// A path-shaped header naming a `/<container>/<object>` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathHeader {
    /// `X-Copy-From` on a PUT.
    CopyFrom,
    /// `Destination` on a COPY.
    Destination,
}

impl PathHeader {
    /// The header name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CopyFrom => crate::headers::X_COPY_FROM,
            Self::Destination => crate::headers::DESTINATION,
        }
    }

    /// The error reported when the header value is malformed.
    #[must_use]
    pub fn error(self) -> CopyError {
        match self {
            Self::CopyFrom => CopyError::invalid_copy_from(),
            Self::Destination => CopyError::invalid_destination(),
        }
    }
}

/// Resolve a path-shaped header value into a `(container, object)` pair.
///
/// The value is URL-decoded and a leading `/` is added if missing.
///
/// # Errors
///
/// Returns [`CopyError::PreconditionFailed`] with the header-specific message if
/// the value cannot be decoded or does not contain two non-empty segments.
///
/// # Examples
///
/// ```
/// use ruststack_copy_core::path::{PathHeader, resolve_path_header};
///
/// let (c, o) = resolve_path_header("c/o%20x", PathHeader::CopyFrom).unwrap();
/// assert_eq!((c.as_str(), o.as_str()), ("c", "o x"));
/// assert!(resolve_path_header("/c", PathHeader::Destination).is_err());
/// ```
pub fn resolve_path_header(
    value: impl AsRef<[u8]>,
    header: PathHeader,
) -> Result<(String, String), CopyError> {
    let mut decoded = unquote(value).ok_or_else(|| header.error())?;
    if !decoded.starts_with('/') {
        decoded.insert(0, '/');
    }

    let segs = split_path(&decoded, 2, 2, true).ok_or_else(|| header.error())?;
    match <[Option<String>; 2]>::try_from(segs) {
        Ok([Some(container), Some(object)]) => Ok((container, object)),
        _ => Err(header.error()),
    }
}

/// Validate an account name taken from a request header.
///
/// The value is URL-decoded before validation.
///
/// # Errors
///
/// Returns [`CopyError::AccountFormat`] if the account is empty or contains `/`.
pub fn check_account_format(value: impl AsRef<[u8]>) -> Result<String, CopyError> {
    let value = value.as_ref();
    if value.is_empty() {
        return Err(CopyError::AccountFormat {
            message: "Account name cannot be empty",
        });
    }
    let account = unquote(value).ok_or(CopyError::AccountFormat {
        message: "Account name must be valid UTF-8",
    })?;
    if account.contains('/') {
        return Err(CopyError::AccountFormat {
            message: "Account name cannot contain slashes",
        });
    }
    Ok(account)
}
