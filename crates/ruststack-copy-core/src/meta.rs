//! Object header classification and header subset helpers.
//!
//! Every header propagation decision in the pipeline starts from [`classify`],
//! which sorts a header name into one of four classes:
//!
//! | Class | Prefix |
//! |-------|--------|
//! | [`HeaderClass::SystemMeta`] | `x-object-sysmeta-` |
//! | [`HeaderClass::UserMeta`] | `x-object-meta-` |
//! | [`HeaderClass::TransientSystemMeta`] | `x-object-transient-sysmeta-` |
//! | [`HeaderClass::Plain`] | anything else |
//!
//! Classification only looks at the name, never at the value.

use http::HeaderMap;
use http::header::HeaderName;

/// Prefix of object system metadata headers.
pub const SYSMETA_PREFIX: &str = "x-object-sysmeta-";

/// Prefix of object user metadata headers.
pub const USER_META_PREFIX: &str = "x-object-meta-";

/// Prefix of object transient system metadata headers.
pub const TRANSIENT_SYSMETA_PREFIX: &str = "x-object-transient-sysmeta-";

/// Plain headers that travel with the metadata on a copy.
pub const PASS_THROUGH_HEADERS: &[&str] = &["x-delete-at"];

/// Category of an object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderClass {
    /// Storage-system-internal metadata, opaque to clients.
    SystemMeta,
    /// Client-set metadata.
    UserMeta,
    /// Object-scoped temporary system state.
    TransientSystemMeta,
    /// Everything else (`Content-Type`, `X-Delete-At`, ...).
    Plain,
}

/// Classify a header by name.
///
/// [`HeaderName`] is always lowercase, so the prefix match is case-insensitive
/// with respect to what the client sent.
///
/// # Examples
///
/// ```
/// use http::header::HeaderName;
/// use ruststack_copy_core::meta::{HeaderClass, classify};
///
/// let name = HeaderName::from_static("x-object-meta-color");
/// assert_eq!(classify(&name), HeaderClass::UserMeta);
/// ```
#[must_use]
pub fn classify(name: &HeaderName) -> HeaderClass {
    let name = name.as_str();
    if name.starts_with(TRANSIENT_SYSMETA_PREFIX) {
        HeaderClass::TransientSystemMeta
    } else if name.starts_with(SYSMETA_PREFIX) {
        HeaderClass::SystemMeta
    } else if name.starts_with(USER_META_PREFIX) {
        HeaderClass::UserMeta
    } else {
        HeaderClass::Plain
    }
}

/// Whether the header is object system metadata.
#[must_use]
pub fn is_sys_meta(name: &HeaderName) -> bool {
    classify(name) == HeaderClass::SystemMeta
}

/// Whether the header is object system or user metadata.
#[must_use]
pub fn is_sys_or_user_meta(name: &HeaderName) -> bool {
    matches!(
        classify(name),
        HeaderClass::SystemMeta | HeaderClass::UserMeta
    )
}

/// Whether the header is user metadata or transient system metadata, the
/// headers a metadata update replaces wholesale.
#[must_use]
pub fn is_user_meta_or_transient(name: &HeaderName) -> bool {
    matches!(
        classify(name),
        HeaderClass::UserMeta | HeaderClass::TransientSystemMeta
    )
}

/// Whether the header is object transient system metadata.
#[must_use]
pub fn is_transient_sys_meta(name: &HeaderName) -> bool {
    classify(name) == HeaderClass::TransientSystemMeta
}

/// Whether the header is one of [`PASS_THROUGH_HEADERS`].
#[must_use]
pub fn is_pass_through(name: &HeaderName) -> bool {
    PASS_THROUGH_HEADERS.contains(&name.as_str())
}

/// Whether the header is carried from source to destination on a normal copy.
///
/// That is system, user and transient system metadata plus the pass-through
/// plain headers.
#[must_use]
pub fn is_copied_metadata(name: &HeaderName) -> bool {
    is_pass_through(name) || classify(name) != HeaderClass::Plain
}

/// Copy every header of `from` matching `pred` into `to`, replacing existing values.
///
/// Multi-valued headers are copied with all their values.
pub fn copy_header_subset(from: &HeaderMap, to: &mut HeaderMap, pred: impl Fn(&HeaderName) -> bool) {
    for name in from.keys().filter(|name| pred(name)) {
        to.remove(name);
        for value in from.get_all(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Remove every header of `headers` matching `pred`.
pub fn remove_items(headers: &mut HeaderMap, pred: impl Fn(&HeaderName) -> bool) {
    let doomed: Vec<HeaderName> = headers.keys().filter(|name| pred(name)).cloned().collect();
    for name in doomed {
        headers.remove(&name);
    }
}
