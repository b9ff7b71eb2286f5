//! Destination header construction.
//!
//! Builds the headers of the write sub-request from the source object's
//! response headers and the (normalised) incoming request headers. Pure data
//! transformation; nothing here touches the network.

use http::HeaderMap;
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};

use crate::headers::{X_COPY_FROM, X_COPY_FROM_ACCOUNT, X_OBJECT_MANIFEST, X_STATIC_LARGE_OBJECT};
use crate::meta::{copy_header_subset, is_copied_metadata, is_sys_meta, remove_items};
use crate::operation::{CopyOperation, ManifestMode};

/// How metadata flows from the source object to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Source metadata first, then request metadata on top.
    Normal,
    /// Destination gets exactly the source's system metadata; everything else
    /// comes from the request.
    FreshMetadata,
}

impl MergePolicy {
    /// The policy an operation calls for.
    #[must_use]
    pub fn for_operation(op: &CopyOperation) -> Self {
        if op.fresh_metadata_requested || op.is_post_as_copy {
            Self::FreshMetadata
        } else {
            Self::Normal
        }
    }
}

/// Headers and manifest handling of the write sub-request.
#[derive(Debug, Clone)]
pub struct DestinationHeaders {
    /// Headers to send with the write.
    pub headers: HeaderMap,
    /// Manifest handling of the write, applied to its query string.
    pub manifest_mode: ManifestMode,
}

/// Merge source and request headers into the write sub-request's headers.
///
/// `request` are the headers of the normalised request; `manifest_mode` is the
/// mode the request asked for.
///
/// # Examples
///
/// ```
/// use http::HeaderMap;
/// use ruststack_copy_core::merge::{MergePolicy, merge_headers};
/// use ruststack_copy_core::operation::ManifestMode;
///
/// let mut source = HeaderMap::new();
/// source.insert("x-object-meta-color", "blue".parse().unwrap());
/// source.insert("content-type", "image/png".parse().unwrap());
///
/// let mut request = HeaderMap::new();
/// request.insert("x-copy-from", "/c/o".parse().unwrap());
///
/// let dest = merge_headers(&source, &request, MergePolicy::Normal, ManifestMode::None);
/// assert_eq!(dest.headers["x-object-meta-color"], "blue");
/// assert_eq!(dest.headers["content-type"], "image/png");
/// assert!(!dest.headers.contains_key("x-copy-from"));
/// ```
#[must_use]
pub fn merge_headers(
    source: &HeaderMap,
    request: &HeaderMap,
    policy: MergePolicy,
    manifest_mode: ManifestMode,
) -> DestinationHeaders {
    let mut headers = request.clone();
    for name in [X_COPY_FROM, X_COPY_FROM_ACCOUNT] {
        headers.remove(name);
    }
    headers.remove(TRANSFER_ENCODING);

    let mut manifest_mode = manifest_mode;
    if manifest_mode == ManifestMode::Get {
        if source.contains_key(X_STATIC_LARGE_OBJECT) {
            manifest_mode = ManifestMode::Put;
        }
        if let Some(prefix) = source.get(X_OBJECT_MANIFEST) {
            headers.insert(X_OBJECT_MANIFEST, prefix.clone());
            manifest_mode = ManifestMode::None;
        }
    }

    let has_content_type = request
        .get(CONTENT_TYPE)
        .is_some_and(|v| !v.is_empty());
    if !has_content_type {
        match source.get(CONTENT_TYPE) {
            Some(ct) => {
                headers.insert(CONTENT_TYPE, ct.clone());
            }
            None => {
                headers.remove(CONTENT_TYPE);
            }
        }
    }

    match policy {
        MergePolicy::FreshMetadata => {
            remove_items(&mut headers, is_sys_meta);
            copy_header_subset(source, &mut headers, is_sys_meta);
        }
        MergePolicy::Normal => {
            copy_header_subset(source, &mut headers, is_copied_metadata);
            copy_header_subset(request, &mut headers, is_copied_metadata);
        }
    }

    DestinationHeaders {
        headers,
        manifest_mode,
    }
}
