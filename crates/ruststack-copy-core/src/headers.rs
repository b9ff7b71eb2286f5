//! Header and query parameter names used by the copy pipeline.

/// Source object of a PUT-based copy, as `/<container>/<object>`.
pub const X_COPY_FROM: &str = "x-copy-from";
/// Source account of a PUT-based copy.
pub const X_COPY_FROM_ACCOUNT: &str = "x-copy-from-account";
/// Destination object of a COPY, as `/<container>/<object>`.
pub const DESTINATION: &str = "destination";
/// Destination account of a cross-account COPY.
pub const DESTINATION_ACCOUNT: &str = "destination-account";
/// Request flag asking for the source's user metadata to be dropped.
pub const X_FRESH_METADATA: &str = "x-fresh-metadata";

/// Response header naming the copied source object.
pub const X_COPIED_FROM: &str = "x-copied-from";
/// Response header naming the source account of a cross-account copy.
pub const X_COPIED_FROM_ACCOUNT: &str = "x-copied-from-account";
/// Response header carrying the source's `Last-Modified`.
pub const X_COPIED_FROM_LAST_MODIFIED: &str = "x-copied-from-last-modified";

/// Forces the read to consult every replica and return the newest.
pub const X_NEWEST: &str = "x-newest";
/// Storage policy selected by an upstream layer; dropped from the source read.
pub const X_BACKEND_STORAGE_POLICY_INDEX: &str = "x-backend-storage-policy-index";
/// Marker set on static large object manifests.
pub const X_STATIC_LARGE_OBJECT: &str = "x-static-large-object";
/// Segment prefix of a dynamic large object manifest.
pub const X_OBJECT_MANIFEST: &str = "x-object-manifest";

/// CORS allowed-methods response header.
pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "access-control-allow-methods";

/// Query parameter selecting manifest handling for large objects.
pub const MULTIPART_MANIFEST: &str = "multipart-manifest";
/// Query parameter selecting the raw manifest format on reads.
pub const FORMAT: &str = "format";

/// The copy verb advertised in `Allow` headers.
pub const COPY_METHOD: &str = "COPY";

/// Source tag marking sub-requests issued by this pipeline.
pub const SWIFT_SOURCE: &str = "SSC";
