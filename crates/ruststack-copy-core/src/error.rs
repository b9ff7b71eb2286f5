//! Error types for the copy pipeline.
//!
//! [`CopyError`] is a closed set of failure kinds. Client input problems carry a
//! fixed, header-specific message; upstream failures carry the sub-request
//! response untouched so it can be relayed verbatim.
//!
//! # Usage
//!
//! ```
//! use ruststack_copy_core::error::CopyError;
//!
//! let err = CopyError::destination_required();
//! let resp = err.into_response();
//! assert_eq!(resp.status(), http::StatusCode::PRECONDITION_FAILED);
//! ```

use crate::body::CopyBody;

/// Message returned for a malformed `X-Copy-From` header.
pub const COPY_FROM_FORMAT_MESSAGE: &str =
    "X-Copy-From header must be of the form <container name>/<object name>";

/// Message returned for a malformed `Destination` header.
pub const DESTINATION_FORMAT_MESSAGE: &str =
    "Destination header must be of the form <container name>/<object name>";

/// Message returned for a COPY request without a `Destination` header.
pub const DESTINATION_REQUIRED_MESSAGE: &str = "Destination header required";

/// Message returned for a copy request that carries a body.
pub const ZERO_BYTE_BODY_MESSAGE: &str = "Copy requests require a zero byte body";

/// Message returned for a copy request with an unparseable `Content-Length`.
pub const INVALID_CONTENT_LENGTH_MESSAGE: &str = "Invalid Content-Length header value";

/// Message returned when the source cannot be copied because of its size.
pub const ENTITY_TOO_LARGE_MESSAGE: &str =
    "The body of your request was too large for this server.";

/// Copy pipeline error.
///
/// Every variant maps to exactly one HTTP response via [`CopyError::into_response`].
/// None of them is retried inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// A path-shaped header is missing or malformed.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Fixed message naming the offending header.
        message: &'static str,
    },

    /// The copy request is not acceptable as sent.
    #[error("bad request: {message}")]
    BadRequest {
        /// Fixed message describing the problem.
        message: &'static str,
    },

    /// The source object is too large, or its size is unknown.
    #[error("source object is too large to copy")]
    EntityTooLarge,

    /// An account name failed format validation.
    #[error("invalid account name: {message}")]
    AccountFormat {
        /// Fixed message from the account validator.
        message: &'static str,
    },

    /// A sub-request returned a non-success response.
    #[error("upstream responded with {}", .0.status())]
    Upstream(Box<http::Response<CopyBody>>),
}

impl CopyError {
    /// Malformed `X-Copy-From` header.
    #[must_use]
    pub fn invalid_copy_from() -> Self {
        Self::PreconditionFailed {
            message: COPY_FROM_FORMAT_MESSAGE,
        }
    }

    /// Malformed `Destination` header.
    #[must_use]
    pub fn invalid_destination() -> Self {
        Self::PreconditionFailed {
            message: DESTINATION_FORMAT_MESSAGE,
        }
    }

    /// Missing `Destination` header on a COPY request.
    #[must_use]
    pub fn destination_required() -> Self {
        Self::PreconditionFailed {
            message: DESTINATION_REQUIRED_MESSAGE,
        }
    }

    /// Copy request with a non-zero body.
    #[must_use]
    pub fn non_empty_body() -> Self {
        Self::BadRequest {
            message: ZERO_BYTE_BODY_MESSAGE,
        }
    }

    /// The HTTP status code this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::PreconditionFailed { .. } | Self::AccountFormat { .. } => {
                http::StatusCode::PRECONDITION_FAILED
            }
            Self::BadRequest { .. } => http::StatusCode::BAD_REQUEST,
            Self::EntityTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(resp) => resp.status(),
        }
    }

    /// Convert the error into the response sent back to the client.
    ///
    /// Upstream responses are returned as-is, headers and body included.
    #[must_use]
    pub fn into_response(self) -> http::Response<CopyBody> {
        let status = self.status_code();
        let message = match self {
            Self::Upstream(resp) => return *resp,
            Self::PreconditionFailed { message }
            | Self::BadRequest { message }
            | Self::AccountFormat { message } => message,
            Self::EntityTooLarge => ENTITY_TOO_LARGE_MESSAGE,
        };
        plain_text_response(status, message)
    }
}

/// Build a `text/plain` response with a fixed message body.
fn plain_text_response(status: http::StatusCode, message: &str) -> http::Response<CopyBody> {
    let mut resp = http::Response::new(CopyBody::from_string(message));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain"),
    );
    resp.headers_mut()
        .insert(http::header::CONTENT_LENGTH, http::HeaderValue::from(message.len()));
    resp
}

/// Convenience result type for the copy pipeline.
pub type CopyResult<T> = Result<T, CopyError>;
