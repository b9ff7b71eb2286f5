//! Request and response body type shared by every sub-request in the copy pipeline.
//!
//! [`CopyBody`] supports three modes:
//!
//! - **Empty**: zero-length bodies (copy requests, HEAD responses, 204s).
//! - **Buffered**: small in-memory payloads such as error messages.
//! - **Streaming**: a lazily-produced sequence of byte chunks. The source object of a
//!   copy is handed to the write sub-request in this mode, so the object is never
//!   held in memory as a whole.
//!
//! A streaming body is consumed exactly once and cannot be restarted. Dropping it
//! releases the underlying producer.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use http_body_util::Full;

/// Boxed chunk producer backing [`CopyBody::Streaming`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Body type for requests and responses flowing through the copy pipeline.
#[derive(Default)]
pub enum CopyBody {
    /// No content.
    #[default]
    Empty,
    /// Fully buffered content.
    Buffered(Full<Bytes>),
    /// Lazily produced chunks.
    Streaming(ChunkStream),
}

impl CopyBody {
    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Wrap a fallible chunk stream.
    #[must_use]
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        Self::Streaming(Box::pin(stream))
    }

    /// Turn an iterable of chunks into a streaming body.
    ///
    /// Chunks are yielded one at a time as the body is polled.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use http_body_util::BodyExt;
    /// use ruststack_copy_core::body::CopyBody;
    ///
    /// # tokio_test::block_on(async {
    /// let body = CopyBody::from_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"c")]);
    /// let data = body.collect().await.unwrap().to_bytes();
    /// assert_eq!(&data[..], b"abc");
    /// # });
    /// ```
    #[must_use]
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(stream::iter(chunks).map(Ok))
    }

    /// Whether this body is a streaming body.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl fmt::Debug for CopyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("CopyBody::Empty"),
            Self::Buffered(full) => f.debug_tuple("CopyBody::Buffered").field(full).finish(),
            Self::Streaming(_) => f.write_str("CopyBody::Streaming(..)"),
        }
    }
}

impl http_body::Body for CopyBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Empty => Poll::Ready(None),
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => stream
                .as_mut()
                .poll_next(cx)
                .map(|chunk| chunk.map(|res| res.map(http_body::Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(_) => false,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Empty => http_body::SizeHint::with_exact(0),
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(_) => http_body::SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = CopyBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[test]
    fn test_should_create_buffered_body_from_string() {
        let body = CopyBody::from_string("hello world");
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(11));
    }

    #[test]
    fn test_should_not_know_size_of_streaming_body() {
        let body = CopyBody::from_chunks(vec![Bytes::from_static(b"abc")]);
        assert!(body.is_streaming());
        assert_eq!(body.size_hint().exact(), None);
    }

    #[tokio::test]
    async fn test_should_yield_chunks_in_order() {
        let body = CopyBody::from_chunks(vec![
            Bytes::from_static(b"hello "),
            Bytes::from_static(b"streamed "),
            Bytes::from_static(b"world"),
        ]);
        let collected = body.collect().await.expect("stream should not fail");
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"hello streamed world"));
    }

    #[tokio::test]
    async fn test_should_surface_stream_errors() {
        let body = CopyBody::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("source went away")),
        ]));
        assert!(body.collect().await.is_err());
    }

    #[test]
    fn test_should_debug_format_without_exposing_stream() {
        let body = CopyBody::from_chunks(Vec::<Bytes>::new());
        assert_eq!(format!("{body:?}"), "CopyBody::Streaming(..)");
    }
}
