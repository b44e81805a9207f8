use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};

use crate::fetch::{BoxError, ByteChunks};

/// Request body of a [`Call`](crate::Call).
pub enum Body<T> {
    /// Structured value, envelope-encoded unless the call is direct.
    Value(T),
    /// Raw bytes.
    Bytes(Bytes),
    /// Raw byte stream; direct calls only.
    Stream(ByteStream),
}

impl<T> fmt::Debug for Body<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value"),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(stream) => stream.fmt(f),
        }
    }
}

/// Shareable handle to a one-shot byte stream.
///
/// The first [`take`](ByteStream::take) hands out the stream and locks the
/// handle for good; clones observe the same lock.
#[derive(Clone)]
pub struct ByteStream {
    inner: Arc<Mutex<Option<ByteChunks>>>,
}

impl ByteStream {
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let chunks: ByteChunks = stream.map_err(|err| -> BoxError { err.into() }).boxed();
        Self {
            inner: Arc::new(Mutex::new(Some(chunks))),
        }
    }

    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes, BoxError>> =
            chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
        Self::new(futures::stream::iter(chunks))
    }

    pub fn is_locked(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Takes the stream out, locking the handle. `None` if already locked.
    pub fn take(&self) -> Option<ByteChunks> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Reads every chunk into one contiguous buffer.
pub(crate) async fn drain(mut chunks: ByteChunks) -> Result<Bytes, BoxError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = chunks.try_next().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{drain, ByteStream};

    #[test]
    fn take_locks_every_clone() {
        let stream = ByteStream::from_chunks([&b"ab"[..], &b"cd"[..]]);
        let observer = stream.clone();
        assert!(!observer.is_locked());
        assert!(stream.take().is_some());
        assert!(observer.is_locked());
        assert!(observer.take().is_none());
    }

    #[tokio::test]
    async fn drain_concatenates_chunks() {
        let stream = ByteStream::from_chunks([&b"ab"[..], &b"cd"[..], &b""[..]]);
        let chunks = stream.take().expect("fresh stream must be unlocked");
        let bytes = drain(chunks).await.expect("drain must succeed");
        assert_eq!(bytes, Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn drain_stops_on_error() {
        let stream = ByteStream::new(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::other("reset")),
        ]));
        let chunks = stream.take().expect("fresh stream must be unlocked");
        let err = drain(chunks).await.expect_err("drain must fail");
        assert_eq!(err.to_string(), "reset");
    }
}
