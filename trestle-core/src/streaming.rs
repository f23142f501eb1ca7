//! Lazily produced response bodies.
//!
//! A [`ByteStream`] is handed to the transport chunk by chunk and is never
//! buffered whole by the dispatcher. It can be fed from an async reader (how
//! static files are served), from a channel written by a background task, or
//! from any `Stream` of byte chunks.
//!
//! ```
//! use trestle_core::streaming::ByteStream;
//!
//! # tokio_test::block_on(async {
//! let (stream, sender) = ByteStream::channel(8);
//!
//! tokio::spawn(async move {
//!     sender.send("Hello, ").await.ok();
//!     sender.send("World!").await.ok();
//! });
//!
//! assert_eq!(stream.collect_bytes().await.unwrap(), "Hello, World!");
//! # });
//! ```

use crate::Error;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Default chunk size used when streaming readers (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A stream of byte chunks for streaming responses.
///
/// The inner stream is only ever polled through `&mut self`; the mutex is
/// never locked and exists so that a response holding a stream stays `Sync`.
pub struct ByteStream {
    inner: Mutex<BoxStream<'static, Result<Bytes, Error>>>,
}

impl ByteStream {
    /// Wrap any stream of byte chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Self {
            inner: Mutex::new(stream.boxed()),
        }
    }

    /// A finite sequence of chunks produced on demand.
    pub fn iter<I>(chunks: I) -> Self
    where
        I: IntoIterator + Send + 'static,
        I::IntoIter: Send + 'static,
        I::Item: Into<Bytes>,
    {
        Self::from_stream(stream::iter(
            chunks.into_iter().map(|c| Ok::<Bytes, Error>(c.into())),
        ))
    }

    /// Read `reader` to the end in chunks of at most `chunk_size` bytes.
    pub fn from_reader<R>(reader: R, chunk_size: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let chunk_size = chunk_size.max(1);
        Self::from_stream(stream::unfold(Some(reader), move |state| async move {
            let mut reader = state?;
            let mut buffer = BytesMut::zeroed(chunk_size);
            match reader.read(&mut buffer).await {
                Ok(0) => None,
                Ok(n) => {
                    buffer.truncate(n);
                    Some((Ok(buffer.freeze()), Some(reader)))
                }
                Err(e) => Some((Err(Error::Io(e)), None)),
            }
        }))
    }

    /// A stream fed by a [`ByteStreamSender`]. It ends when the sender is dropped.
    pub fn channel(buffer: usize) -> (Self, ByteStreamSender) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let stream = stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (Self::from_stream(stream), ByteStreamSender { sender })
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Drain the stream into one buffer. Meant for tests and small bodies.
    pub async fn collect_bytes(mut self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body.freeze())
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .poll_next(cx)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").finish_non_exhaustive()
    }
}

/// Sender half of [`ByteStream::channel`].
pub struct ByteStreamSender {
    sender: mpsc::Sender<Result<Bytes, Error>>,
}

impl ByteStreamSender {
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<(), Error> {
        self.sender
            .send(Ok(data.into()))
            .await
            .map_err(|_| Error::Internal("stream receiver dropped".to_string()))
    }

    /// Abort the stream with an error. The transport closes the connection.
    pub async fn send_error(&self, error: Error) -> Result<(), Error> {
        self.sender
            .send(Err(error))
            .await
            .map_err(|_| Error::Internal("stream receiver dropped".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iter_stream() {
        let stream = ByteStream::iter(vec!["a", "b", "c"]);
        assert_eq!(stream.collect_bytes().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_reader_is_chunked() {
        let data = vec![7u8; 20_000];
        let mut stream = ByteStream::from_reader(std::io::Cursor::new(data), DEFAULT_CHUNK_SIZE);

        let mut sizes = Vec::new();
        while let Some(chunk) = stream.next().await {
            sizes.push(chunk.unwrap().len());
        }
        assert_eq!(sizes, vec![8192, 8192, 3616]);
    }

    #[tokio::test]
    async fn test_channel_error_propagates() {
        let (stream, sender) = ByteStream::channel(4);
        tokio::spawn(async move {
            sender.send("partial").await.ok();
            sender
                .send_error(Error::Internal("disk gone".into()))
                .await
                .ok();
        });
        assert!(stream.collect_bytes().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(ByteStream::empty().collect_bytes().await.unwrap().is_empty());
    }
}
