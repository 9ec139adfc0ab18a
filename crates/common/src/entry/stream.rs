use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};

use super::EntryError;

type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// A stream of bytes with an explicit close.
///
/// Streams backed by a remote session must be closed by the consumer, the
///  session is torn down on close and not when the data runs out. A stream
///  dropped without being closed runs its cleanup on the current runtime.
pub struct ByteStream {
    inner: BoxStream<'static, Result<Bytes, EntryError>>,
    on_close: Option<CloseFn>,
}

impl ByteStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<Bytes, EntryError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            on_close: None,
        }
    }

    /// Run `cleanup` when the stream is closed or dropped
    pub fn with_cleanup<F, Fut>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.on_close = Some(Box::new(move || Box::pin(cleanup())));
        self
    }

    /// A finished stream over in-memory content
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::new(stream::empty());
        }
        Self::new(stream::iter([Ok(data)]))
    }

    /// Stop reading and release whatever backs the stream
    pub async fn close(mut self) {
        if let Some(cleanup) = self.on_close.take() {
            cleanup().await;
        }
    }

    /// Drain the stream, failing on the first error item. The stream is
    ///  closed either way.
    pub async fn read_to_end(mut self) -> Result<Bytes, EntryError> {
        let mut buf = BytesMut::new();
        let mut result = Ok(());
        while let Some(chunk) = self.next().await {
            match chunk {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.close().await;
        result.map(|_| buf.freeze())
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, EntryError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for ByteStream {
    fn drop(&mut self) {
        let Some(cleanup) = self.on_close.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(cleanup());
            }
            Err(_) => {
                tracing::warn!("byte stream dropped outside a runtime, skipping cleanup");
            }
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("closed", &self.on_close.is_none())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_stream(chunks: Vec<&'static str>, closed: Arc<AtomicUsize>) -> ByteStream {
        let items = chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes())));
        ByteStream::new(stream::iter(items.collect::<Vec<_>>())).with_cleanup(move || async move {
            closed.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_read_to_end_closes() {
        let closed = Arc::new(AtomicUsize::new(0));
        let data = counting_stream(vec!["hello ", "world"], closed.clone())
            .read_to_end()
            .await
            .unwrap();

        assert_eq!(&data[..], b"hello world");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_item_surfaces() {
        let items = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(EntryError::Internal("boom".to_string())),
        ];
        let result = ByteStream::new(stream::iter(items)).read_to_end().await;
        assert!(matches!(result, Err(EntryError::Internal(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_drop_runs_cleanup() {
        let closed = Arc::new(AtomicUsize::new(0));
        let stream = counting_stream(vec!["x"], closed.clone());
        drop(stream);

        tokio::task::yield_now().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_runs_cleanup_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        counting_stream(vec![], closed.clone()).close().await;

        tokio::task::yield_now().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
