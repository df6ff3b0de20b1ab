use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio_stream::Stream;
use tonic::{Status, Streaming};

use crate::context::Context;

/// Inbound message stream reporting an enriched [`Context`].
///
/// Messages are delegated to the wrapped stream unchanged; only the context
/// differs. The context is fixed when the stream is opened, so every message
/// observes the same Request-Id and OpHID.
#[derive(Debug)]
pub struct EnrichedStream<S> {
    inner: S,
    context: Context,
}

impl<S> EnrichedStream<S> {
    pub fn new(inner: S, context: Context) -> Self {
        Self { inner, context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl<T> EnrichedStream<Streaming<T>> {
    /// Next message, as [`Streaming::message`].
    pub async fn message(&mut self) -> Result<Option<T>, Status> {
        self.inner.message().await
    }
}

impl<S> Stream for EnrichedStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let _entered = this.context.value::<tracing::Span>().map(|span| span.enter());
        Pin::new(&mut this.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
