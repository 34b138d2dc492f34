//! Sources - the producer side of a chain
//!
//! A `Source` delivers three signals: a chunk (`Ok(item)`), an error
//! (`Err(PipelineError)`) and end-of-input (the stream ending). The chain
//! pulls one message at a time, so a source is never asked for the next
//! chunk before the head stage is ready for it.
//!
//! # Example
//!
//! ```
//! # use rill_pipeline::{Processor, Source};
//! # #[tokio::main]
//! # async fn main() -> rill_pipeline::Result<()> {
//! // From an in-memory collection
//! let numbers = Source::iter(vec![1, 2, 3]);
//! # drop(numbers);
//!
//! // Push-based producer with backpressure
//! let (sender, source) = Source::channel(16);
//! tokio::spawn(async move {
//!     for i in 0..100u32 {
//!         if sender.send(i).await.is_err() {
//!             break; // chain went away
//!         }
//!     }
//!     // dropping the sender is end-of-input
//! });
//!
//! let items = Processor::new().collect(source).await?;
//! assert_eq!(items.len(), 100);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::{BoxError, PipelineError};
use crate::fanout;
use crate::status_sink::StatusSink;

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;

/// One signal travelling through a chain
///
/// `Ok` carries a chunk, `Err` the error signal. End-of-input is the
/// channel (or stream) closing.
pub type Message<T> = Result<T, PipelineError>;

/// An external producer attached to the head of a chain
pub struct Source<T> {
    stream: BoxStream<'static, Message<T>>,
}

impl<T: Send + 'static> Source<T> {
    /// Create a source from a stream of infallible items
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: stream.map(Ok).boxed(),
        }
    }

    /// Create a source from a stream of fallible items
    ///
    /// An `Err` item raises the error signal as [`PipelineError::Upstream`].
    pub fn from_results<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            stream: stream
                .map(|result| result.map_err(PipelineError::upstream))
                .boxed(),
        }
    }

    /// Create a source yielding every item of a collection, then ending
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(stream::iter(items))
    }

    /// Create a source that ends immediately
    pub fn empty() -> Self {
        Self {
            stream: stream::empty().boxed(),
        }
    }

    /// Create a push-based source and its sender
    ///
    /// `capacity` bounds how many chunks may wait for the head stage;
    /// `SourceSender::send` waits once it is reached. A capacity of zero
    /// is treated as one.
    pub fn channel(capacity: usize) -> (SourceSender<T>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (SourceSender { sender }, Self::from_channel(receiver))
    }

    /// Share this source between `branches` independent consumers
    ///
    /// Every branch receives a copy of every chunk and of the error signal.
    /// Branches buffer independently, so a slow consumer never holds back
    /// the others. Must be called within a Tokio runtime: the source is
    /// pumped by a spawned task.
    pub fn fan_out(self, branches: usize) -> Vec<Source<T>>
    where
        T: Clone,
    {
        fanout::spawn(self.stream, branches)
            .into_iter()
            .map(Self::from_unbounded)
            .collect()
    }

    pub(crate) fn from_channel(mut receiver: mpsc::Receiver<Message<T>>) -> Self {
        Self {
            stream: stream::poll_fn(move |cx| receiver.poll_recv(cx)).boxed(),
        }
    }

    pub(crate) fn from_unbounded(mut receiver: mpsc::UnboundedReceiver<Message<T>>) -> Self {
        Self {
            stream: stream::poll_fn(move |cx| receiver.poll_recv(cx)).boxed(),
        }
    }

    pub(crate) fn into_stream(self) -> BoxStream<'static, Message<T>> {
        self.stream
    }
}

impl<T> Stream for Source<T> {
    type Item = Message<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl<T: Send + 'static> From<Vec<T>> for Source<T> {
    fn from(items: Vec<T>) -> Self {
        Self::iter(items)
    }
}

impl<T: Send + 'static> FromIterator<T> for Source<T> {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Self {
        Self::iter(items.into_iter().collect::<Vec<_>>())
    }
}

impl<T: Send + 'static> From<mpsc::Receiver<T>> for Source<T> {
    fn from(mut receiver: mpsc::Receiver<T>) -> Self {
        Self {
            stream: stream::poll_fn(move |cx| receiver.poll_recv(cx))
                .map(Ok)
                .boxed(),
        }
    }
}

impl<T: Send + 'static> From<StatusSink<T>> for Source<T> {
    fn from(sink: StatusSink<T>) -> Self {
        Self {
            stream: sink.boxed(),
        }
    }
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

/// Push handle for a [`Source::channel`] source
///
/// Dropping every clone of the sender is the end-of-input signal.
pub struct SourceSender<T> {
    sender: mpsc::Sender<Message<T>>,
}

impl<T> Clone for SourceSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> SourceSender<T> {
    /// Send a chunk, waiting until the head stage is ready for it
    ///
    /// Returns the item back if the chain is gone.
    pub async fn send(&self, item: T) -> Result<(), T> {
        match self.sender.reserve().await {
            Ok(permit) => {
                permit.send(Ok(item));
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    /// Raise the error signal and end the source
    ///
    /// Returns the error back if the chain is gone.
    pub async fn fail(self, error: impl Into<BoxError>) -> Result<(), PipelineError> {
        let error = PipelineError::upstream(error);
        match self.sender.reserve().await {
            Ok(permit) => {
                permit.send(Err(error));
                Ok(())
            }
            Err(_) => Err(error),
        }
    }

    /// Check if the chain attached to this source has gone away
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Get the current free capacity of the channel
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl<T> fmt::Debug for SourceSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSender")
            .field("closed", &self.is_closed())
            .field("capacity", &self.capacity())
            .finish()
    }
}
