//! Status sink - the consumer end of a running chain
//!
//! A `StatusSink` is a stream of the chain's output messages that also
//! tracks what it has observed. Once the stream ended it can answer whether
//! any chunk ever passed through; asking earlier is an error.
//!
//! # State machine
//!
//! ```text
//!             end-of-input
//! Receiving ──────────────→ Finished(Completion)
//!     │
//!     └── error signal ───→ Failed(PipelineError)
//! ```
//!
//! Both terminal states are final: nothing observed afterwards changes them.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};
use crate::source::Message;

#[cfg(test)]
#[path = "status_sink_test.rs"]
mod tests;

/// Lifecycle of a status sink
#[derive(Debug, Clone)]
pub enum SinkState {
    /// The chain may still deliver messages
    Receiving,
    /// End-of-input was observed
    Finished(Completion),
    /// The error signal was observed
    Failed(PipelineError),
}

impl SinkState {
    /// Whether the sink reached a terminal state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Receiving)
    }
}

/// Summary of a stream that finished normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    received_any: bool,
}

impl Completion {
    /// Whether no chunk passed through before end-of-input
    #[inline]
    pub fn was_empty(&self) -> bool {
        !self.received_any
    }
}

enum Inbox<T> {
    Bounded(mpsc::Receiver<Message<T>>),
    Unbounded(mpsc::UnboundedReceiver<Message<T>>),
}

impl<T> Inbox<T> {
    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Message<T>>> {
        match self {
            Self::Bounded(rx) => rx.poll_recv(cx),
            Self::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

/// Consumer end of a running chain
///
/// Dropping the sink cancels the chain: every stage stops on its next emit
/// and the source is released.
pub struct StatusSink<T> {
    inbox: Inbox<T>,
    state: SinkState,
    received_any: bool,
}

impl<T> StatusSink<T> {
    pub(crate) fn bounded(receiver: mpsc::Receiver<Message<T>>) -> Self {
        Self::with_inbox(Inbox::Bounded(receiver))
    }

    pub(crate) fn unbounded(receiver: mpsc::UnboundedReceiver<Message<T>>) -> Self {
        Self::with_inbox(Inbox::Unbounded(receiver))
    }

    fn with_inbox(inbox: Inbox<T>) -> Self {
        Self {
            inbox,
            state: SinkState::Receiving,
            received_any: false,
        }
    }

    /// Receive the next message
    ///
    /// Returns `None` once the stream has ended. After an error signal the
    /// stream ends; no further chunk is delivered.
    pub async fn recv(&mut self) -> Option<Message<T>> {
        std::future::poll_fn(|cx| self.poll_message(cx)).await
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> &SinkState {
        &self.state
    }

    /// Whether at least one chunk was received so far
    #[inline]
    pub fn received_any(&self) -> bool {
        self.received_any
    }

    /// Whether the sink reached a terminal state
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the finished stream delivered no chunk at all
    ///
    /// # Errors
    ///
    /// [`PipelineError::PrematureQuery`] while the stream is still
    /// receiving. A failed stream returns its error.
    pub fn was_empty(&self) -> Result<bool> {
        match &self.state {
            SinkState::Receiving => Err(PipelineError::PrematureQuery),
            SinkState::Finished(completion) => Ok(completion.was_empty()),
            SinkState::Failed(error) => Err(error.clone()),
        }
    }

    fn poll_message(&mut self, cx: &mut Context<'_>) -> Poll<Option<Message<T>>> {
        if self.state.is_terminal() {
            return Poll::Ready(None);
        }

        let message = match self.inbox.poll_recv(cx) {
            Poll::Ready(message) => message,
            Poll::Pending => return Poll::Pending,
        };

        match &message {
            Some(Ok(_)) => self.received_any = true,
            Some(Err(error)) => self.state = SinkState::Failed(error.clone()),
            None => {
                self.state = SinkState::Finished(Completion {
                    received_any: self.received_any,
                });
            }
        }

        Poll::Ready(message)
    }
}

// No field is ever pinned
impl<T> Unpin for StatusSink<T> {}

impl<T> Stream for StatusSink<T> {
    type Item = Message<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_message(cx)
    }
}

impl<T> std::fmt::Debug for StatusSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSink")
            .field("state", &self.state)
            .field("received_any", &self.received_any)
            .finish_non_exhaustive()
    }
}
