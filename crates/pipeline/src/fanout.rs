//! Fan-out - broadcast one message stream into independent branches
//!
//! A spawned task reads the input and duplicates every message into one
//! unbounded channel per branch. Branches never wait on each other: a slow
//! consumer buffers its backlog in its own channel.
//!
//! ```text
//!                          ┌──→ branch 0
//! [input] ──→ broadcast ───┼──→ branch 1
//!                          └──→ branch n-1
//! ```

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::source::Message;

/// Spawn a broadcast task and return one receiver per branch
///
/// With zero branches nothing is spawned and the input is dropped.
pub(crate) fn spawn<T>(
    input: BoxStream<'static, Message<T>>,
    branches: usize,
) -> Vec<mpsc::UnboundedReceiver<Message<T>>>
where
    T: Clone + Send + 'static,
{
    if branches == 0 {
        return Vec::new();
    }

    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..branches).map(|_| mpsc::unbounded_channel()).unzip();

    tokio::spawn(broadcast(input, senders));

    receivers
}

async fn broadcast<T: Clone>(
    mut input: BoxStream<'static, Message<T>>,
    mut branches: Vec<mpsc::UnboundedSender<Message<T>>>,
) {
    trace!(branches = branches.len(), "fan-out starting");

    while let Some(message) = input.next().await {
        let failed = message.is_err();

        // Closed branches are dropped; the rest keep receiving
        branches.retain(|branch| branch.send(message.clone()).is_ok());

        if branches.is_empty() {
            debug!("every fan-out branch disconnected, stopping");
            return;
        }

        if failed {
            break;
        }
    }

    trace!(branches = branches.len(), "fan-out finished");
}
