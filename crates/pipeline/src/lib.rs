//! Rill - Pipeline
//!
//! Chainable item pipelines where every stage is a task between two bounded
//! channels, so a slow consumer holds back the whole chain.
//!
//! # Architecture
//!
//! ```text
//! [Source]             [Processor: stage tasks]                 [Sinks]
//!
//!  iter ───┐                                                  ┌──→ StatusSink
//!  stream ─┼──→ pump ──→ map ──→ filter ──→ reduce ──→ tail ──┤   (start)
//!  channel ┘     ↑        capacity-1 mpsc between stages      └──→ fan-out ──→ StatusSink × n
//!                └──────── backpressure ─────────┘                (start_multiple)
//! ```
//!
//! # Key Design
//!
//! - **Immutable chains**: builder calls return a new `Processor`; stage
//!   state (index, accumulator) is built fresh for every run
//! - **Backpressure**: bounded `tokio::sync::mpsc` channels (capacity 1 by
//!   default), a stage takes the next chunk only after finishing the current
//! - **Error forwarding**: each stage re-emits an upstream error before
//!   stopping, so every sink sees it
//! - **Status sinks**: the tail tracks `Receiving`, `Finished` and `Failed`,
//!   and answers `was_empty()` once finished
//!
//! # Example
//!
//! ```
//! use rill_pipeline::{Processor, Source};
//! use std::convert::Infallible;
//!
//! # #[tokio::main]
//! # async fn main() -> rill_pipeline::Result<()> {
//! let doubled = Processor::new()
//!     .map(|x: u32, _index| Ok::<_, Infallible>(x * 2))
//!     .collect(Source::iter(vec![1, 2, 3]))
//!     .await?;
//! assert_eq!(doubled, vec![2, 4, 6]);
//!
//! // Attach a sink and watch its status
//! let mut sink = Processor::<u32>::new().start(vec![1, 2, 3]);
//! while let Some(chunk) = sink.recv().await {
//!     println!("{}", chunk?);
//! }
//! assert!(!sink.was_empty()?);
//! # Ok(())
//! # }
//! ```

mod error;
mod fanout;
mod metrics;
mod processor;
mod source;
mod stage;
mod status_sink;

pub use error::{BoxError, PipelineError, Result, SharedError};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use processor::{DEFAULT_CHANNEL_CAPACITY, Processor};
pub use source::{Message, Source, SourceSender};
pub use stage::{StageDescriptor, StageKind};
pub use status_sink::{Completion, SinkState, StatusSink};

// Re-export the config type accepted by `Processor::with_config`
pub use rill_config::PipelineConfig;
