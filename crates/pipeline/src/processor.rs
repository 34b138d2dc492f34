//! Processor - an immutable, chainable description of a pipeline
//!
//! A `Processor` is an ordered list of stages. Builder calls consume the
//! processor and return a longer one; nothing runs until a source is
//! attached with [`Processor::start`] (or one of the terminal aggregators).
//!
//! # Example
//!
//! ```
//! # use rill_pipeline::Processor;
//! # use std::convert::Infallible;
//! # struct Order { country: &'static str, amount: u64 }
//! # #[tokio::main]
//! # async fn main() -> rill_pipeline::Result<()> {
//! # let orders = vec![
//! #     Order { country: "BR", amount: 30 },
//! #     Order { country: "DE", amount: 5 },
//! #     Order { country: "BR", amount: 12 },
//! # ];
//! let totals = Processor::new()
//!     .filter(|order: &Order| Ok::<_, Infallible>(order.country == "BR"))
//!     .map(|order: Order, _index| Ok::<_, Infallible>(order.amount))
//!     .reduce(|acc, amount| Ok::<_, Infallible>(acc + amount))
//!     .collect(orders)
//!     .await?;
//! assert_eq!(totals, vec![42]);
//! # Ok(())
//! # }
//! ```
//!
//! Every start builds fresh stage tasks, so one processor can run any
//! number of chains, concurrently or one after the other, without any
//! accumulator or index carrying over.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use futures::future;
use indexmap::IndexMap;
use rill_config::PipelineConfig;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{BoxError, PipelineError, Result};
use crate::fanout;
use crate::metrics::PipelineMetrics;
use crate::source::{Message, Source};
use crate::stage::{
    self, BoxedMapper, BoxedPredicate, BoxedReducer, BoxedSeed, FilterStage, FlatMapStage,
    MapStage, ReduceStage, Stage, StageDescriptor, StageKind, Wiring,
};
use crate::status_sink::StatusSink;

#[cfg(test)]
#[path = "processor_test.rs"]
mod tests;

/// Default capacity of every inter-stage channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Spawns the stage tasks of a chain behind the given head receiver
type Wire<In, Out> =
    Arc<dyn Fn(mpsc::Receiver<Message<In>>, &Wiring) -> mpsc::Receiver<Message<Out>> + Send + Sync>;

fn into_box<E: Into<BoxError>>(error: E) -> BoxError {
    error.into()
}

/// Chainable pipeline of stages from `In` chunks to `Out` chunks
pub struct Processor<In, Out = In> {
    wire: Wire<In, Out>,
    stages: Arc<[StageDescriptor]>,
    channel_capacity: usize,
    metrics: Arc<PipelineMetrics>,
}

impl<T: Send + 'static> Processor<T> {
    /// Create an empty chain with the default channel capacity
    pub fn new() -> Self {
        Self {
            wire: Arc::new(|input: mpsc::Receiver<Message<T>>, _: &Wiring| input),
            stages: Arc::from(Vec::new()),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Create an empty chain using the channel capacity from `config`
    pub fn with_config(config: &PipelineConfig) -> Self {
        Self::new().with_channel_capacity(config.channel_capacity)
    }
}

impl<T: Send + 'static> Default for Processor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: Send + 'static, Out: Send + 'static> Processor<In, Out> {
    /// Set the capacity of every inter-stage channel (at least 1)
    ///
    /// Applies to chains started afterwards.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Apply `mapper(chunk, index)` to every chunk
    ///
    /// `index` counts the chunks this stage processed in the current run,
    /// starting at 0.
    pub fn map<Next, F, E>(self, mapper: F) -> Processor<In, Next>
    where
        F: Fn(Out, usize) -> std::result::Result<Next, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
        Next: Send + 'static,
    {
        let mapper: BoxedMapper<Out, Next> = Arc::new(move |item, index| {
            future::ready(mapper(item, index).map_err(into_box)).boxed()
        });
        self.push(StageKind::Map, move |_| MapStage::new(Arc::clone(&mapper)))
    }

    /// Apply an async `mapper(chunk, index)` to every chunk
    ///
    /// The next chunk is not taken until the returned future resolved.
    pub fn map_async<Next, F, Fut, E>(self, mapper: F) -> Processor<In, Next>
    where
        F: Fn(Out, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Next, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
        Next: Send + 'static,
    {
        let mapper: BoxedMapper<Out, Next> = Arc::new(move |item, index| {
            mapper(item, index)
                .map(|result| result.map_err(into_box))
                .boxed()
        });
        self.push(StageKind::Map, move |_| MapStage::new(Arc::clone(&mapper)))
    }

    /// Map every chunk to zero or more chunks, emitted in order
    pub fn flat_map<Next, I, F, E>(self, mapper: F) -> Processor<In, Next>
    where
        F: Fn(Out, usize) -> std::result::Result<I, E> + Send + Sync + 'static,
        I: IntoIterator<Item = Next>,
        E: Into<BoxError> + 'static,
        Next: Send + 'static,
    {
        let mapper: BoxedMapper<Out, Vec<Next>> = Arc::new(move |item, index| {
            let items = mapper(item, index)
                .map(|items| items.into_iter().collect::<Vec<_>>())
                .map_err(into_box);
            future::ready(items).boxed()
        });
        self.push(StageKind::FlatMap, move |_| {
            FlatMapStage::new(Arc::clone(&mapper))
        })
    }

    /// Async form of [`Processor::flat_map`]
    pub fn flat_map_async<Next, I, F, Fut, E>(self, mapper: F) -> Processor<In, Next>
    where
        F: Fn(Out, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<I, E>> + Send + 'static,
        I: IntoIterator<Item = Next>,
        E: Into<BoxError> + 'static,
        Next: Send + 'static,
    {
        let mapper: BoxedMapper<Out, Vec<Next>> = Arc::new(move |item, index| {
            mapper(item, index)
                .map(|result| {
                    result
                        .map(|items| items.into_iter().collect::<Vec<_>>())
                        .map_err(into_box)
                })
                .boxed()
        });
        self.push(StageKind::FlatMap, move |_| {
            FlatMapStage::new(Arc::clone(&mapper))
        })
    }

    /// Emit the items of every chunk, which is itself a collection
    pub fn flatten(self) -> Processor<In, Out::Item>
    where
        Out: IntoIterator,
        Out::Item: Send + 'static,
    {
        self.flat_map(|chunk, _| Ok::<_, Infallible>(chunk))
    }

    /// Forward chunks for which `predicate` is true, drop the others
    pub fn filter<F, E>(self, predicate: F) -> Processor<In, Out>
    where
        F: Fn(&Out) -> std::result::Result<bool, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let predicate: BoxedPredicate<Out> = Arc::new(move |item: &Out| {
            future::ready(predicate(item).map_err(into_box)).boxed()
        });
        self.push(StageKind::Filter, move |wiring| {
            FilterStage::new(Arc::clone(&predicate), Arc::clone(&wiring.metrics))
        })
    }

    /// Async form of [`Processor::filter`]
    ///
    /// The returned future may not borrow the chunk.
    pub fn filter_async<F, Fut, E>(self, predicate: F) -> Processor<In, Out>
    where
        F: Fn(&Out) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<bool, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let predicate: BoxedPredicate<Out> = Arc::new(move |item: &Out| {
            predicate(item)
                .map(|result| result.map_err(into_box))
                .boxed()
        });
        self.push(StageKind::Filter, move |wiring| {
            FilterStage::new(Arc::clone(&predicate), Arc::clone(&wiring.metrics))
        })
    }

    /// Combine all chunks into one, emitted at end-of-input
    ///
    /// The first chunk seeds the accumulator without a reducer call. An
    /// empty input emits nothing.
    pub fn reduce<F, E>(self, reducer: F) -> Processor<In, Out>
    where
        F: Fn(Out, Out) -> std::result::Result<Out, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let reducer: BoxedReducer<Out, Out> =
            Arc::new(move |acc, item| reducer(acc, item).map_err(into_box));
        let seed: BoxedSeed<Out, Out> = Arc::new(Ok::<Out, BoxError>);

        self.push(StageKind::Reduce, move |_| {
            ReduceStage::new(Arc::clone(&reducer), Arc::clone(&seed), None)
        })
    }

    /// Combine all chunks into an accumulator starting from `initial`
    ///
    /// Emits the accumulator at end-of-input; an empty input emits
    /// `initial` itself.
    pub fn fold<Acc, F, E>(self, initial: Acc, reducer: F) -> Processor<In, Acc>
    where
        Acc: Clone + Send + Sync + 'static,
        F: Fn(Acc, Out) -> std::result::Result<Acc, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let reducer: BoxedReducer<Acc, Out> =
            Arc::new(move |acc, item| reducer(acc, item).map_err(into_box));
        let seed: BoxedSeed<Out, Acc> = {
            let reducer = Arc::clone(&reducer);
            let initial = initial.clone();
            Arc::new(move |item| reducer(initial.clone(), item))
        };

        self.push(StageKind::Fold, move |_| {
            ReduceStage::new(
                Arc::clone(&reducer),
                Arc::clone(&seed),
                Some(initial.clone()),
            )
        })
    }

    /// Attach `source` and return the sink at the tail
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, source: impl Into<Source<In>>) -> StatusSink<Out> {
        StatusSink::bounded(self.launch(source.into()))
    }

    /// Attach `source` once and fork the tail into `quantity` sinks
    ///
    /// Every sink gets every chunk and the error signal. A zero quantity
    /// returns no sink and leaves the source unattached.
    pub fn start_multiple(
        &self,
        source: impl Into<Source<In>>,
        quantity: usize,
    ) -> Vec<StatusSink<Out>>
    where
        Out: Clone,
    {
        if quantity == 0 {
            return Vec::new();
        }

        let tail = Source::from_channel(self.launch(source.into()));
        fanout::spawn(tail.into_stream(), quantity)
            .into_iter()
            .map(StatusSink::unbounded)
            .collect()
    }

    /// Run the chain over `source` and gather every output chunk in order
    ///
    /// # Errors
    ///
    /// The first error raised by the source or any stage; partial results
    /// are discarded.
    pub async fn collect(&self, source: impl Into<Source<In>>) -> Result<Vec<Out>> {
        let mut sink = self.start(source);
        let mut items = Vec::new();

        while let Some(message) = sink.recv().await {
            items.push(message?);
        }

        Ok(items)
    }

    /// Run the chain over `source` and bucket output chunks by key
    ///
    /// Keys keep first-occurrence order; chunks keep arrival order within
    /// their key.
    ///
    /// # Errors
    ///
    /// The first error raised by the source or any stage, or
    /// [`PipelineError::GroupKey`] when `key_mapper` fails or panics. Partial
    /// groups are discarded and the chain is torn down.
    pub async fn group_by<K, F, E>(
        &self,
        source: impl Into<Source<In>>,
        key_mapper: F,
    ) -> Result<IndexMap<K, Vec<Out>>>
    where
        K: Hash + Eq,
        F: Fn(&Out) -> std::result::Result<K, E>,
        E: Into<BoxError>,
    {
        let mut sink = self.start(source);
        let mut groups: IndexMap<K, Vec<Out>> = IndexMap::new();

        while let Some(message) = sink.recv().await {
            let item = message?;
            let key = match panic::catch_unwind(AssertUnwindSafe(|| key_mapper(&item))) {
                Ok(key) => key.map_err(PipelineError::group_key)?,
                Err(panic) => {
                    let detail = stage::panic_message(panic);
                    return Err(PipelineError::group_key(format!(
                        "key function panicked: {detail}"
                    )));
                }
            };
            groups.entry(key).or_default().push(item);
        }

        Ok(groups)
    }

    /// Stages of the chain in declaration order
    #[inline]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Number of stages
    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stage
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Get the metrics shared by every run of this processor
    #[inline]
    pub fn metrics_handle(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    fn launch(&self, source: Source<In>) -> mpsc::Receiver<Message<Out>> {
        let wiring = Wiring {
            capacity: self.channel_capacity,
            metrics: Arc::clone(&self.metrics),
        };

        self.metrics.record_run_started();
        debug!(
            stages = self.stages.len(),
            chain = %self.summary(),
            capacity = self.channel_capacity,
            "starting chain"
        );

        let head = stage::spawn_source(source, &wiring);
        (self.wire)(head, &wiring)
    }

    fn summary(&self) -> String {
        self.stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn push<Next, S, F>(self, kind: StageKind, make: F) -> Processor<In, Next>
    where
        S: Stage<In = Out, Out = Next>,
        F: Fn(&Wiring) -> S + Send + Sync + 'static,
        Next: Send + 'static,
    {
        let descriptor = StageDescriptor::new(self.stages.len(), kind);
        let upstream = self.wire;

        let wire: Wire<In, Next> = Arc::new(
            move |input: mpsc::Receiver<Message<In>>, wiring: &Wiring| {
                let output = upstream(input, wiring);
                stage::spawn(make(wiring), descriptor, output, wiring)
            },
        );

        let stages: Vec<StageDescriptor> = self
            .stages
            .iter()
            .copied()
            .chain(std::iter::once(descriptor))
            .collect();

        Processor {
            wire,
            stages: Arc::from(stages),
            channel_capacity: self.channel_capacity,
            metrics: self.metrics,
        }
    }
}

impl<In, Out> Clone for Processor<In, Out> {
    fn clone(&self) -> Self {
        Self {
            wire: Arc::clone(&self.wire),
            stages: Arc::clone(&self.stages),
            channel_capacity: self.channel_capacity,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<In, Out> fmt::Debug for Processor<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("stages", &self.stages)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}
