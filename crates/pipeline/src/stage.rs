//! Stages - one transform step of a chain
//!
//! Every stage runs as its own task between two bounded channels:
//!
//! ```text
//! [input rx] ──→ drive(stage) ──→ [output tx]
//! ```
//!
//! # Design
//!
//! - **One chunk at a time**: the driver does not receive chunk n+1 until
//!   `process` (including any awaited transform) finished chunk n
//! - **Explicit error forwarding**: an upstream error message is re-emitted
//!   on the output before the stage stops, so it reaches the tail through
//!   any number of stages
//! - **Fail-fast**: a failing (or panicking) transform emits one error and
//!   stops the stage; remaining chunks are abandoned
//! - **Cancellation by drop**: when the output receiver is gone the stage
//!   stops and drops its input, which unwinds the chain upstream

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{BoxError, PipelineError};
use crate::metrics::PipelineMetrics;
use crate::source::{Message, Source};

#[cfg(test)]
#[path = "stage_test.rs"]
mod tests;

/// Kind of transform a stage applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// One output per input
    Map,
    /// Zero or more outputs per input
    FlatMap,
    /// Input forwarded unchanged or dropped
    Filter,
    /// Accumulator seeded from the first chunk, one output at end-of-input
    Reduce,
    /// Accumulator seeded from an initial value, one output at end-of-input
    Fold,
}

impl StageKind {
    /// Stage kind name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::FlatMap => "flat_map",
            Self::Filter => "filter",
            Self::Reduce => "reduce",
            Self::Fold => "fold",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position and kind of a stage within its chain
///
/// Positions count from 0 at the head, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageDescriptor {
    position: usize,
    kind: StageKind,
}

impl StageDescriptor {
    /// Create a descriptor
    #[inline]
    pub const fn new(position: usize, kind: StageKind) -> Self {
        Self { position, kind }
    }

    /// Position of the stage in its chain
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Kind of the stage
    #[inline]
    pub fn kind(&self) -> StageKind {
        self.kind
    }
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.position)
    }
}

/// Caller-supplied mapper, boxed at the builder boundary
pub(crate) type BoxedMapper<In, Out> =
    Arc<dyn Fn(In, usize) -> BoxFuture<'static, Result<Out, BoxError>> + Send + Sync>;

/// Caller-supplied predicate
pub(crate) type BoxedPredicate<T> =
    Arc<dyn Fn(&T) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync>;

/// Caller-supplied reducer (also used to seed an empty accumulator)
pub(crate) type BoxedReducer<Acc, T> = Arc<dyn Fn(Acc, T) -> Result<Acc, BoxError> + Send + Sync>;

/// Seeds an empty accumulator from a first chunk
pub(crate) type BoxedSeed<T, Acc> = Arc<dyn Fn(T) -> Result<Acc, BoxError> + Send + Sync>;

/// Why a stage stopped before its input ended
pub(crate) enum StageFault {
    /// The caller's function failed
    Transform(BoxError),
    /// Nobody is listening downstream
    Disconnected,
}

/// Output side of a stage
pub(crate) struct Emitter<T> {
    sender: mpsc::Sender<Message<T>>,
}

impl<T> Emitter<T> {
    /// Emit one chunk, waiting until downstream is ready for it
    pub(crate) async fn emit(&self, item: T) -> Result<(), StageFault> {
        self.sender
            .send(Ok(item))
            .await
            .map_err(|_| StageFault::Disconnected)
    }

    /// Emit the error signal; the stage stops afterwards either way
    async fn fail(&self, error: PipelineError) {
        // Downstream may already be gone; nothing is left to notify then
        let _ = self.sender.send(Err(error)).await;
    }
}

/// A single transform unit
///
/// State held by an implementation (item counters, accumulators) is private
/// to one running chain: a fresh stage is built every time a chain starts.
#[async_trait]
pub(crate) trait Stage: Send + 'static {
    /// Chunk type consumed
    type In: Send + 'static;

    /// Chunk type produced
    type Out: Send + 'static;

    /// Process one chunk, emitting zero or more outputs
    async fn process(&mut self, item: Self::In, out: &Emitter<Self::Out>) -> Result<(), StageFault>;

    /// Called once at end-of-input, before the output closes
    async fn finish(&mut self, _out: &Emitter<Self::Out>) -> Result<(), StageFault> {
        Ok(())
    }
}

/// Settings shared by every task of one running chain
#[derive(Debug, Clone)]
pub(crate) struct Wiring {
    /// Capacity of each inter-stage channel
    pub(crate) capacity: usize,
    pub(crate) metrics: Arc<PipelineMetrics>,
}

impl Wiring {
    pub(crate) fn channel<T>(&self) -> (mpsc::Sender<Message<T>>, mpsc::Receiver<Message<T>>) {
        mpsc::channel(self.capacity.max(1))
    }
}

/// Spawn the task pumping a source into the head of a chain
pub(crate) fn spawn_source<T: Send + 'static>(
    source: Source<T>,
    wiring: &Wiring,
) -> mpsc::Receiver<Message<T>> {
    let (sender, receiver) = wiring.channel();
    tokio::spawn(pump(source, sender, Arc::clone(&wiring.metrics)));
    receiver
}

async fn pump<T>(
    mut source: Source<T>,
    sender: mpsc::Sender<Message<T>>,
    metrics: Arc<PipelineMetrics>,
) {
    // Next chunk is pulled only once the head stage has room for it
    while let Ok(permit) = sender.reserve().await {
        match source.next().await {
            Some(Ok(item)) => {
                metrics.record_ingested();
                permit.send(Ok(item));
            }
            Some(Err(error)) => {
                debug!(error = %error, "source raised an error");
                metrics.record_upstream_failure();
                permit.send(Err(error));
                return;
            }
            None => return,
        }
    }

    debug!("chain disconnected, releasing source");
}

/// Spawn a stage task reading `input` and return its output receiver
pub(crate) fn spawn<S: Stage>(
    stage: S,
    descriptor: StageDescriptor,
    input: mpsc::Receiver<Message<S::In>>,
    wiring: &Wiring,
) -> mpsc::Receiver<Message<S::Out>> {
    let (sender, receiver) = wiring.channel();
    tokio::spawn(drive(
        stage,
        descriptor,
        input,
        Emitter { sender },
        Arc::clone(&wiring.metrics),
    ));
    receiver
}

async fn drive<S: Stage>(
    mut stage: S,
    descriptor: StageDescriptor,
    mut input: mpsc::Receiver<Message<S::In>>,
    output: Emitter<S::Out>,
    metrics: Arc<PipelineMetrics>,
) {
    trace!(stage = %descriptor, "stage started");

    let fault = loop {
        match input.recv().await {
            Some(Ok(item)) => {
                match AssertUnwindSafe(stage.process(item, &output))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(fault)) => break Some(fault),
                    Err(panic) => {
                        let detail = panic_message(panic);
                        break Some(StageFault::Transform(
                            format!("transform panicked: {detail}").into(),
                        ));
                    }
                }
            }
            Some(Err(error)) => {
                trace!(stage = %descriptor, error = %error, "forwarding upstream error");
                output.fail(error).await;
                break None;
            }
            None => match stage.finish(&output).await {
                Ok(()) => break None,
                Err(fault) => break Some(fault),
            },
        }
    };

    match fault {
        Some(StageFault::Transform(source)) => {
            let error = PipelineError::transform(descriptor, source);
            warn!(stage = %descriptor, error = %error, "stage failed");
            metrics.record_transform_failure();
            output.fail(error).await;
        }
        Some(StageFault::Disconnected) => {
            debug!(stage = %descriptor, "downstream disconnected, stopping stage");
        }
        None => {}
    }

    trace!(stage = %descriptor, "stage stopped");
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string())
}

// ============================================================================
// Stage implementations
// ============================================================================

/// Applies a mapper to each chunk, counting chunks from 0
pub(crate) struct MapStage<In, Out> {
    mapper: BoxedMapper<In, Out>,
    index: usize,
}

impl<In, Out> MapStage<In, Out> {
    pub(crate) fn new(mapper: BoxedMapper<In, Out>) -> Self {
        Self { mapper, index: 0 }
    }
}

#[async_trait]
impl<In: Send + 'static, Out: Send + 'static> Stage for MapStage<In, Out> {
    type In = In;
    type Out = Out;

    async fn process(&mut self, item: In, out: &Emitter<Out>) -> Result<(), StageFault> {
        let index = self.index;
        self.index += 1;

        let mapped = (self.mapper)(item, index)
            .await
            .map_err(StageFault::Transform)?;
        out.emit(mapped).await
    }
}

/// Emits every item a mapper returns, in order, before taking the next chunk
pub(crate) struct FlatMapStage<In, Out> {
    mapper: BoxedMapper<In, Vec<Out>>,
    index: usize,
}

impl<In, Out> FlatMapStage<In, Out> {
    pub(crate) fn new(mapper: BoxedMapper<In, Vec<Out>>) -> Self {
        Self { mapper, index: 0 }
    }
}

#[async_trait]
impl<In: Send + 'static, Out: Send + 'static> Stage for FlatMapStage<In, Out> {
    type In = In;
    type Out = Out;

    async fn process(&mut self, item: In, out: &Emitter<Out>) -> Result<(), StageFault> {
        let index = self.index;
        self.index += 1;

        let items = (self.mapper)(item, index)
            .await
            .map_err(StageFault::Transform)?;
        for item in items {
            out.emit(item).await?;
        }
        Ok(())
    }
}

/// Forwards chunks the predicate accepts, drops the rest
pub(crate) struct FilterStage<T> {
    predicate: BoxedPredicate<T>,
    metrics: Arc<PipelineMetrics>,
}

impl<T> FilterStage<T> {
    pub(crate) fn new(predicate: BoxedPredicate<T>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { predicate, metrics }
    }
}

#[async_trait]
impl<T: Send + 'static> Stage for FilterStage<T> {
    type In = T;
    type Out = T;

    async fn process(&mut self, item: T, out: &Emitter<T>) -> Result<(), StageFault> {
        let verdict = (self.predicate)(&item);
        let accept = verdict.await.map_err(StageFault::Transform)?;

        if accept {
            out.emit(item).await
        } else {
            self.metrics.record_filtered();
            Ok(())
        }
    }
}

/// Folds every chunk into one accumulator and emits it at end-of-input
///
/// The first chunk goes through `seed` (identity for reduce, the reducer
/// applied to the initial value for fold). `on_empty` is emitted when the
/// input ends without a chunk; with `None` nothing is emitted.
pub(crate) struct ReduceStage<T, Acc> {
    reducer: BoxedReducer<Acc, T>,
    seed: BoxedSeed<T, Acc>,
    acc: Option<Acc>,
    on_empty: Option<Acc>,
}

impl<T, Acc> ReduceStage<T, Acc> {
    pub(crate) fn new(
        reducer: BoxedReducer<Acc, T>,
        seed: BoxedSeed<T, Acc>,
        on_empty: Option<Acc>,
    ) -> Self {
        Self {
            reducer,
            seed,
            acc: None,
            on_empty,
        }
    }
}

#[async_trait]
impl<T: Send + 'static, Acc: Send + 'static> Stage for ReduceStage<T, Acc> {
    type In = T;
    type Out = Acc;

    async fn process(&mut self, item: T, _out: &Emitter<Acc>) -> Result<(), StageFault> {
        let next = match self.acc.take() {
            Some(acc) => (self.reducer)(acc, item),
            None => (self.seed)(item),
        }
        .map_err(StageFault::Transform)?;

        self.acc = Some(next);
        Ok(())
    }

    async fn finish(&mut self, out: &Emitter<Acc>) -> Result<(), StageFault> {
        match self.acc.take().or_else(|| self.on_empty.take()) {
            Some(acc) => out.emit(acc).await,
            None => Ok(()),
        }
    }
}
