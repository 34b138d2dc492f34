//! Pipeline error types
//!
//! Errors raised while a chain is running, plus the premature status query.
//! Errors are `Clone` because a single failure is broadcast to every sink
//! attached to a chain.

use std::sync::Arc;

use thiserror::Error;

use crate::stage::StageDescriptor;

/// Boxed error accepted from caller-supplied transform functions and sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of a [`BoxError`], cheap to clone into every fan-out branch
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline errors
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A map, flat_map, filter or reduce function failed (or panicked)
    #[error("stage {stage} failed: {source}")]
    Transform {
        /// The stage whose function failed
        stage: StageDescriptor,
        /// The caller's error
        #[source]
        source: SharedError,
    },

    /// The source raised its error signal
    #[error("upstream failed: {0}")]
    Upstream(#[source] SharedError),

    /// The `group_by` key function failed (or panicked)
    #[error("group key failed: {0}")]
    GroupKey(#[source] SharedError),

    /// `was_empty()` was called before the sink finished
    #[error("cannot check whether the stream was empty before it finished transferring")]
    PrematureQuery,
}

impl PipelineError {
    /// Create a transform error for the given stage
    pub fn transform(stage: StageDescriptor, source: impl Into<BoxError>) -> Self {
        Self::Transform {
            stage,
            source: Arc::from(source.into()),
        }
    }

    /// Create an upstream error
    pub fn upstream(source: impl Into<BoxError>) -> Self {
        Self::Upstream(Arc::from(source.into()))
    }

    /// Create a group key error
    pub fn group_key(source: impl Into<BoxError>) -> Self {
        Self::GroupKey(Arc::from(source.into()))
    }

    /// Whether this error came from a caller-supplied transform function
    #[inline]
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }

    /// Whether this error came from the source
    #[inline]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// The stage that failed, for transform errors
    pub fn stage(&self) -> Option<StageDescriptor> {
        match self {
            Self::Transform { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
