//! Error types for batch processing.

use captioner_abstraction::GenerationError;
use thiserror::Error;

/// Errors that fail a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The request could not be decoded into work items.
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// A generation call failed for one item.
    #[error("Item {index} failed: {source}")]
    Generation {
        /// Index of the item that failed.
        index: usize,
        /// The underlying client error.
        #[source]
        source: GenerationError,
    },

    /// The task driving one item panicked or was aborted.
    #[error("Item {index} task failed: {reason}")]
    TaskFailed {
        /// Index of the item whose task failed.
        index: usize,
        /// Join error description.
        reason: String,
    },
}

impl BatchError {
    /// Create a MalformedBatch error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBatch(message.into())
    }

    /// Index of the failing item, when the failure belongs to one.
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::MalformedBatch(_) => None,
            Self::Generation { index, .. } | Self::TaskFailed { index, .. } => Some(*index),
        }
    }
}
