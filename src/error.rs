use std::time::Duration;

use thiserror::Error;

use crate::index::TreeIndex;

/// Result alias for `docraptor`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by segmentation, tree construction and retrieval.
#[derive(Debug, Error)]
pub enum Error {
    /// Input text was empty (or contained no tokens).
    #[error("empty input provided")]
    EmptyInput,

    /// Input was present but unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// The embedding capability stayed unreachable after all retries.
    #[error("embedding model unavailable after {attempts} attempt(s): {source}")]
    EmbeddingUnavailable {
        /// Attempts made for the failing batch.
        attempts: u32,
        /// Last failure reported by the model.
        #[source]
        source: ModelError,
    },

    /// A summary could not be produced after all retries.
    #[error("summarization failed after {attempts} attempt(s): {source}")]
    Summarization {
        /// Attempts made.
        attempts: u32,
        /// Last failure reported by the model.
        #[source]
        source: ModelError,
    },

    /// The document did not fit in the configured level bound.
    ///
    /// `fallback` indexes the leaf chunks only, so callers can still run
    /// flat retrieval against the document.
    #[error("document exceeds capacity: {top_nodes} nodes remain after {levels} level(s), limit {limit}")]
    Capacity {
        /// Levels built before giving up.
        levels: usize,
        /// Nodes left at the highest level.
        top_nodes: usize,
        /// Configured root fan-in limit.
        limit: usize,
        /// Leaf-only index.
        fallback: Box<TreeIndex>,
    },

    /// Query could not be answered against the index.
    #[error("query failed: {0}")]
    Query(String),

    /// The completion capability failed while answering a question.
    #[error("completion failed after {attempts} attempt(s): {source}")]
    Completion {
        /// Attempts made.
        attempts: u32,
        /// Last failure reported by the model.
        #[source]
        source: ModelError,
    },

    /// A build was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Tree (de)serialization or file I/O failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Raw failure from an external model capability.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl Error {
    /// True when the error means the document could not be fully indexed.
    ///
    /// Distinct from an empty query result, which is never an error.
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable { .. } | Error::Capacity { .. } | Error::Cancelled
        )
    }

    /// Leaf-only index carried by a capacity failure.
    pub fn fallback_index(&self) -> Option<&TreeIndex> {
        match self {
            Error::Capacity { fallback, .. } => Some(fallback),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

/// Failure reported by an external model capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Worth retrying (connection refused, overload, 5xx).
    #[error("transient model failure: {0}")]
    Transient(String),

    /// Retrying will not help (bad request, malformed response).
    #[error("model failure: {0}")]
    Permanent(String),

    /// The call did not finish within the per-call timeout.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

impl ModelError {
    /// Whether a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ModelError::Permanent(_))
    }
}
