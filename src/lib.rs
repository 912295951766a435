//! # docraptor
//!
//! Recursive abstractive tree indexing (RAPTOR) for question answering over
//! long documents.
//!
//! A document is split into overlapping chunks, the chunks are embedded and
//! softly clustered, each cluster is summarised, and the summaries are
//! embedded and clustered again until one root remains. Questions are
//! answered from the nodes most similar to them across every level, so both
//! detail questions and whole-document questions find matching context.
//!
//! ```text
//! text ─► segment ─► embed ─► ┌─► cluster ─► summarize ─► embed ─┐
//!                             └──────────── next level ◄─────────┘
//!                                          │ one node left
//!                                          ▼
//!                               Tree ─► TreeIndex ─► Retriever ─► Answer
//! ```
//!
//! The embedding and completion models are external capabilities behind the
//! [`EmbeddingModel`] and [`CompletionModel`] traits. The `ollama` feature
//! provides an HTTP implementation of both.
//!
//! **Default build** enables `parallel` (rayon) for index scans and the
//! mixture E-step.

pub mod cancel;
pub mod cluster;
pub mod config;
pub mod embed;
/// Error types used across `docraptor`.
pub mod error;
pub mod hierarchy;
pub mod index;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod pipeline;
pub mod retrieve;
pub mod retry;
pub mod segment;
pub mod summarize;

#[cfg(test)]
mod testing;

pub use cancel::Cancellation;
pub use cluster::{ClusterAssignment, ClusterConfig, ClusterEngine};
pub use config::RaptorConfig;
pub use embed::{Embedder, EmbedderConfig, EmbeddingCache, EmbeddingModel};
pub use error::{Error, ModelError, Result};
pub use hierarchy::{
    BuildOutput, BuildReport, BuilderConfig, Node, NodeContent, NodeId, Tree, TreeBuilder,
    ValidationReport,
};
pub use index::{IndexHandle, LevelFilter, QueryResult, TreeIndex};
pub use pipeline::{DocumentIndexer, IndexedDocument};
pub use retrieve::{
    Answer, AnswerStatus, DefaultPromptBuilder, MultiQueryMode, PromptBuilder, QueryAnswer,
    RetrievalMode, Retriever, RetrieverConfig,
};
pub use retry::RetryConfig;
pub use segment::{Chunk, Segmenter, SegmenterConfig};
pub use summarize::{CompletionModel, Summarizer, SummarizerConfig};

#[cfg(feature = "ollama")]
pub use ollama::OllamaClient;
