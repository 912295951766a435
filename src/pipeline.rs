//! End-to-end facade: text in, answerable index out.

use std::sync::Arc;

use tracing::info;

use crate::cancel::Cancellation;
use crate::cluster::ClusterEngine;
use crate::config::RaptorConfig;
use crate::embed::{Embedder, EmbeddingModel};
use crate::error::Result;
use crate::hierarchy::{BuildReport, TreeBuilder};
use crate::index::TreeIndex;
use crate::retrieve::{Answer, Retriever};
use crate::segment::Segmenter;
use crate::summarize::{CompletionModel, Summarizer};

/// An index built from one document, with its build statistics.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Read-only index, shareable across concurrent queries.
    pub index: Arc<TreeIndex>,
    /// How the tree was built.
    pub report: BuildReport,
}

/// Segments, builds and answers with one set of models and settings.
#[derive(Debug, Clone)]
pub struct DocumentIndexer {
    segmenter: Segmenter,
    builder: TreeBuilder,
    retriever: Retriever,
    config: RaptorConfig,
}

impl DocumentIndexer {
    /// Wire the components together. Fails on an invalid config.
    pub fn new(
        embedding: Arc<dyn EmbeddingModel>,
        completion: Arc<dyn CompletionModel>,
        config: RaptorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let embedder = Embedder::with_config(embedding, config.embedder.clone());
        let summarizer = Summarizer::with_config(completion.clone(), config.summarizer.clone());
        let builder = TreeBuilder::new(
            embedder.clone(),
            summarizer,
            ClusterEngine::new(config.cluster.clone()),
            config.builder.clone(),
        );
        let retriever = Retriever::new(embedder, completion, config.retriever.clone());
        Ok(Self {
            segmenter: Segmenter::new(config.segmenter.clone()),
            builder,
            retriever,
            config,
        })
    }

    /// Settings in use.
    pub fn config(&self) -> &RaptorConfig {
        &self.config
    }

    /// The retriever used by [`DocumentIndexer::answer`].
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Index one document given as plain text.
    pub async fn index_text(&self, text: &str, cancel: &Cancellation) -> Result<IndexedDocument> {
        self.index_segments(&[text], cancel).await
    }

    /// Index a document given as extracted text segments (pages, sections).
    ///
    /// A capacity failure carries a leaf-only fallback index; see
    /// [`crate::Error::fallback_index`].
    pub async fn index_segments<S: AsRef<str>>(
        &self,
        segments: &[S],
        cancel: &Cancellation,
    ) -> Result<IndexedDocument> {
        let chunks = self.segmenter.segment_segments(segments)?;
        info!(segments = segments.len(), chunks = chunks.len(), "document segmented");
        let output = self.builder.build_tree_with(chunks, cancel).await?;
        info!(
            levels = output.report.levels(),
            nodes = output.tree.len(),
            degraded = output.report.degraded.len(),
            "document indexed"
        );
        Ok(IndexedDocument {
            index: Arc::new(TreeIndex::new(output.tree)?),
            report: output.report,
        })
    }

    /// Answer a question against an index.
    pub async fn answer(&self, question: &str, index: &TreeIndex) -> Result<Answer> {
        self.retriever.answer(question, index).await
    }

    /// Answer with multi-query retrieval.
    pub async fn answer_with_related_queries(
        &self,
        question: &str,
        index: &TreeIndex,
    ) -> Result<Answer> {
        self.retriever
            .answer_with_related_queries(question, index)
            .await
    }
}
