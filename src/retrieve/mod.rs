//! Question answering over a built index.
//!
//! ```text
//! question ──embed──► query index (collapsed | traversal)
//!                          │
//!                 min_similarity filter ──empty──► NoRelevantContext
//!                          │
//!              fit context to the token budget
//!                          │
//!                 build_prompt ──► complete ──► Answer
//! ```
//!
//! [`Retriever::answer_with_related_queries`] adds a multi-query front end:
//! the model proposes related queries and each is retrieved separately. The
//! rankings are merged with reciprocal rank fusion, then either
//!
//! - [`MultiQueryMode::FusedContext`]: one answer over the fused context, or
//! - [`MultiQueryMode::Synthesis`]: one answer per query over its own
//!   context, ordered by fused rank and merged by a final completion.

mod fusion;
mod prompt;

pub use fusion::{parse_related_queries, reciprocal_rank_fusion, RRF_K};

use fusion::fused_scores;
pub use prompt::{DefaultPromptBuilder, PromptBuilder};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embed::{Embedder, EmbeddingCache};
use crate::error::{Error, Result};
use crate::index::{LevelFilter, QueryResult, TreeIndex};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::segment::{count_tokens, truncate_tokens};
use crate::summarize::CompletionModel;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// How candidate nodes are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Nearest neighbours across all levels.
    #[default]
    Collapsed,
    /// Top-down, `top_k` per level.
    TreeTraversal,
}

/// How related-query retrievals turn into an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiQueryMode {
    /// Answer once over the fused ranking.
    #[default]
    FusedContext,
    /// Answer every query on its own, then merge the answers.
    Synthesis,
}

/// Retriever settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Candidate selection mode.
    pub mode: RetrievalMode,
    /// Nodes retrieved per query (per level when traversing).
    pub top_k: usize,
    /// Hits scoring below this are ignored.
    pub min_similarity: Option<f32>,
    /// Context window of the answering model, in tokens.
    pub context_token_limit: usize,
    /// Tokens reserved for the answer.
    pub answer_max_tokens: usize,
    /// Related queries requested by the multi-query front end.
    pub related_queries: usize,
    /// What the multi-query front end does with its rankings.
    pub multi_query: MultiQueryMode,
    /// Retry settings for completion calls.
    pub retry: RetryConfig,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Collapsed,
            top_k: 8,
            min_similarity: None,
            context_token_limit: 4_096,
            answer_max_tokens: 512,
            related_queries: 4,
            multi_query: MultiQueryMode::FusedContext,
            retry: RetryConfig::default(),
        }
    }
}

/// Whether an answer was grounded in retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    /// The model answered over retrieved context.
    Answered,
    /// Nothing relevant was found; the model was not asked.
    NoRelevantContext,
}

/// Answer plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Model output (empty when nothing relevant was found).
    pub answer_text: String,
    /// Nodes whose text went into the context, in context order.
    pub supporting_nodes: Vec<QueryResult>,
    /// Outcome.
    pub status: AnswerStatus,
    /// True when the top node had to be cut to fit the context window.
    pub context_truncated: bool,
    /// Queries retrieved for, the question first.
    pub queries: Vec<String>,
    /// Per-query answers behind a synthesized answer, most relevant first.
    /// Empty unless [`MultiQueryMode::Synthesis`] produced the answer.
    pub query_answers: Vec<QueryAnswer>,
}

impl Answer {
    fn no_context(queries: Vec<String>) -> Self {
        Self {
            answer_text: String::new(),
            supporting_nodes: Vec::new(),
            status: AnswerStatus::NoRelevantContext,
            context_truncated: false,
            queries,
            query_answers: Vec::new(),
        }
    }
}

/// One query's answer over its own context.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    /// The query answered.
    pub query: String,
    /// Model output for it.
    pub answer_text: String,
    /// Nodes in its context, in context order.
    pub supporting_nodes: Vec<QueryResult>,
    /// Fused score of its best supporting node.
    pub relevance: f64,
}

/// Context assembled for one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedContext {
    /// Joined node texts.
    pub text: String,
    /// Nodes included, in order.
    pub nodes: Vec<QueryResult>,
    /// True when the first node was cut.
    pub truncated: bool,
}

/// Answers questions against a [`TreeIndex`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    completer: Arc<dyn CompletionModel>,
    prompt: Arc<dyn PromptBuilder>,
    config: RetrieverConfig,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("completer", &self.completer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Retriever {
    /// Create a retriever with the default prompt template.
    pub fn new(
        embedder: Embedder,
        completer: Arc<dyn CompletionModel>,
        config: RetrieverConfig,
    ) -> Self {
        let policy = config.retry.policy();
        Self {
            embedder,
            completer,
            prompt: Arc::new(DefaultPromptBuilder),
            config,
            policy,
        }
    }

    /// Use a custom prompt template.
    pub fn with_prompt_builder(mut self, prompt: Arc<dyn PromptBuilder>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Rank nodes for `question` without calling the completion model.
    pub async fn retrieve(&self, question: &str, index: &TreeIndex) -> Result<Vec<QueryResult>> {
        let question = check_question(question)?;
        let cache = EmbeddingCache::new();
        let vector = self.embedder.embed_one(question, &cache).await?;
        self.rank(&vector, index)
    }

    /// Answer `question` from the nodes most similar to it.
    pub async fn answer(&self, question: &str, index: &TreeIndex) -> Result<Answer> {
        let question = check_question(question)?;
        let hits = self.retrieve(question, index).await?;
        self.answer_over(question, hits, vec![question.to_string()], index)
            .await
    }

    /// Answer `question` after widening retrieval with related queries.
    ///
    /// A related-query response that does not parse falls back to the
    /// question alone.
    pub async fn answer_with_related_queries(
        &self,
        question: &str,
        index: &TreeIndex,
    ) -> Result<Answer> {
        let question = check_question(question)?;
        let mut queries = vec![question.to_string()];
        if self.config.related_queries > 0 {
            let prompt = prompt::related_queries_prompt(question, self.config.related_queries);
            match self.complete(&prompt, self.config.answer_max_tokens).await {
                Ok(response) => {
                    match parse_related_queries(&response, question, self.config.related_queries) {
                        Some(related) => queries.extend(related),
                        None => warn!("related-query response did not parse, using the question"),
                    }
                }
                Err(e) => warn!(error = %e, "related-query generation failed, using the question"),
            }
        }
        debug!(queries = queries.len(), "multi-query retrieval");

        let cache = EmbeddingCache::new();
        let vectors = self.embedder.embed_batch(&queries, &cache).await?;
        let rankings = vectors
            .iter()
            .map(|v| self.rank(v, index))
            .collect::<Result<Vec<_>>>()?;
        match self.config.multi_query {
            MultiQueryMode::FusedContext => {
                let fused = reciprocal_rank_fusion(&rankings, RRF_K);
                self.answer_over(question, fused, queries, index).await
            }
            MultiQueryMode::Synthesis => {
                self.synthesize(question, queries, rankings, index).await
            }
        }
    }

    async fn synthesize(
        &self,
        question: &str,
        queries: Vec<String>,
        rankings: Vec<Vec<QueryResult>>,
        index: &TreeIndex,
    ) -> Result<Answer> {
        let fused = fused_scores(&rankings, RRF_K);
        let relevance = |hits: &[QueryResult]| {
            fused
                .iter()
                .find(|(hit, _)| hits.iter().any(|h| h.node_id == hit.node_id))
                .map_or(0.0, |(_, rrf)| *rrf)
        };

        let mut answers: Vec<QueryAnswer> = Vec::new();
        let mut truncated = false;
        for (query, hits) in queries.iter().zip(&rankings) {
            if hits.is_empty() {
                debug!(query = %query, "no relevant context for query");
                continue;
            }
            let context = self.fit_context(query, hits, index)?;
            let prompt = self.prompt.build_prompt(&context.text, query);
            let answer_text = self.complete(&prompt, self.config.answer_max_tokens).await?;
            truncated |= context.truncated;
            answers.push(QueryAnswer {
                query: query.clone(),
                answer_text,
                relevance: relevance(&context.nodes),
                supporting_nodes: context.nodes,
            });
        }
        if answers.is_empty() {
            debug!("no relevant context for any query, skipping completion");
            return Ok(Answer::no_context(queries));
        }
        // Stable: equal relevance keeps query order.
        answers.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        let answer_text = self
            .complete(
                &self.synthesis_prompt(question, &answers)?,
                self.config.answer_max_tokens,
            )
            .await?;
        let supporting_nodes = fused
            .iter()
            .map(|(hit, _)| *hit)
            .filter(|hit| {
                answers
                    .iter()
                    .any(|a| a.supporting_nodes.iter().any(|h| h.node_id == hit.node_id))
            })
            .collect();
        debug!(answers = answers.len(), "synthesized multi-query answer");
        Ok(Answer {
            answer_text,
            supporting_nodes,
            status: AnswerStatus::Answered,
            context_truncated: truncated,
            queries,
            query_answers: answers,
        })
    }

    /// Synthesis prompt with every answer cut to an equal share of the
    /// context window.
    fn synthesis_prompt(&self, question: &str, answers: &[QueryAnswer]) -> Result<String> {
        let headers: Vec<(&str, &str)> = answers.iter().map(|a| (a.query.as_str(), "")).collect();
        let overhead = count_tokens(&prompt::synthesis_prompt(question, &headers));
        let share = self
            .config
            .context_token_limit
            .checked_sub(self.config.answer_max_tokens + overhead)
            .map(|budget| budget / answers.len())
            .filter(|&share| share > 0)
            .ok_or_else(|| Error::Query("no room to synthesize the answers".into()))?;
        let entries: Vec<(&str, &str)> = answers
            .iter()
            .map(|a| (a.query.as_str(), truncate_tokens(&a.answer_text, share)))
            .collect();
        Ok(prompt::synthesis_prompt(question, &entries))
    }

    /// Fit ranked hits into the context budget for `question`.
    ///
    /// Lowest-ranked hits are dropped first. When even the best hit does not
    /// fit, its text is cut to the budget.
    pub fn fit_context(
        &self,
        question: &str,
        hits: &[QueryResult],
        index: &TreeIndex,
    ) -> Result<FittedContext> {
        let overhead = count_tokens(&self.prompt.build_prompt("", question));
        let budget = self
            .config
            .context_token_limit
            .checked_sub(self.config.answer_max_tokens + overhead)
            .filter(|&b| b > 0)
            .ok_or_else(|| Error::Query("question leaves no room for context".into()))?;

        let mut parts: Vec<&str> = Vec::new();
        let mut nodes = Vec::new();
        let mut used = 0usize;
        let mut truncated = false;
        for hit in hits {
            let Some(node) = index.node(hit.node_id) else {
                continue;
            };
            let text = node.text();
            let tokens = count_tokens(text);
            if used + tokens <= budget {
                used += tokens;
                parts.push(text);
                nodes.push(*hit);
            } else if parts.is_empty() {
                parts.push(truncate_tokens(text, budget));
                nodes.push(*hit);
                truncated = true;
                break;
            } else {
                break;
            }
        }

        Ok(FittedContext {
            text: parts.join(CONTEXT_SEPARATOR),
            nodes,
            truncated,
        })
    }

    fn rank(&self, vector: &[f32], index: &TreeIndex) -> Result<Vec<QueryResult>> {
        let mut hits = match self.config.mode {
            RetrievalMode::Collapsed => {
                index.query(vector, LevelFilter::Collapsed, self.config.top_k)?
            }
            RetrievalMode::TreeTraversal => index.traverse(vector, self.config.top_k)?,
        };
        if let Some(min) = self.config.min_similarity {
            hits.retain(|h| h.score >= min);
        }
        Ok(hits)
    }

    async fn answer_over(
        &self,
        question: &str,
        hits: Vec<QueryResult>,
        queries: Vec<String>,
        index: &TreeIndex,
    ) -> Result<Answer> {
        if hits.is_empty() {
            debug!("no relevant context, skipping completion");
            return Ok(Answer::no_context(queries));
        }
        let context = self.fit_context(question, &hits, index)?;
        let prompt = self.prompt.build_prompt(&context.text, question);
        let answer_text = self.complete(&prompt, self.config.answer_max_tokens).await?;
        Ok(Answer {
            answer_text,
            supporting_nodes: context.nodes,
            status: AnswerStatus::Answered,
            context_truncated: context.truncated,
            queries,
            query_answers: Vec::new(),
        })
    }

    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let completer = &self.completer;
        self.policy
            .run("complete", move || async move {
                completer.complete(prompt, max_tokens).await
            })
            .await
            .map_err(|failure| Error::Completion {
                attempts: failure.attempts,
                source: failure.last,
            })
    }
}

fn check_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::Query("question is empty".into()));
    }
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::hierarchy::{Node, NodeId};
    use crate::segment::Chunk;
    use crate::testing::{fast_retry, HashEmbedder, ScriptedCompleter};

    const DIM: usize = 256;

    fn leaf_index(texts: &[&str]) -> TreeIndex {
        let embedder = HashEmbedder::new(DIM);
        let nodes = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let chunk = Chunk {
                    id: i,
                    text: text.to_string(),
                    token_count: count_tokens(text),
                    source_offset: 0,
                    overlap_bytes: 0,
                };
                Node::leaf(NodeId(i as u32), chunk, embedder.vector_for(text))
            })
            .collect();
        TreeIndex::leaf_only(nodes).unwrap()
    }

    fn retriever(completer: Arc<ScriptedCompleter>, config: RetrieverConfig) -> Retriever {
        Retriever::new(
            Embedder::new(Arc::new(HashEmbedder::new(DIM))),
            completer,
            RetrieverConfig {
                retry: fast_retry(),
                ..config
            },
        )
    }

    fn corpus() -> TreeIndex {
        leaf_index(&[
            "apple harvest orchard in autumn",
            "engine torque piston and fuel",
            "river delta tide and silt",
        ])
    }

    #[tokio::test]
    async fn test_answer_uses_best_node_first() {
        let completer = Arc::new(ScriptedCompleter::new(|_, _| Ok("in autumn".into())));
        let r = retriever(completer.clone(), RetrieverConfig::default());
        let answer = r.answer("when is the orchard harvest?", &corpus()).await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.answer_text, "in autumn");
        assert_eq!(answer.supporting_nodes[0].node_id, NodeId(0));
        let prompt = &completer.prompts()[0];
        assert!(prompt.contains("Question: when is the orchard harvest?"));
        assert!(prompt.contains("apple harvest orchard"));
    }

    #[tokio::test]
    async fn test_nothing_relevant_skips_the_model() {
        let completer = Arc::new(ScriptedCompleter::new(|_, _| Ok("unused".into())));
        let r = retriever(
            completer.clone(),
            RetrieverConfig {
                min_similarity: Some(0.99),
                ..RetrieverConfig::default()
            },
        );
        let answer = r.answer("zebra quantum", &corpus()).await.unwrap();
        assert_eq!(answer.status, AnswerStatus::NoRelevantContext);
        assert!(answer.supporting_nodes.is_empty());
        assert_eq!(completer.calls(), 0);
    }

    #[tokio::test]
    async fn test_context_drops_lowest_ranked_first() {
        let index = leaf_index(&["a1 a2 a3 a4 a5", "b1 b2 b3 b4 b5", "c1 c2"]);
        let overhead = count_tokens(&DefaultPromptBuilder.build_prompt("", "what"));
        let r = retriever(
            Arc::new(ScriptedCompleter::extractive()),
            RetrieverConfig {
                context_token_limit: overhead + 10 + 8,
                answer_max_tokens: 10,
                ..RetrieverConfig::default()
            },
        );
        let hits: Vec<QueryResult> = [0u32, 1, 2]
            .iter()
            .map(|&id| QueryResult {
                node_id: NodeId(id),
                score: 1.0 - id as f32 * 0.1,
            })
            .collect();
        let fitted = r.fit_context("what", &hits, &index).unwrap();
        assert_eq!(fitted.nodes.len(), 1);
        assert_eq!(fitted.text, "a1 a2 a3 a4 a5");
        assert!(!fitted.truncated);
    }

    #[tokio::test]
    async fn test_oversized_top_node_is_truncated() {
        let long: String = (0..30).map(|i| format!("w{i} ")).collect();
        let index = leaf_index(&[long.trim()]);
        let overhead = count_tokens(&DefaultPromptBuilder.build_prompt("", "what"));
        let r = retriever(
            Arc::new(ScriptedCompleter::extractive()),
            RetrieverConfig {
                context_token_limit: overhead + 10 + 8,
                answer_max_tokens: 10,
                ..RetrieverConfig::default()
            },
        );
        let hits = vec![QueryResult {
            node_id: NodeId(0),
            score: 0.9,
        }];
        let fitted = r.fit_context("what", &hits, &index).unwrap();
        assert!(fitted.truncated);
        assert_eq!(count_tokens(&fitted.text), 8);
    }

    #[tokio::test]
    async fn test_no_room_for_context_is_a_query_error() {
        let r = retriever(
            Arc::new(ScriptedCompleter::extractive()),
            RetrieverConfig {
                context_token_limit: 16,
                answer_max_tokens: 10,
                ..RetrieverConfig::default()
            },
        );
        assert!(matches!(
            r.fit_context("what", &[], &corpus()),
            Err(Error::Query(_))
        ));
    }

    #[tokio::test]
    async fn test_related_queries_widen_retrieval() {
        let completer = Arc::new(ScriptedCompleter::new(|prompt, _| {
            if prompt.contains("JSON array") {
                Ok(r#"["apple harvest", {"query": "engine torque"}]"#.into())
            } else {
                Ok("combined".into())
            }
        }));
        let r = retriever(
            completer.clone(),
            RetrieverConfig {
                top_k: 1,
                ..RetrieverConfig::default()
            },
        );
        let answer = r
            .answer_with_related_queries("orchard", &corpus())
            .await
            .unwrap();
        assert_eq!(answer.queries, vec!["orchard", "apple harvest", "engine torque"]);
        let ids: Vec<NodeId> = answer.supporting_nodes.iter().map(|h| h.node_id).collect();
        assert_eq!(ids, vec![NodeId(0), NodeId(1)]);
        assert_eq!(answer.answer_text, "combined");
        assert_eq!(completer.calls(), 2);
    }

    /// Proposes two related queries, answers each query with a note naming
    /// it, and merges answers into a fixed reply.
    fn synthesizing_completer() -> ScriptedCompleter {
        ScriptedCompleter::new(|prompt, _| {
            if prompt.contains("JSON array") {
                Ok(r#"["engine torque", "delta silt"]"#.into())
            } else if let Some(rest) = prompt.split("Question: ").nth(1) {
                let query = rest.split("\n\n").next().unwrap_or_default();
                Ok(format!("notes on {query}"))
            } else {
                Ok("merged".into())
            }
        })
    }

    #[tokio::test]
    async fn test_synthesis_merges_answers_in_fused_rank_order() {
        let completer = Arc::new(synthesizing_completer());
        let r = retriever(
            completer.clone(),
            RetrieverConfig {
                top_k: 1,
                multi_query: MultiQueryMode::Synthesis,
                ..RetrieverConfig::default()
            },
        );
        let answer = r
            .answer_with_related_queries("river tide", &corpus())
            .await
            .unwrap();

        assert_eq!(answer.answer_text, "merged");
        assert_eq!(answer.status, AnswerStatus::Answered);
        // Two queries land on the river leaf, so it outranks the engine leaf.
        let order: Vec<&str> = answer.query_answers.iter().map(|a| a.query.as_str()).collect();
        assert_eq!(order, vec!["river tide", "delta silt", "engine torque"]);
        assert!(answer
            .query_answers
            .windows(2)
            .all(|w| w[0].relevance >= w[1].relevance));
        let ids: Vec<NodeId> = answer.supporting_nodes.iter().map(|h| h.node_id).collect();
        assert_eq!(ids, vec![NodeId(2), NodeId(1)]);

        // Related queries, three per-query answers, one synthesis.
        let prompts = completer.prompts();
        assert_eq!(prompts.len(), 5);
        let synthesis = prompts.last().unwrap();
        assert!(synthesis.contains("'river tide'"));
        let positions: Vec<usize> = answer
            .query_answers
            .iter()
            .map(|a| synthesis.find(&a.answer_text).expect("answer in prompt"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{synthesis}");
    }

    #[tokio::test]
    async fn test_synthesis_without_context_skips_the_model() {
        let completer = Arc::new(synthesizing_completer());
        let r = retriever(
            completer.clone(),
            RetrieverConfig {
                min_similarity: Some(0.99),
                multi_query: MultiQueryMode::Synthesis,
                ..RetrieverConfig::default()
            },
        );
        let answer = r
            .answer_with_related_queries("zebra quantum", &corpus())
            .await
            .unwrap();
        assert_eq!(answer.status, AnswerStatus::NoRelevantContext);
        assert!(answer.query_answers.is_empty());
        // Only the related-query request reached the model.
        assert_eq!(completer.calls(), 1);
    }

    #[tokio::test]
    async fn test_fused_mode_keeps_query_answers_empty() {
        let r = retriever(
            Arc::new(synthesizing_completer()),
            RetrieverConfig::default(),
        );
        let answer = r
            .answer_with_related_queries("river tide", &corpus())
            .await
            .unwrap();
        assert!(answer.query_answers.is_empty());
        assert!(answer.answer_text.starts_with("notes on"));
    }

    #[tokio::test]
    async fn test_unparseable_related_queries_fall_back() {
        let completer = Arc::new(ScriptedCompleter::new(|prompt, _| {
            if prompt.contains("JSON array") {
                Ok("I cannot do that".into())
            } else {
                Ok("answer".into())
            }
        }));
        let r = retriever(completer, RetrieverConfig::default());
        let answer = r
            .answer_with_related_queries("orchard", &corpus())
            .await
            .unwrap();
        assert_eq!(answer.queries, vec!["orchard"]);
        assert_eq!(answer.status, AnswerStatus::Answered);
    }

    #[tokio::test]
    async fn test_completion_outage_is_reported() {
        let completer = Arc::new(ScriptedCompleter::failing(ModelError::Transient(
            "down".into(),
        )));
        let r = retriever(completer, RetrieverConfig::default());
        let err = r.answer("orchard", &corpus()).await.unwrap_err();
        assert!(matches!(err, Error::Completion { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let r = retriever(
            Arc::new(ScriptedCompleter::extractive()),
            RetrieverConfig::default(),
        );
        assert!(matches!(r.answer("   ", &corpus()).await, Err(Error::Query(_))));
    }
}
