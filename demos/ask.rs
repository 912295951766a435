//! Index a text file with a local Ollama server and answer one question.
//!
//! Usage:
//!   cargo run --example ask --features ollama -- notes.txt "What changed in Q3?"
//!   RUST_LOG=docraptor=debug cargo run --example ask --features ollama -- \
//!       --config docraptor.toml --related report.txt "Who is the CFO?"

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docraptor::ollama::DEFAULT_BASE_URL;
use docraptor::{
    AnswerStatus, Cancellation, DocumentIndexer, Error, IndexedDocument, MultiQueryMode, OllamaClient,
    RaptorConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ask", version, about = "Answer a question about a text file")]
struct Cli {
    /// Plain-text document to index
    file: PathBuf,

    /// Question to answer
    question: String,

    /// Ollama server address
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Embedding model
    #[arg(long, default_value = "nomic-embed-text")]
    embed_model: String,

    /// Generation model (summaries and answers)
    #[arg(long, default_value = "llama3.1")]
    generate_model: String,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Widen retrieval with model-proposed related queries
    #[arg(long)]
    related: bool,

    /// Answer each related query separately and merge the answers
    #[arg(long, requires = "related")]
    synthesize: bool,

    /// Save the built tree as JSON
    #[arg(long)]
    save_tree: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docraptor=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RaptorConfig::from_file(path)?,
        None => RaptorConfig::default(),
    };
    if cli.synthesize {
        config.retriever.multi_query = MultiQueryMode::Synthesis;
    }
    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;

    let client = Arc::new(OllamaClient::new(
        &cli.base_url,
        &cli.embed_model,
        &cli.generate_model,
    ));
    let installed = client.list_models().await?;
    tracing::info!(models = ?installed, "ollama reachable");

    let indexer = DocumentIndexer::new(client.clone(), client, config)?;

    // Ctrl-C stops the build between units of work.
    let cancel = Cancellation::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let doc = match indexer.index_text(&text, &cancel).await {
        Ok(doc) => doc,
        Err(Error::Capacity {
            levels, fallback, ..
        }) => {
            eprintln!(
                "could not fully index this document within {levels} level(s); \
                 answering from chunks only"
            );
            IndexedDocument {
                index: Arc::new(*fallback),
                report: Default::default(),
            }
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "indexed {} nodes over {} level(s), {} degraded summaries",
        doc.index.len(),
        doc.report.levels(),
        doc.report.degraded.len()
    );

    if let (Some(path), Some(tree)) = (&cli.save_tree, doc.index.tree()) {
        tree.save(path)?;
    }

    let answer = if cli.related {
        indexer.answer_with_related_queries(&cli.question, &doc.index).await?
    } else {
        indexer.answer(&cli.question, &doc.index).await?
    };

    match answer.status {
        AnswerStatus::NoRelevantContext => println!("No relevant context found."),
        AnswerStatus::Answered => {
            println!("{}\n", answer.answer_text.trim());
            for (rank, part) in answer.query_answers.iter().enumerate() {
                println!("  {}. {}: {}", rank + 1, part.query, part.answer_text.trim());
            }
            for hit in &answer.supporting_nodes {
                if let Some(node) = doc.index.node(hit.node_id) {
                    println!("  [{:.3}] {node}", hit.score);
                }
            }
            if answer.context_truncated {
                println!("  (context truncated to fit the model window)");
            }
        }
    }
    Ok(())
}
