//! Splitting extracted document text into bounded leaf chunks.
//!
//! Chunks are exact byte slices of the input. Splits land on sentence and
//! line boundaries where possible; a single sentence longer than the budget
//! is cut at token boundaries instead.
//!
//! ```text
//! input:   [ The cat sat. | It was warm. | Then it left. ]
//! chunk 0: [ The cat sat. It was warm. ]
//! chunk 1:               [ warm. | Then it left. ]
//!                          ^^^^^ overlap (duplicated from chunk 0)
//! ```
//!
//! Dropping each chunk's overlap prefix and concatenating the rest gives the
//! input back byte for byte.
//!
//! A token is a maximal run of non-whitespace characters, which is close
//! enough to a model tokenizer for budgeting purposes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A leaf chunk of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the document (0-based).
    pub id: usize,
    /// Chunk text, including the overlap prefix.
    pub text: String,
    /// Tokens in `text`, including the overlap prefix.
    pub token_count: usize,
    /// Byte offset of `text` in the source document.
    pub source_offset: usize,
    /// Length in bytes of the prefix duplicated from the previous chunk.
    pub overlap_bytes: usize,
}

impl Chunk {
    /// Text contributed by this chunk alone (overlap removed).
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap_bytes..]
    }

    /// Byte range of the fresh text in the source document.
    pub fn fresh_range(&self) -> std::ops::Range<usize> {
        let start = self.source_offset + self.overlap_bytes;
        start..self.source_offset + self.text.len()
    }
}

/// Segmenter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Upper bound on tokens per chunk, overlap included.
    pub max_tokens: usize,
    /// Tokens repeated from the end of the previous chunk.
    pub overlap_tokens: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            overlap_tokens: 30,
        }
    }
}

/// Splits text into overlapping chunks.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    /// Create a segmenter from settings.
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Set the per-chunk token bound.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the overlap.
    pub fn with_overlap_tokens(mut self, overlap_tokens: usize) -> Self {
        self.config.overlap_tokens = overlap_tokens;
        self
    }

    /// Current settings.
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment one document.
    pub fn segment(&self, text: &str) -> Result<Vec<Chunk>> {
        segment(text, self.config.max_tokens, self.config.overlap_tokens)
    }

    /// Segment the ordered output of a text extractor.
    ///
    /// Segments are joined with a paragraph break; blank segments are skipped.
    pub fn segment_segments<S: AsRef<str>>(&self, segments: &[S]) -> Result<Vec<Chunk>> {
        let joined = join_segments(segments);
        self.segment(&joined)
    }
}

/// Join extractor segments into one document.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split `text` into chunks of at most `max_tokens` tokens, each starting
/// with the last `overlap_tokens` tokens of its predecessor.
pub fn segment(text: &str, max_tokens: usize, overlap_tokens: usize) -> Result<Vec<Chunk>> {
    if max_tokens == 0 {
        return Err(Error::InvalidParameter {
            name: "max_tokens",
            message: "must be > 0",
        });
    }
    if overlap_tokens >= max_tokens {
        return Err(Error::InvalidParameter {
            name: "overlap_tokens",
            message: "must be smaller than max_tokens",
        });
    }

    let tokens = token_spans(text);
    if tokens.is_empty() {
        return Err(Error::EmptyInput);
    }

    let budget = max_tokens - overlap_tokens;
    let units = sentence_units(text, &tokens, budget);

    // Greedy packing of whole units into token ranges.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;
    let mut end = 0usize;
    for (a, b) in units {
        if b - start > budget && end > start {
            ranges.push((start, end));
            start = a;
        }
        end = b;
    }
    ranges.push((start, end));

    let mut chunks = Vec::with_capacity(ranges.len());
    for (i, &(s, e)) in ranges.iter().enumerate() {
        let body_start = if i == 0 { 0 } else { tokens[s].0 };
        let body_end = match ranges.get(i + 1) {
            Some(&(next, _)) => tokens[next].0,
            None => text.len(),
        };

        let overlap = if i == 0 {
            0
        } else {
            let prev_start = ranges[i - 1].0;
            overlap_tokens.min(s - prev_start)
        };
        let text_start = if overlap == 0 {
            body_start
        } else {
            tokens[s - overlap].0
        };

        chunks.push(Chunk {
            id: i,
            text: text[text_start..body_end].to_string(),
            token_count: overlap + (e - s),
            source_offset: text_start,
            overlap_bytes: body_start - text_start,
        });
    }

    Ok(chunks)
}

/// Count whitespace-delimited tokens.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Longest prefix of `text` holding at most `max_tokens` tokens.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> &str {
    if max_tokens == 0 {
        return "";
    }
    match token_spans(text).get(max_tokens - 1) {
        Some(&(_, end)) => &text[..end],
        None => text,
    }
}

/// Byte spans of non-whitespace runs.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Group tokens into sentence/line units, cutting any unit above `budget`.
fn sentence_units(text: &str, tokens: &[(usize, usize)], budget: usize) -> Vec<(usize, usize)> {
    let mut units = Vec::new();
    let mut unit_start = 0usize;

    for i in 0..tokens.len() {
        let (s, e) = tokens[i];
        let ends_sentence = is_sentence_end(&text[s..e]);
        let ends_line = tokens
            .get(i + 1)
            .map(|&(next, _)| text[e..next].contains('\n'))
            .unwrap_or(true);

        if ends_sentence || ends_line {
            push_bounded(&mut units, unit_start, i + 1, budget);
            unit_start = i + 1;
        }
    }
    if unit_start < tokens.len() {
        push_bounded(&mut units, unit_start, tokens.len(), budget);
    }
    units
}

fn push_bounded(units: &mut Vec<(usize, usize)>, start: usize, end: usize, budget: usize) {
    let mut s = start;
    while end - s > budget {
        units.push((s, s + budget));
        s += budget;
    }
    if s < end {
        units.push((s, end));
    }
}

fn is_sentence_end(token: &str) -> bool {
    let trimmed = token.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}']);
    trimmed.ends_with(['.', '!', '?', '\u{3002}'])
}
