//! Chunking strategies for splitting source documents into retrievable units.
//!
//! Two strategies: fixed-size windows with overlap (word-boundary aware) and
//! paragraph splitting at blank lines. Both are pure functions of their
//! configuration and input: chunking the same text twice yields chunks with
//! identical text and metadata (ids are freshly generated).

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::types::{Chunk, Metadata};

pub const STRATEGY_FIXED_SIZE: &str = "fixed_size";
pub const STRATEGY_SEMANTIC: &str = "semantic";

pub trait Chunker: Send + Sync {
    /// Split text into ordered chunks. Empty or whitespace-only input
    /// yields an empty Vec, not an error.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Collapse every whitespace run to a single space and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits normalized text into windows of `chunk_size` characters. A window
/// not ending at end-of-text is cut back to the nearest space strictly after
/// the window start so words are not split; with no such space the raw
/// character boundary is used. The next window starts `overlap` characters
/// before the previous cut, clamped so the loop always advances.
///
/// Positions are character offsets into the normalized text, so multi-byte
/// scalars are never split.
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = normalized.chars().collect();

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        let mut start = 0usize;
        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());
            if end < chars.len() {
                // Back off to the last space strictly after the window start.
                if let Some(rel) = chars[start..end].iter().rposition(|c| *c == ' ') {
                    if rel > 0 {
                        end = start + rel;
                    }
                }
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                let mut metadata = Metadata::new();
                metadata.insert("chunk_index".to_string(), json!(chunk_index));
                metadata.insert("chunk_type".to_string(), json!(STRATEGY_FIXED_SIZE));
                metadata.insert("start_pos".to_string(), json!(start));
                metadata.insert("end_pos".to_string(), json!(end));
                metadata.insert("chunk_size".to_string(), json!(trimmed.chars().count()));
                chunks.push(Chunk::new(trimmed.to_string(), metadata));
                chunk_index += 1;
            }

            // Overlap backoff, clamped to keep forward progress when a short
            // window would otherwise re-cover the same span.
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

/// Splits on blank-line boundaries, one chunk per paragraph. Paragraphs
/// shorter than `min_chunk_size` characters after normalization are dropped.
pub struct ParagraphChunker {
    min_chunk_size: usize,
    boundary: Regex,
}

impl ParagraphChunker {
    pub fn new(min_chunk_size: usize) -> Result<Self> {
        if min_chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "min_chunk_size must be greater than 0".to_string(),
            ));
        }
        let boundary = Regex::new(r"\n\s*\n")
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        Ok(Self {
            min_chunk_size,
            boundary,
        })
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        for paragraph in self.boundary.split(trimmed) {
            let paragraph = normalize_whitespace(paragraph);
            if paragraph.chars().count() < self.min_chunk_size {
                continue;
            }
            let mut metadata = Metadata::new();
            metadata.insert("chunk_index".to_string(), json!(chunk_index));
            metadata.insert("chunk_type".to_string(), json!(STRATEGY_SEMANTIC));
            metadata.insert("paragraph".to_string(), json!(true));
            metadata.insert("chunk_size".to_string(), json!(paragraph.chars().count()));
            chunks.push(Chunk::new(paragraph, metadata));
            chunk_index += 1;
        }
        chunks
    }
}

/// Per-strategy construction parameters with the stock defaults. Each
/// strategy reads only the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
            min_chunk_size: 50,
        }
    }
}

/// Resolve a strategy name (case-insensitive, closed registry) to a
/// configured chunker.
pub fn chunker_for_strategy(strategy: &str, params: &ChunkerParams) -> Result<Box<dyn Chunker>> {
    match strategy.to_ascii_lowercase().as_str() {
        STRATEGY_FIXED_SIZE => Ok(Box::new(FixedSizeChunker::new(
            params.chunk_size,
            params.overlap,
        )?)),
        STRATEGY_SEMANTIC => Ok(Box::new(ParagraphChunker::new(params.min_chunk_size)?)),
        other => Err(Error::UnknownStrategy(other.to_string())),
    }
}
