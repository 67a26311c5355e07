use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for document chunking behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target token budget per chunk (hard limit except for indivisible units)
    pub chunk_size: usize,

    /// Tokens shared between consecutive chunks, must stay below `chunk_size`
    pub chunk_overlap: usize,

    /// Chunking strategy to use
    pub strategy: ChunkingStrategy,

    /// Adjacent segments smaller than this are merged when the result still fits
    pub min_segment_tokens: usize,

    /// Hard-cut words that alone exceed the budget at grapheme boundaries
    pub split_oversized_words: bool,

    /// Coarse characters-per-token ratio used by fixed-size cutting and estimation
    pub chars_per_token: f32,

    /// Minimum similarity for two adjacent sentences to share a semantic group
    pub similarity_threshold: f32,

    /// Documents with at least this many characters use fixed-size chunking under `Adaptive`
    pub adaptive_fixed_size_threshold: usize,

    /// Split independent top-level sections on the rayon pool
    pub parallel_sections: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            strategy: ChunkingStrategy::Recursive,
            min_segment_tokens: 0,
            split_oversized_words: false,
            chars_per_token: 4.0,
            similarity_threshold: 0.5,
            adaptive_fixed_size_threshold: 1_000_000,
            parallel_sections: true,
        }
    }
}

impl ChunkingConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            strategy: ChunkingStrategy::Hierarchical,
            ..Default::default()
        }
    }

    /// Create config optimized for LLM context (larger, comprehensive chunks)
    pub fn for_llm_context() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            ..Default::default()
        }
    }

    /// Create config optimized for speed (simpler chunking)
    pub fn for_speed() -> Self {
        Self {
            strategy: ChunkingStrategy::FixedSize,
            chunk_overlap: 0,
            parallel_sections: false,
            ..Default::default()
        }
    }

    /// Token budget available to a segment once room for the overlap prefix is reserved.
    #[must_use]
    pub const fn segment_budget(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::invalid_config("chunk_size must be > 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if !self.chars_per_token.is_finite() || self.chars_per_token <= 0.0 {
            return Err(ChunkerError::invalid_config(format!(
                "chars_per_token must be a positive number, got {}",
                self.chars_per_token
            )));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ChunkerError::invalid_config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }

        if self.min_segment_tokens > self.segment_budget() {
            return Err(ChunkerError::invalid_config(format!(
                "min_segment_tokens ({}) cannot exceed chunk_size - chunk_overlap ({})",
                self.min_segment_tokens,
                self.segment_budget()
            )));
        }

        Ok(())
    }
}

/// Strategy for deciding chunk boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Raw character windows sized from `chars_per_token`, re-split when over budget.
    /// Fastest, ignores structure
    FixedSize,

    /// Paragraph → sentence → word (→ grapheme) splitting over the whole text
    Recursive,

    /// Recursive splitting inside top-level sections supplied by a structure signal
    Hierarchical,

    /// Sentences grouped by an injected similarity signal before token bounding
    Semantic,

    /// FixedSize for very large documents, Recursive otherwise
    Adaptive,

    /// Same path as `Recursive`
    TokenBased,
}

impl ChunkingStrategy {
    pub const ALL: [ChunkingStrategy; 6] = [
        ChunkingStrategy::FixedSize,
        ChunkingStrategy::Recursive,
        ChunkingStrategy::Hierarchical,
        ChunkingStrategy::Semantic,
        ChunkingStrategy::Adaptive,
        ChunkingStrategy::TokenBased,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedSize => "fixed_size",
            Self::Recursive => "recursive",
            Self::Hierarchical => "hierarchical",
            Self::Semantic => "semantic",
            Self::Adaptive => "adaptive",
            Self::TokenBased => "token_based",
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = ChunkerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ChunkerError::invalid_config(format!("unknown strategy '{s}'")))
    }
}
