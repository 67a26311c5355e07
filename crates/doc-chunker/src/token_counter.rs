//! Token counting capability and the adapters shipped with the crate.
//!
//! The pipeline never hardcodes a tokenizer: callers inject a [`TokenCounter`]
//! when building the orchestrator. [`HuggingFaceCounter`] covers real
//! sub-word tokenizers; [`CharRatioEstimator`] is the explicitly requested
//! degraded mode used when no tokenizer is available.

use crate::error::{ChunkerError, Result};
use crate::types::Span;
use std::path::Path;
use thiserror::Error;
use tokenizers::Tokenizer;

/// Failure reported by a token counter adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TokenizerError {
    message: String,
}

impl TokenizerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Counts tokens for a piece of text.
///
/// Implementations must be deterministic and side-effect free.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> std::result::Result<usize, TokenizerError>;

    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Whether counts are approximations rather than tokenizer output
    fn is_estimate(&self) -> bool {
        false
    }
}

/// Token counter backed by a HuggingFace `tokenizers` model
pub struct HuggingFaceCounter {
    tokenizer: Tokenizer,
    add_special_tokens: bool,
}

impl HuggingFaceCounter {
    /// Wrap an already loaded tokenizer. Padding and truncation are disabled so
    /// counts reflect the full text.
    pub fn new(mut tokenizer: Tokenizer) -> std::result::Result<Self, TokenizerError> {
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| TokenizerError::new(format!("Tokenizer truncation reset failed: {e}")))?;
        Ok(Self {
            tokenizer,
            add_special_tokens: false,
        })
    }

    /// Load a `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, TokenizerError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            TokenizerError::new(format!("Tokenizer load failed ({}): {e}", path.display()))
        })?;
        Self::new(tokenizer)
    }

    /// Builder: count special tokens (BOS/EOS, CLS/SEP) as part of every text
    #[must_use]
    pub const fn with_special_tokens(mut self, add: bool) -> Self {
        self.add_special_tokens = add;
        self
    }
}

impl TokenCounter for HuggingFaceCounter {
    fn count_tokens(&self, text: &str) -> std::result::Result<usize, TokenizerError> {
        self.tokenizer
            .encode(text, self.add_special_tokens)
            .map(|encoding| encoding.len())
            .map_err(|e| TokenizerError::new(format!("Tokenization failed: {e}")))
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

/// Emergency estimator: `ceil(chars / chars_per_token)`.
///
/// Never returns 0 for non-empty text, so grapheme-level splitting always
/// makes progress.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f32,
}

impl CharRatioEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: f32 = 4.0;

    #[must_use]
    pub fn new(chars_per_token: f32) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            Self::DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    #[must_use]
    pub const fn chars_per_token(&self) -> f32 {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenCounter for CharRatioEstimator {
    fn count_tokens(&self, text: &str) -> std::result::Result<usize, TokenizerError> {
        let chars = text.chars().count();
        if chars == 0 {
            return Ok(0);
        }
        let estimate = (chars as f64 / f64::from(self.chars_per_token)).ceil() as usize;
        Ok(estimate.max(1))
    }

    fn name(&self) -> &str {
        "char-ratio-estimate"
    }

    fn is_estimate(&self) -> bool {
        true
    }
}

/// Counts tokens for spans of one document and turns adapter failures into
/// [`ChunkerError::Tokenization`] with the offending byte range.
#[derive(Clone, Copy)]
pub struct SpanCounter<'a> {
    text: &'a str,
    counter: &'a dyn TokenCounter,
}

impl<'a> SpanCounter<'a> {
    pub fn new(text: &'a str, counter: &'a dyn TokenCounter) -> Self {
        Self { text, counter }
    }

    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    #[must_use]
    pub fn is_estimate(&self) -> bool {
        self.counter.is_estimate()
    }

    pub fn count(&self, span: Span) -> Result<usize> {
        if span.is_empty() {
            return Ok(0);
        }
        self.counter
            .count_tokens(span.slice(self.text))
            .map_err(|err| self.localize(span, &err))
    }

    /// Narrow a failing span down to the smallest failing sub-range.
    ///
    /// Assumes failures are monotone: any range containing a failing range
    /// fails too. Both ends are found by binary search over char boundaries.
    fn localize(&self, span: Span, err: &TokenizerError) -> ChunkerError {
        let fails = |start: usize, end: usize| {
            self.counter
                .count_tokens(&self.text[start..end])
                .is_err()
        };

        let mut bounds: Vec<usize> = span
            .slice(self.text)
            .char_indices()
            .map(|(offset, _)| span.start + offset)
            .collect();
        bounds.push(span.end);

        // Largest start that still fails with the full end.
        let (mut lo, mut hi) = (0, bounds.len() - 2);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if fails(bounds[mid], span.end) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        let start_idx = lo;

        // Smallest end that still fails from that start.
        let (mut lo, mut hi) = (start_idx + 1, bounds.len() - 1);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if fails(bounds[start_idx], bounds[mid]) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        log::debug!(
            "{} failed on bytes {}..{} (narrowed from {}..{})",
            self.counter.name(),
            bounds[start_idx],
            bounds[hi],
            span.start,
            span.end
        );
        ChunkerError::tokenization(bounds[start_idx], bounds[hi], err.message())
    }
}
