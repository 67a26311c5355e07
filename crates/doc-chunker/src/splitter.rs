//! Token-budgeted hierarchical splitting.
//!
//! A span that exceeds the budget is cut at the highest level of the
//! hierarchy that yields more than one piece: paragraph, sentence, word and,
//! when enabled, grapheme. Consecutive pieces are greedily packed while the
//! token count of the merged span fits; pieces that are too large on their
//! own are pushed back on the work stack one level down.
//!
//! Separators stay attached to the end of the piece they close, so the
//! emitted spans tile the input without gaps.

use crate::error::Result;
use crate::token_counter::SpanCounter;
use crate::types::Span;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid paragraph regex"));
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));
pub(crate) static WORD_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid word regex"));

/// Level of the separator hierarchy, from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SplitLevel {
    Paragraph,
    Sentence,
    Word,
    Grapheme,
}

impl SplitLevel {
    fn separator(self) -> Option<&'static Regex> {
        match self {
            SplitLevel::Paragraph => Some(&PARAGRAPH_BREAK),
            SplitLevel::Sentence => Some(&SENTENCE_BREAK),
            SplitLevel::Word => Some(&WORD_BREAK),
            SplitLevel::Grapheme => None,
        }
    }
}

enum Work {
    Emit(Span),
    Split(Span, SplitLevel),
}

/// Splits spans of one document under a token budget
#[derive(Clone, Copy)]
pub struct HierarchicalSplitter<'a> {
    tokens: SpanCounter<'a>,
    split_oversized_words: bool,
}

impl<'a> HierarchicalSplitter<'a> {
    pub fn new(tokens: SpanCounter<'a>, split_oversized_words: bool) -> Self {
        Self {
            tokens,
            split_oversized_words,
        }
    }

    #[must_use]
    pub const fn tokens(&self) -> &SpanCounter<'a> {
        &self.tokens
    }

    /// Split `span` into ordered, contiguous spans of at most `budget` tokens.
    ///
    /// Only indivisible units may exceed the budget: a word when grapheme
    /// cutting is disabled, or a single grapheme.
    pub fn split(&self, span: Span, budget: usize) -> Result<Vec<Span>> {
        self.split_from(span, budget, SplitLevel::Paragraph)
    }

    /// Same as [`split`](Self::split) but starting lower in the hierarchy.
    pub fn split_from(&self, span: Span, budget: usize, top: SplitLevel) -> Result<Vec<Span>> {
        if span.is_empty() {
            return Ok(Vec::new());
        }
        let budget = budget.max(1);

        let mut out = Vec::new();
        let mut stack = vec![Work::Split(span, top)];

        while let Some(work) = stack.pop() {
            let (span, level) = match work {
                Work::Emit(span) => {
                    out.push(span);
                    continue;
                }
                Work::Split(span, level) => (span, level),
            };

            if self.tokens.count(span)? <= budget {
                out.push(span);
                continue;
            }

            let next = if level == SplitLevel::Grapheme {
                self.pack_graphemes(span, budget)?
                    .into_iter()
                    .map(Work::Emit)
                    .collect()
            } else {
                let pieces = self.pieces(span, level);
                if pieces.len() > 1 {
                    self.pack(&pieces, budget, level)?
                } else {
                    match self.descend(level) {
                        Some(lower) => vec![Work::Split(span, lower)],
                        None => vec![Work::Emit(span)],
                    }
                }
            };

            // Reverse so the first piece is popped first.
            stack.extend(next.into_iter().rev());
        }

        Ok(out)
    }

    /// Sentence-level pieces of `span`, paragraph breaks included.
    pub fn sentences(&self, span: Span) -> Vec<Span> {
        self.pieces(span, SplitLevel::Paragraph)
            .into_iter()
            .flat_map(|paragraph| self.pieces(paragraph, SplitLevel::Sentence))
            .collect()
    }

    fn descend(&self, level: SplitLevel) -> Option<SplitLevel> {
        match level {
            SplitLevel::Paragraph => Some(SplitLevel::Sentence),
            SplitLevel::Sentence => Some(SplitLevel::Word),
            SplitLevel::Word if self.split_oversized_words => Some(SplitLevel::Grapheme),
            SplitLevel::Word | SplitLevel::Grapheme => None,
        }
    }

    /// Cut `span` after every separator match at `level`.
    ///
    /// Whitespace-only leading pieces are folded into the following piece.
    fn pieces(&self, span: Span, level: SplitLevel) -> Vec<Span> {
        let Some(separator) = level.separator() else {
            return vec![span];
        };
        let text = self.tokens.text();
        let slice = span.slice(text);

        let mut pieces = Vec::new();
        let mut start = span.start;
        for m in separator.find_iter(slice) {
            let cut = span.start + m.end();
            if cut >= span.end {
                break;
            }
            if text[start..cut].trim().is_empty() {
                continue;
            }
            pieces.push(Span::new(start, cut));
            start = cut;
        }
        pieces.push(Span::new(start, span.end));
        pieces
    }

    /// Greedily merge consecutive pieces while the merged span fits the budget.
    fn pack(&self, pieces: &[Span], budget: usize, level: SplitLevel) -> Result<Vec<Work>> {
        let mut out = Vec::new();
        let mut current: Option<Span> = None;

        for &piece in pieces {
            if self.tokens.count(piece)? > budget {
                if let Some(span) = current.take() {
                    out.push(Work::Emit(span));
                }
                out.push(match self.descend(level) {
                    Some(lower) => Work::Split(piece, lower),
                    None => Work::Emit(piece),
                });
                continue;
            }

            current = match current {
                None => Some(piece),
                Some(span) => {
                    let merged = span.extend_to(piece);
                    if self.tokens.count(merged)? <= budget {
                        Some(merged)
                    } else {
                        out.push(Work::Emit(span));
                        Some(piece)
                    }
                }
            };
        }

        if let Some(span) = current {
            out.push(Work::Emit(span));
        }
        Ok(out)
    }

    /// Hard cut at grapheme boundaries, taking the longest fitting prefix each
    /// time (at least one grapheme).
    fn pack_graphemes(&self, span: Span, budget: usize) -> Result<Vec<Span>> {
        let mut bounds: Vec<usize> = span
            .slice(self.tokens.text())
            .grapheme_indices(true)
            .map(|(offset, _)| span.start + offset)
            .collect();
        bounds.push(span.end);

        let mut out = Vec::new();
        let mut from = 0;
        while from + 1 < bounds.len() {
            let (mut lo, mut hi) = (from + 1, bounds.len() - 1);
            let mut best = from + 1;
            while lo <= hi {
                let mid = (lo + hi) / 2;
                if self.tokens.count(Span::new(bounds[from], bounds[mid]))? <= budget {
                    best = mid;
                    lo = mid + 1;
                } else {
                    hi = mid - 1;
                }
            }
            out.push(Span::new(bounds[from], bounds[best]));
            from = best;
        }
        Ok(out)
    }
}

/// Merge adjacent segments when either is below `min_tokens` and the merged
/// span still fits `budget`.
pub fn merge_small_segments(
    tokens: &SpanCounter<'_>,
    segments: Vec<Span>,
    min_tokens: usize,
    budget: usize,
) -> Result<Vec<Span>> {
    if min_tokens == 0 || segments.len() < 2 {
        return Ok(segments);
    }

    let mut out: Vec<(Span, usize)> = Vec::with_capacity(segments.len());
    for segment in segments {
        let segment_tokens = tokens.count(segment)?;
        if let Some((prev, prev_tokens)) = out.last_mut() {
            if *prev_tokens < min_tokens || segment_tokens < min_tokens {
                let merged = prev.extend_to(segment);
                let merged_tokens = tokens.count(merged)?;
                if merged_tokens <= budget {
                    *prev = merged;
                    *prev_tokens = merged_tokens;
                    continue;
                }
            }
        }
        out.push((segment, segment_tokens));
    }

    Ok(out.into_iter().map(|(span, _)| span).collect())
}
