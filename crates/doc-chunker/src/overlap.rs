use crate::error::Result;
use crate::splitter::{HierarchicalSplitter, WORD_BREAK};
use crate::types::{ChunkCandidate, Span};
use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

/// Prefixes every segment after the first with the tail of the previous
/// finalized chunk so that consecutive chunks share up to `overlap` tokens.
/// Segments starting a section get no prefix.
pub struct OverlapWindower<'a> {
    splitter: HierarchicalSplitter<'a>,
    chunk_size: usize,
    overlap: usize,
    section_starts: &'a [usize],
}

impl<'a> OverlapWindower<'a> {
    pub fn new(splitter: HierarchicalSplitter<'a>, chunk_size: usize, overlap: usize) -> Self {
        Self {
            splitter,
            chunk_size,
            overlap,
            section_starts: &[],
        }
    }

    /// Sorted offsets that overlap must not reach back across
    #[must_use]
    pub fn with_section_starts(mut self, section_starts: &'a [usize]) -> Self {
        self.section_starts = section_starts;
        self
    }

    fn starts_section(&self, segment: Span) -> bool {
        self.section_starts.binary_search(&segment.start).is_ok()
    }

    /// Turn contiguous segments into chunk candidates.
    ///
    /// A segment that no longer fits once its prefix is added is re-split
    /// smaller; when it is an indivisible unit the prefix shrinks instead.
    pub fn apply(&self, segments: Vec<Span>) -> Result<Vec<ChunkCandidate>> {
        let tokens = self.splitter.tokens();

        if self.overlap == 0 {
            return segments
                .into_iter()
                .map(|span| {
                    Ok(ChunkCandidate {
                        span,
                        overlap_len: 0,
                        token_count: tokens.count(span)?,
                    })
                })
                .collect();
        }

        let mut queue: VecDeque<Span> = segments.into();
        let mut out: Vec<ChunkCandidate> = Vec::with_capacity(queue.len());

        while let Some(segment) = queue.pop_front() {
            let prev = out
                .last()
                .map(|candidate| candidate.span)
                .filter(|_| !self.starts_section(segment));
            let Some(prev) = prev else {
                out.push(ChunkCandidate {
                    span: segment,
                    overlap_len: 0,
                    token_count: tokens.count(segment)?,
                });
                continue;
            };

            let prefix_start = self.tail_start(prev, self.overlap)?;
            let span = Span::new(prefix_start, segment.end);
            let token_count = tokens.count(span)?;
            if token_count <= self.chunk_size {
                out.push(ChunkCandidate {
                    span,
                    overlap_len: segment.start.saturating_sub(prefix_start),
                    token_count,
                });
                continue;
            }

            let segment_tokens = tokens.count(segment)?;
            let excess = token_count - self.chunk_size;
            let budget = segment_tokens.saturating_sub(excess).max(1);
            let pieces = self.splitter.split(segment, budget)?;
            if pieces.len() > 1 {
                log::debug!(
                    "Re-split segment {}..{} into {} pieces to fit overlap",
                    segment.start,
                    segment.end,
                    pieces.len()
                );
                for piece in pieces.into_iter().rev() {
                    queue.push_front(piece);
                }
                continue;
            }

            out.push(self.shrink_overlap(prev, segment)?);
        }

        Ok(out)
    }

    /// Halve the overlap target until prefix + segment fits; with no room at
    /// all the segment stands alone.
    fn shrink_overlap(&self, prev: Span, segment: Span) -> Result<ChunkCandidate> {
        let tokens = self.splitter.tokens();
        let mut target = self.overlap / 2;
        loop {
            let prefix_start = self.tail_start(prev, target)?;
            let span = Span::new(prefix_start, segment.end);
            let token_count = tokens.count(span)?;
            if token_count <= self.chunk_size || target == 0 {
                if prefix_start >= segment.start {
                    log::warn!(
                        "Dropped overlap before indivisible unit at bytes {}..{}",
                        segment.start,
                        segment.end
                    );
                }
                return Ok(ChunkCandidate {
                    span,
                    overlap_len: segment.start.saturating_sub(prefix_start),
                    token_count,
                });
            }
            target /= 2;
        }
    }

    /// Start of the longest tail of `prev` holding at most `target` tokens.
    ///
    /// Tails begin at word starts; only when the last word alone is too large
    /// does the tail start inside it, at a grapheme boundary. Returns
    /// `prev.end` when nothing fits.
    fn tail_start(&self, prev: Span, target: usize) -> Result<usize> {
        if target == 0 || prev.is_empty() {
            return Ok(prev.end);
        }
        let tokens = self.splitter.tokens();
        let text = tokens.text();
        let slice = prev.slice(text);

        let mut starts = vec![prev.start];
        starts.extend(
            WORD_BREAK
                .find_iter(slice)
                .map(|m| prev.start + m.end())
                .filter(|&start| start > prev.start && start < prev.end),
        );

        if let Some(start) = first_fitting(&starts, |start| {
            Ok(tokens.count(Span::new(start, prev.end))? <= target)
        })? {
            return Ok(start);
        }

        let last_word = starts[starts.len() - 1];
        let graphemes: Vec<usize> = text[last_word..prev.end]
            .grapheme_indices(true)
            .map(|(offset, _)| last_word + offset)
            .skip(1)
            .collect();
        Ok(first_fitting(&graphemes, |start| {
            Ok(tokens.count(Span::new(start, prev.end))? <= target)
        })?
        .unwrap_or(prev.end))
    }
}

/// First candidate for which `fits` holds, assuming `fits` is monotone
/// (false ... false true ... true) over `candidates`.
fn first_fitting(
    candidates: &[usize],
    mut fits: impl FnMut(usize) -> Result<bool>,
) -> Result<Option<usize>> {
    let (mut lo, mut hi) = (0, candidates.len());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if fits(candidates[mid])? {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(candidates.get(lo).copied())
}
