use crate::chunker::CancellationFlag;
use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::error::{ChunkerError, Result};
use crate::signals::{SimilaritySignal, StructureSignal};
use crate::splitter::{merge_small_segments, HierarchicalSplitter};
use crate::types::Span;
use rayon::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

/// Contiguous, token-bounded segments plus the strategy that actually produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub segments: Vec<Span>,
    pub strategy: ChunkingStrategy,
    /// Offsets where a top-level section starts; no overlap may cross them
    pub section_starts: Vec<usize>,
}

impl Segmentation {
    fn flat(segments: Vec<Span>, strategy: ChunkingStrategy) -> Self {
        Self {
            segments,
            strategy,
            section_starts: Vec::new(),
        }
    }
}

/// Execute the configured chunking strategy over a document span
pub struct StrategyExecutor<'a> {
    config: &'a ChunkingConfig,
    splitter: HierarchicalSplitter<'a>,
    structure: Option<&'a dyn StructureSignal>,
    similarity: Option<&'a dyn SimilaritySignal>,
    cancel: Option<&'a CancellationFlag>,
}

impl<'a> StrategyExecutor<'a> {
    pub fn new(config: &'a ChunkingConfig, splitter: HierarchicalSplitter<'a>) -> Self {
        Self {
            config,
            splitter,
            structure: None,
            similarity: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_structure(mut self, structure: Option<&'a dyn StructureSignal>) -> Self {
        self.structure = structure;
        self
    }

    #[must_use]
    pub fn with_similarity(mut self, similarity: Option<&'a dyn SimilaritySignal>) -> Self {
        self.similarity = similarity;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: Option<&'a CancellationFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the configured strategy
    pub fn execute(&self, span: Span) -> Result<Segmentation> {
        let strategy = self.resolve(span);

        // Keep section boundaries even for small documents.
        let keeps_boundaries = strategy == ChunkingStrategy::Hierarchical;
        if !keeps_boundaries && self.splitter.tokens().count(span)? <= self.config.chunk_size {
            return Ok(Segmentation::flat(vec![span], strategy));
        }

        let segmentation = match strategy {
            ChunkingStrategy::FixedSize => Segmentation::flat(self.chunk_fixed_size(span)?, strategy),
            ChunkingStrategy::Hierarchical => self.chunk_hierarchical(span)?,
            ChunkingStrategy::Semantic => self.chunk_semantic(span)?,
            ChunkingStrategy::Recursive
            | ChunkingStrategy::TokenBased
            | ChunkingStrategy::Adaptive => Segmentation::flat(self.chunk_recursive(span)?, strategy),
        };

        log::debug!(
            "Strategy {} produced {} segments",
            segmentation.strategy,
            segmentation.segments.len()
        );
        Ok(segmentation)
    }

    /// Resolve `Adaptive`, and fall back to `Recursive` when a required signal is missing.
    fn resolve(&self, span: Span) -> ChunkingStrategy {
        match self.config.strategy {
            ChunkingStrategy::Adaptive => {
                let chars = span.slice(self.splitter.tokens().text()).chars().count();
                if chars >= self.config.adaptive_fixed_size_threshold {
                    log::debug!("Adaptive: {chars} chars, using fixed-size chunking");
                    ChunkingStrategy::FixedSize
                } else {
                    ChunkingStrategy::Recursive
                }
            }
            ChunkingStrategy::Hierarchical if self.structure.is_none() => {
                log::warn!("No structure signal supplied, falling back to recursive chunking");
                ChunkingStrategy::Recursive
            }
            ChunkingStrategy::Semantic if self.similarity.is_none() => {
                log::warn!("No similarity signal supplied, falling back to recursive chunking");
                ChunkingStrategy::Recursive
            }
            strategy => strategy,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(ChunkerError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Split one independent region and merge undersized neighbours inside it
    fn split_region(&self, region: Span) -> Result<Vec<Span>> {
        let budget = self.config.segment_budget();
        let segments = self.splitter.split(region, budget)?;
        merge_small_segments(
            self.splitter.tokens(),
            segments,
            self.config.min_segment_tokens,
            budget,
        )
    }

    fn split_regions(&self, regions: &[Span]) -> Result<Vec<Span>> {
        let split = |region: &Span| -> Result<Vec<Span>> {
            self.check_cancelled()?;
            self.split_region(*region)
        };

        let per_region: Vec<Vec<Span>> = if self.config.parallel_sections && regions.len() > 1 {
            regions.par_iter().map(split).collect::<Result<_>>()?
        } else {
            regions.iter().map(split).collect::<Result<_>>()?
        };

        Ok(per_region.into_iter().flatten().collect())
    }

    fn chunk_recursive(&self, span: Span) -> Result<Vec<Span>> {
        self.check_cancelled()?;
        self.split_region(span)
    }

    /// Raw grapheme windows sized from the characters-per-token ratio; any
    /// window over budget is re-split through the hierarchy.
    fn chunk_fixed_size(&self, span: Span) -> Result<Vec<Span>> {
        self.check_cancelled()?;
        let budget = self.config.segment_budget();
        let window_chars = ((budget as f64) * f64::from(self.config.chars_per_token))
            .floor()
            .max(1.0) as usize;

        let text = self.splitter.tokens().text();
        let mut windows = Vec::new();
        let mut start = span.start;
        let mut graphemes_in_window = 0;
        for (offset, _) in span.slice(text).grapheme_indices(true) {
            if graphemes_in_window == window_chars {
                let cut = span.start + offset;
                windows.push(Span::new(start, cut));
                start = cut;
                graphemes_in_window = 0;
            }
            graphemes_in_window += 1;
        }
        windows.push(Span::new(start, span.end));

        let mut segments = Vec::with_capacity(windows.len());
        for window in windows {
            if self.splitter.tokens().count(window)? <= budget {
                segments.push(window);
            } else {
                segments.extend(self.splitter.split(window, budget)?);
            }
        }

        merge_small_segments(
            self.splitter.tokens(),
            segments,
            self.config.min_segment_tokens,
            budget,
        )
    }

    /// Sections never share a chunk; each one is split on its own.
    fn chunk_hierarchical(&self, span: Span) -> Result<Segmentation> {
        let starts = self
            .structure
            .and_then(|signal| signal.section_starts(span.slice(self.splitter.tokens().text())));
        let Some(starts) = starts else {
            log::warn!("Structure signal unavailable, falling back to recursive chunking");
            return Ok(Segmentation::flat(self.chunk_recursive(span)?, ChunkingStrategy::Recursive));
        };

        let sections = section_spans(self.splitter.tokens().text(), span, &starts);
        log::debug!("Hierarchical: {} top-level sections", sections.len());

        Ok(Segmentation {
            segments: self.split_regions(&sections)?,
            strategy: ChunkingStrategy::Hierarchical,
            section_starts: sections[1..].iter().map(|section| section.start).collect(),
        })
    }

    /// Group adjacent sentences whose similarity reaches the threshold, then
    /// token-bound each group separately.
    fn chunk_semantic(&self, span: Span) -> Result<Segmentation> {
        let fallback = || -> Result<Segmentation> {
            Ok(Segmentation::flat(self.chunk_recursive(span)?, ChunkingStrategy::Recursive))
        };
        let Some(signal) = self.similarity else {
            return fallback();
        };

        let text = self.splitter.tokens().text();
        let sentences = self.splitter.sentences(span);
        let mut groups = Vec::new();
        let mut current = sentences[0];
        let mut last = sentences[0];

        for &sentence in &sentences[1..] {
            let Some(similarity) =
                signal.similarity(last.slice(text).trim(), sentence.slice(text).trim())
            else {
                log::warn!("Similarity signal unavailable, falling back to recursive chunking");
                return fallback();
            };

            if similarity >= self.config.similarity_threshold {
                current = current.extend_to(sentence);
            } else {
                groups.push(current);
                current = sentence;
            }
            last = sentence;
        }
        groups.push(current);
        log::debug!(
            "Semantic: {} sentences in {} groups",
            sentences.len(),
            groups.len()
        );

        Ok(Segmentation::flat(self.split_regions(&groups)?, ChunkingStrategy::Semantic))
    }
}

/// Cut `span` at offsets relative to its start. Offsets outside the span or
/// inside a UTF-8 sequence are ignored, and the preamble before the first
/// section is its own region.
fn section_spans(text: &str, span: Span, starts: &[usize]) -> Vec<Span> {
    let mut cuts: Vec<usize> = starts
        .iter()
        .map(|&start| span.start.saturating_add(start))
        .filter(|&cut| cut > span.start && cut < span.end)
        .filter(|&cut| {
            let on_boundary = text.is_char_boundary(cut);
            if !on_boundary {
                log::warn!("Ignoring section start {cut}: not on a character boundary");
            }
            on_boundary
        })
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut sections = Vec::with_capacity(cuts.len() + 1);
    let mut start = span.start;
    for cut in cuts {
        sections.push(Span::new(start, cut));
        start = cut;
    }
    sections.push(Span::new(start, span.end));
    sections
}
