use crate::assembler::ChunkAssembler;
use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::error::{ChunkerError, ErrorKind, Result};
use crate::overlap::OverlapWindower;
use crate::signals::{MarkdownHeadings, SimilaritySignal, StructureSignal};
use crate::splitter::HierarchicalSplitter;
use crate::strategy::StrategyExecutor;
use crate::token_counter::{CharRatioEstimator, SpanCounter, TokenCounter};
use crate::types::{DocumentChunk, ExtractedDocument};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between the caller and a running pipeline.
///
/// Checked between stages and between top-level sections.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stage of a single chunking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Validating,
    Splitting,
    Windowing,
    Assembling,
    Done,
    Failed(ErrorKind),
}

impl PipelineState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// The single forward successor; `Failed` is handled separately.
    const fn successor(self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::Validating),
            PipelineState::Validating => Some(PipelineState::Splitting),
            PipelineState::Splitting => Some(PipelineState::Windowing),
            PipelineState::Windowing => Some(PipelineState::Assembling),
            PipelineState::Assembling => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed(_) => None,
        }
    }
}

/// State and transition history of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    history: Vec<PipelineState>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Every state visited, `Idle` first
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to the next stage
    fn advance(&mut self) -> Result<PipelineState> {
        let current = self.state();
        let next = current.successor().ok_or_else(|| {
            ChunkerError::invariant(format!("no transition out of {current:?}"))
        })?;
        log::debug!("Pipeline {current:?} -> {next:?}");
        self.history.push(next);
        Ok(next)
    }

    fn fail(&mut self, err: &ChunkerError) {
        let current = self.state();
        if current == PipelineState::Done {
            return;
        }
        let failed = PipelineState::Failed(err.kind());
        log::debug!("Pipeline {current:?} -> {failed:?}");
        self.history.push(failed);
    }
}

/// Ordered chunks plus the unmodified document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedDocument {
    pub document_id: String,
    pub chunks: Vec<DocumentChunk>,
    pub complete_text: String,
    /// Strategy that actually produced the boundaries
    pub strategy: ChunkingStrategy,
    pub token_count_estimated: bool,
}

impl ChunkedDocument {
    /// Concatenate the non-overlapping part of every chunk
    #[must_use]
    pub fn reconstruct_text(&self) -> String {
        self.chunks.iter().map(DocumentChunk::own_content).collect()
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn stats(&self) -> ChunkingStats {
        let tokens = || self.chunks.iter().map(DocumentChunk::token_count);
        let total_tokens: usize = tokens().sum();
        ChunkingStats {
            total_chunks: self.chunks.len(),
            total_chars: self.chunks.iter().map(DocumentChunk::char_count).sum(),
            total_tokens,
            avg_tokens_per_chunk: if self.chunks.is_empty() {
                0
            } else {
                total_tokens / self.chunks.len()
            },
            min_tokens: tokens().min().unwrap_or(0),
            max_tokens: tokens().max().unwrap_or(0),
            overlap_bytes: self.chunks.iter().map(|chunk| chunk.overlap_len).sum(),
            estimated: self.token_count_estimated,
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub overlap_bytes: usize,
    pub estimated: bool,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Chars: {} | Tokens: {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_chars,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens
        )?;
        if self.estimated {
            write!(f, " (estimated)")?;
        }
        Ok(())
    }
}

/// Main entry point: validates the configuration, runs the selected strategy,
/// applies overlap and assembles the chunk records.
pub struct ChunkingOrchestrator {
    config: ChunkingConfig,
    counter: Arc<dyn TokenCounter>,
    structure: Option<Arc<dyn StructureSignal>>,
    similarity: Option<Arc<dyn SimilaritySignal>>,
}

impl ChunkingOrchestrator {
    /// Create an orchestrator over an injected token counter.
    ///
    /// The configuration is validated on every run, not here.
    pub fn new(config: ChunkingConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            config,
            counter,
            structure: None,
            similarity: None,
        }
    }

    /// Degraded mode: token counts are estimated from `chars_per_token` and
    /// every chunk is flagged as estimated.
    pub fn estimated(config: ChunkingConfig) -> Self {
        let estimator = CharRatioEstimator::new(config.chars_per_token);
        Self::new(config, Arc::new(estimator))
    }

    /// Builder: structure signal for the hierarchical strategy
    #[must_use]
    pub fn with_structure(mut self, structure: Arc<dyn StructureSignal>) -> Self {
        self.structure = Some(structure);
        self
    }

    /// Builder: markdown headings up to `max_level` as section boundaries
    #[must_use]
    pub fn with_markdown_headings(self, max_level: usize) -> Self {
        self.with_structure(Arc::new(MarkdownHeadings::new(max_level)))
    }

    /// Builder: similarity signal for the semantic strategy
    #[must_use]
    pub fn with_similarity(mut self, similarity: Arc<dyn SimilaritySignal>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    #[must_use]
    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Chunk a document
    pub fn process(&self, document: &ExtractedDocument) -> Result<ChunkedDocument> {
        self.run(document, None).1
    }

    /// Chunk a document, stopping early once `cancel` is set
    pub fn process_with_cancel(
        &self,
        document: &ExtractedDocument,
        cancel: &CancellationFlag,
    ) -> Result<ChunkedDocument> {
        self.run(document, Some(cancel)).1
    }

    /// Chunk a document and return the state history next to the result
    pub fn run(
        &self,
        document: &ExtractedDocument,
        cancel: Option<&CancellationFlag>,
    ) -> (PipelineRun, Result<ChunkedDocument>) {
        let mut run = PipelineRun::new();
        let result = self.drive(document, cancel, &mut run);
        if let Err(err) = &result {
            log::debug!("Chunking document {} failed: {err}", document.document_id);
            run.fail(err);
        }
        (run, result)
    }

    fn drive(
        &self,
        document: &ExtractedDocument,
        cancel: Option<&CancellationFlag>,
        run: &mut PipelineRun,
    ) -> Result<ChunkedDocument> {
        let check_cancelled = || match cancel {
            Some(flag) if flag.is_cancelled() => Err(ChunkerError::Cancelled),
            _ => Ok(()),
        };

        run.advance()?;
        self.config.validate()?;
        if document.complete_text.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        check_cancelled()?;

        run.advance()?;
        let tokens = SpanCounter::new(&document.complete_text, self.counter.as_ref());
        let splitter = HierarchicalSplitter::new(tokens, self.config.split_oversized_words);
        let segmentation = StrategyExecutor::new(&self.config, splitter)
            .with_structure(self.structure.as_deref())
            .with_similarity(self.similarity.as_deref())
            .with_cancellation(cancel)
            .execute(document.full_span())?;
        check_cancelled()?;

        run.advance()?;
        let candidates =
            OverlapWindower::new(splitter, self.config.chunk_size, self.config.chunk_overlap)
                .with_section_starts(&segmentation.section_starts)
                .apply(segmentation.segments)?;
        check_cancelled()?;

        run.advance()?;
        let chunks = ChunkAssembler::new(
            document,
            tokens,
            self.config.chunk_size,
            segmentation.strategy,
        )
        .assemble(&candidates)?;

        run.advance()?;
        log::info!(
            "Created {} chunks for document {} ({})",
            chunks.len(),
            document.document_id,
            segmentation.strategy
        );

        Ok(ChunkedDocument {
            document_id: document.document_id.clone(),
            chunks,
            complete_text: document.complete_text.clone(),
            strategy: segmentation.strategy,
            token_count_estimated: tokens.is_estimate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_counter::TokenizerError;
    use pretty_assertions::assert_eq;

    struct Words;

    impl TokenCounter for Words {
        fn count_tokens(&self, text: &str) -> std::result::Result<usize, TokenizerError> {
            Ok(text.split_whitespace().count())
        }

        fn name(&self) -> &str {
            "words"
        }
    }

    const MARKDOWN: &str = "# Intro\n\nFirst paragraph talks about setup. It has two sentences.\n\n\
## Usage\n\nSecond section explains usage in more words than the first one does.\n\n\
## Limits\n\nThird section lists limits.\n";

    fn orchestrator(config: ChunkingConfig) -> ChunkingOrchestrator {
        ChunkingOrchestrator::new(config, Arc::new(Words))
    }

    #[test]
    fn test_successful_run_visits_every_state() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let config = ChunkingConfig {
            chunk_size: 12,
            chunk_overlap: 3,
            ..Default::default()
        };
        let (run, result) = orchestrator(config).run(&doc, None);
        let chunked = result.unwrap();

        assert_eq!(
            run.history(),
            &[
                PipelineState::Idle,
                PipelineState::Validating,
                PipelineState::Splitting,
                PipelineState::Windowing,
                PipelineState::Assembling,
                PipelineState::Done,
            ]
        );
        assert_eq!(chunked.reconstruct_text(), MARKDOWN);
        assert!(chunked.chunks.len() > 1);
    }

    #[test]
    fn test_invalid_config_fails_in_validation() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..Default::default()
        };
        let (run, result) = orchestrator(config).run(&doc, None);
        assert!(matches!(result, Err(ChunkerError::InvalidConfig(_))));
        assert_eq!(
            run.history(),
            &[
                PipelineState::Idle,
                PipelineState::Validating,
                PipelineState::Failed(ErrorKind::Configuration),
            ]
        );
        assert!(run.state().is_terminal());
    }

    #[test]
    fn test_whitespace_document_is_rejected() {
        let doc = ExtractedDocument::new("doc-1", "blank.txt", " \n\t\n");
        let result = orchestrator(ChunkingConfig::default()).process(&doc);
        assert_eq!(result, Err(ChunkerError::EmptyContent));
    }

    #[test]
    fn test_cancelled_run_returns_no_chunks() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let flag = CancellationFlag::new();
        flag.cancel();
        let (run, result) = orchestrator(ChunkingConfig::default()).run(&doc, Some(&flag));
        assert_eq!(result, Err(ChunkerError::Cancelled));
        assert_eq!(run.state(), PipelineState::Failed(ErrorKind::Cancelled));
    }

    #[test]
    fn test_hierarchical_records_method() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let config = ChunkingConfig {
            strategy: ChunkingStrategy::Hierarchical,
            chunk_size: 50,
            chunk_overlap: 0,
            ..Default::default()
        };
        let chunked = orchestrator(config.clone())
            .with_markdown_headings(2)
            .process(&doc)
            .unwrap();
        assert_eq!(chunked.strategy, ChunkingStrategy::Hierarchical);
        assert_eq!(chunked.chunks.len(), 3);
        assert!(chunked.chunks[1].content.starts_with("## Usage"));
        assert!(chunked
            .chunks
            .iter()
            .all(|chunk| chunk.metadata.processing_method == "hierarchical"));

        let fallback = orchestrator(config).process(&doc).unwrap();
        assert_eq!(fallback.strategy, ChunkingStrategy::Recursive);
    }

    #[test]
    fn test_stats_summary() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let config = ChunkingConfig {
            chunk_size: 12,
            chunk_overlap: 0,
            ..Default::default()
        };
        let chunked = orchestrator(config).process(&doc).unwrap();
        let stats = chunked.stats();

        assert_eq!(stats.total_chunks, chunked.chunks.len());
        assert_eq!(stats.total_tokens, Words.count_tokens(MARKDOWN).unwrap());
        assert_eq!(stats.overlap_bytes, 0);
        assert!(stats.max_tokens <= 12);
        assert!(stats.to_string().starts_with("Chunks: "));
        assert!(!stats.to_string().contains("estimated"));
    }

    #[test]
    fn test_estimated_mode_flags_chunks() {
        let doc = ExtractedDocument::new("doc-1", "guide.md", MARKDOWN);
        let config = ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 4,
            ..Default::default()
        };
        let chunked = ChunkingOrchestrator::estimated(config).process(&doc).unwrap();
        assert!(chunked.token_count_estimated);
        assert!(chunked
            .chunks
            .iter()
            .all(|chunk| chunk.metadata.token_count_estimated));
        assert!(chunked.stats().to_string().ends_with("(estimated)"));
        assert_eq!(chunked.reconstruct_text(), MARKDOWN);
    }
}
