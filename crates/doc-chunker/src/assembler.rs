use crate::config::ChunkingStrategy;
use crate::error::{ChunkerError, Result};
use crate::token_counter::SpanCounter;
use crate::types::{ChunkCandidate, ChunkMetadata, DocumentChunk, ExtractedDocument};
use unicode_segmentation::UnicodeSegmentation;

/// Turns chunk candidates into final [`DocumentChunk`] records and checks the
/// output invariants before anything leaves the pipeline.
pub struct ChunkAssembler<'a> {
    document: &'a ExtractedDocument,
    tokens: SpanCounter<'a>,
    chunk_size: usize,
    strategy: ChunkingStrategy,
}

impl<'a> ChunkAssembler<'a> {
    pub fn new(
        document: &'a ExtractedDocument,
        tokens: SpanCounter<'a>,
        chunk_size: usize,
        strategy: ChunkingStrategy,
    ) -> Self {
        Self {
            document,
            tokens,
            chunk_size,
            strategy,
        }
    }

    /// Build chunk records. Indices are assigned in emission order.
    pub fn assemble(&self, candidates: &[ChunkCandidate]) -> Result<Vec<DocumentChunk>> {
        self.check_tiling(candidates)?;

        let text = &self.document.complete_text;
        let estimated = self.tokens.is_estimate();

        candidates
            .iter()
            .enumerate()
            .map(|(chunk_index, candidate)| {
                self.check_candidate(chunk_index, candidate)?;
                let content = candidate.span.slice(text).to_string();
                Ok(DocumentChunk {
                    document_id: self.document.document_id.clone(),
                    chunk_index,
                    start_offset: candidate.span.start,
                    end_offset: candidate.span.end,
                    overlap_len: candidate.overlap_len,
                    metadata: ChunkMetadata {
                        document_filename: self.document.document_filename.clone(),
                        document_type: self.document.document_type,
                        structure: self.document.structure.clone(),
                        chunk_token_count: candidate.token_count,
                        chunk_char_count: content.chars().count(),
                        processing_method: self.strategy.as_str().to_string(),
                        token_count_estimated: estimated,
                    },
                    content,
                })
            })
            .collect()
    }

    /// Own contents must concatenate back to the document text exactly.
    fn check_tiling(&self, candidates: &[ChunkCandidate]) -> Result<()> {
        let text_len = self.document.complete_text.len();
        let Some(first) = candidates.first() else {
            return Err(ChunkerError::invariant("no chunks produced"));
        };
        if first.span.start != 0 || first.overlap_len != 0 {
            return Err(ChunkerError::invariant(format!(
                "first chunk starts at byte {} with {} overlap bytes",
                first.span.start, first.overlap_len
            )));
        }

        let mut covered = 0;
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.overlap_len > candidate.span.len() {
                return Err(ChunkerError::invariant(format!(
                    "chunk {index} overlap longer than the chunk"
                )));
            }
            if candidate.own_start() != covered {
                return Err(ChunkerError::invariant(format!(
                    "chunk {index} resumes at byte {} but previous chunk ended at {covered}",
                    candidate.own_start()
                )));
            }
            if candidate.overlap_len > 0 && candidate.span.start < covered_start(candidates, index)
            {
                return Err(ChunkerError::invariant(format!(
                    "chunk {index} overlap reaches past the previous chunk"
                )));
            }
            covered = candidate.span.end;
        }

        if covered != text_len {
            return Err(ChunkerError::invariant(format!(
                "chunks cover {covered} of {text_len} bytes"
            )));
        }
        Ok(())
    }

    fn check_candidate(&self, index: usize, candidate: &ChunkCandidate) -> Result<()> {
        let content = candidate.span.slice(&self.document.complete_text);
        if content.is_empty() {
            return Err(ChunkerError::invariant(format!("chunk {index} is empty")));
        }

        let recount = self.tokens.count(candidate.span)?;
        if recount != candidate.token_count {
            return Err(ChunkerError::invariant(format!(
                "chunk {index} token count {} does not match recount {recount}",
                candidate.token_count
            )));
        }

        if candidate.token_count > self.chunk_size {
            let indivisible = content.split_whitespace().count() <= 1
                || content.graphemes(true).count() == 1;
            if candidate.overlap_len > 0 || !indivisible {
                return Err(ChunkerError::invariant(format!(
                    "chunk {index} has {} tokens, over the limit of {}",
                    candidate.token_count, self.chunk_size
                )));
            }
            log::warn!(
                "Chunk {index} of document {} holds an indivisible unit of {} tokens (limit {})",
                self.document.document_id,
                candidate.token_count,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// Start of the chunk preceding `index`; an overlap prefix must stay inside it.
fn covered_start(candidates: &[ChunkCandidate], index: usize) -> usize {
    index
        .checked_sub(1)
        .map_or(0, |prev| candidates[prev].span.start)
}
