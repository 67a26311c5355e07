//! # Docsplit Chunker
//!
//! Deterministic, token-budgeted chunking of already-extracted document text.
//!
//! ## Guarantees
//!
//! Every chunk produced for a document:
//! - Is an exact byte slice of the document text (no normalisation)
//! - Holds at most `chunk_size` tokens, unless it is one indivisible unit
//! - Shares up to `chunk_overlap` tokens with its predecessor
//!
//! Dropping each chunk's overlap prefix and concatenating the rest gives back
//! the document text.
//!
//! ## Architecture
//!
//! ```text
//! ExtractedDocument
//!     │
//!     ├──> Validating (config invariants, empty text)
//!     │
//!     ├──> Splitting (strategy)
//!     │    ├─> sections / similarity groups / character windows
//!     │    └─> paragraph → sentence → word → grapheme
//!     │
//!     ├──> Windowing (overlap prefix, re-split or shrink to fit)
//!     │
//!     └──> Assembling
//!          ├─> recount and verify every chunk
//!          └─> Emit DocumentChunk[] with metadata
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docsplit_chunker::{ChunkingConfig, ChunkingOrchestrator, ExtractedDocument};
//!
//! let config = ChunkingConfig {
//!     chunk_size: 64,
//!     chunk_overlap: 8,
//!     ..ChunkingConfig::default()
//! };
//! let orchestrator = ChunkingOrchestrator::estimated(config);
//!
//! let doc = ExtractedDocument::new(
//!     "doc-42",
//!     "notes.md",
//!     "# Notes\n\nFirst paragraph.\n\nSecond paragraph with a bit more text.",
//! );
//!
//! let chunked = orchestrator.process(&doc).unwrap();
//! assert_eq!(chunked.reconstruct_text(), doc.complete_text);
//! for chunk in &chunked.chunks {
//!     println!("#{} ({} tokens): {}", chunk.chunk_index, chunk.token_count(), chunk.content);
//! }
//! ```

mod assembler;
mod chunker;
mod config;
mod error;
mod overlap;
mod signals;
mod splitter;
mod strategy;
mod token_counter;
mod types;

pub use assembler::ChunkAssembler;
pub use chunker::{
    CancellationFlag, ChunkedDocument, ChunkingOrchestrator, ChunkingStats, PipelineRun,
    PipelineState,
};
pub use config::{ChunkingConfig, ChunkingStrategy};
pub use error::{ChunkerError, ErrorKind, Result};
pub use overlap::OverlapWindower;
pub use signals::{MarkdownHeadings, SimilaritySignal, StructureSignal};
pub use splitter::{merge_small_segments, HierarchicalSplitter, SplitLevel};
pub use strategy::{Segmentation, StrategyExecutor};
pub use token_counter::{
    CharRatioEstimator, HuggingFaceCounter, SpanCounter, TokenCounter, TokenizerError,
};
pub use types::{
    ChunkCandidate, ChunkMetadata, DocumentChunk, DocumentType, ExtractedDocument, Span,
    StructuralMetadata,
};
