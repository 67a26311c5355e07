#![allow(dead_code)]

use docsplit_chunker::{
    ChunkedDocument, ChunkingConfig, ChunkingOrchestrator, SimilaritySignal, StructureSignal,
    TokenCounter, TokenizerError,
};
use std::sync::Arc;

/// One token per whitespace-separated word
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.split_whitespace().count())
    }

    fn name(&self) -> &str {
        "words"
    }
}

/// One token per char, whitespace included
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.chars().count())
    }

    fn name(&self) -> &str {
        "chars"
    }
}

pub const POISON: &str = "POISONPILL";

/// Word counter that cannot encode any text containing [`POISON`]
pub struct FailingCounter;

impl TokenCounter for FailingCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        if text.contains(POISON) {
            return Err(TokenizerError::new("unknown byte sequence"));
        }
        Ok(text.split_whitespace().count())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Sentences are similar when they start with the same word
pub struct SameFirstWord;

impl SimilaritySignal for SameFirstWord {
    fn similarity(&self, left: &str, right: &str) -> Option<f32> {
        let first = |s: &str| s.split_whitespace().next().map(str::to_lowercase);
        Some(if first(left) == first(right) { 1.0 } else { 0.0 })
    }
}

/// Similarity service that is down
pub struct Unavailable;

impl SimilaritySignal for Unavailable {
    fn similarity(&self, _left: &str, _right: &str) -> Option<f32> {
        None
    }
}

/// Fixed section starts, regardless of the text
pub struct FixedSections(pub Vec<usize>);

impl StructureSignal for FixedSections {
    fn section_starts(&self, _text: &str) -> Option<Vec<usize>> {
        Some(self.0.clone())
    }
}

pub fn words() -> Arc<dyn TokenCounter> {
    Arc::new(WordCounter)
}

pub fn chars() -> Arc<dyn TokenCounter> {
    Arc::new(CharCounter)
}

pub fn orchestrator(config: ChunkingConfig, counter: Arc<dyn TokenCounter>) -> ChunkingOrchestrator {
    ChunkingOrchestrator::new(config, counter)
}

/// `count` sentences of ten words each, grouped into paragraphs of `per_paragraph`.
pub fn prose(count: usize, per_paragraph: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        if i > 0 {
            text.push_str(if i % per_paragraph == 0 { "\n\n" } else { " " });
        }
        text.push_str(&format!(
            "Sentence {i} keeps a steady pace of exactly ten words."
        ));
    }
    text
}

pub fn markdown_manual() -> String {
    let mut text = String::from("Preamble line before any heading.\n\n");
    for (i, title) in ["Install", "Configure", "Run", "Troubleshoot"].iter().enumerate() {
        text.push_str(&format!("# {title}\n\n"));
        for p in 0..=i {
            text.push_str(&format!(
                "Paragraph {p} of {title} describes one step. It is short enough to read.\n\n"
            ));
        }
    }
    text.push_str("```\n# not a heading inside code\n```\n");
    text
}

pub fn mixed_text() -> String {
    format!(
        "Intro: café naïve résumé 日本語のテキスト 🚀 emoji.\n\n\
         See https://example.com/{} for details! Then continue.\n\n\
         Tail words with e\u{301} combining marks and more words after them.",
        "a".repeat(80)
    )
}

/// Check the output contract every strategy must satisfy.
pub fn assert_contract(chunked: &ChunkedDocument, text: &str, counter: &dyn TokenCounter, config: &ChunkingConfig) {
    assert!(!chunked.chunks.is_empty());
    assert_eq!(chunked.reconstruct_text(), text, "reconstruction");
    assert_eq!(chunked.complete_text, text);

    for (i, chunk) in chunked.chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i, "index contiguity");
        assert!(!chunk.content.is_empty());
        assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.content);
        assert_eq!(chunk.token_count(), counter.count_tokens(&chunk.content).unwrap());
        assert_eq!(chunk.char_count(), chunk.content.chars().count());

        if chunk.token_count() > config.chunk_size {
            assert_eq!(chunk.overlap_len, 0, "oversized chunk {i} carries overlap");
            assert!(
                chunk.content.split_whitespace().count() <= 1,
                "chunk {i} over budget: {:?}",
                chunk.content
            );
        }
    }

    for pair in chunked.chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(next.start_offset + next.overlap_len, prev.end_offset);
        assert!(prev.content.ends_with(next.overlap_content()), "overlap bytes");
        if config.chunk_overlap == 0 {
            assert_eq!(next.overlap_len, 0);
        } else {
            let shared = counter.count_tokens(next.overlap_content()).unwrap();
            assert!(shared <= config.chunk_overlap, "overlap of {shared} tokens");
        }
    }
    assert_eq!(chunked.chunks[0].overlap_len, 0);
}
