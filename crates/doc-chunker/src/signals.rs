//! Externally supplied signals used by the hierarchical and semantic strategies.

/// Supplies top-level section boundaries for a document.
pub trait StructureSignal: Send + Sync {
    /// Byte offsets where top-level sections start, or `None` when the
    /// structure of this text is unknown.
    fn section_starts(&self, text: &str) -> Option<Vec<usize>>;
}

/// Similarity between adjacent sentences.
pub trait SimilaritySignal: Send + Sync {
    /// Similarity in `[0, 1]`, or `None` when the signal is unavailable.
    fn similarity(&self, left: &str, right: &str) -> Option<f32>;
}

/// Treats ATX markdown headings (`#` .. `######`) up to `max_level` as
/// section starts. Headings inside fenced code blocks are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownHeadings {
    max_level: usize,
}

impl MarkdownHeadings {
    #[must_use]
    pub fn new(max_level: usize) -> Self {
        Self {
            max_level: max_level.clamp(1, 6),
        }
    }

    #[must_use]
    pub const fn max_level(&self) -> usize {
        self.max_level
    }

    /// Parse header: returns (level, title)
    pub fn parse_header(line: &str) -> Option<(usize, &str)> {
        let trimmed = line.trim_start();
        let hash_count = trimmed.chars().take_while(|&c| c == '#').count();

        if hash_count == 0 || hash_count > 6 {
            return None;
        }
        let rest = &trimmed[hash_count..];
        if !rest.starts_with([' ', '\t']) {
            return None;
        }
        let title = rest.trim();
        (!title.is_empty()).then_some((hash_count, title))
    }
}

impl Default for MarkdownHeadings {
    fn default() -> Self {
        Self::new(2)
    }
}

impl StructureSignal for MarkdownHeadings {
    fn section_starts(&self, text: &str) -> Option<Vec<usize>> {
        let mut starts = Vec::new();
        let mut in_fence = false;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            } else if !in_fence {
                if let Some((level, _)) = Self::parse_header(line) {
                    if level <= self.max_level {
                        starts.push(offset);
                    }
                }
            }
            offset += line.len();
        }

        Some(starts)
    }
}
