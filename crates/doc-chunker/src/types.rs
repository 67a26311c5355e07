use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

/// Half-open byte range into a document's `complete_text`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub const fn range(self) -> Range<usize> {
        self.start..self.end
    }

    /// Slice of `text` covered by this span
    #[must_use]
    pub fn slice(self, text: &str) -> &str {
        &text[self.range()]
    }

    /// Span covering `self` and everything up to the end of `other`
    #[must_use]
    pub const fn extend_to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

/// Source document type, as reported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Doc,
    #[serde(rename = "md")]
    Markdown,
    Html,
    Pptx,
    #[serde(rename = "txt")]
    Text,
    #[default]
    Unknown,
}

impl DocumentType {
    /// Detect document type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => DocumentType::Pdf,
            "docx" => DocumentType::Docx,
            "doc" => DocumentType::Doc,
            "md" | "markdown" => DocumentType::Markdown,
            "html" | "htm" => DocumentType::Html,
            "pptx" | "ppt" => DocumentType::Pptx,
            "txt" => DocumentType::Text,
            _ => DocumentType::Unknown,
        }
    }

    /// Detect document type from a file name or path
    pub fn from_filename(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(DocumentType::Unknown)
    }

    /// Detect document type from a MIME type
    pub fn from_mime_type(mime: &str) -> Self {
        match mime.trim().to_lowercase().as_str() {
            "application/pdf" => DocumentType::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                DocumentType::Docx
            }
            "application/msword" => DocumentType::Doc,
            "text/markdown" => DocumentType::Markdown,
            "text/html" => DocumentType::Html,
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            | "application/vnd.ms-powerpoint" => DocumentType::Pptx,
            "text/plain" => DocumentType::Text,
            _ => DocumentType::Unknown,
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            DocumentType::Pdf => "application/pdf",
            DocumentType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentType::Doc => "application/msword",
            DocumentType::Markdown => "text/markdown",
            DocumentType::Html => "text/html",
            DocumentType::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentType::Text => "text/plain",
            DocumentType::Unknown => "application/octet-stream",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Doc => "doc",
            DocumentType::Markdown => "md",
            DocumentType::Html => "html",
            DocumentType::Pptx => "pptx",
            DocumentType::Text => "txt",
            DocumentType::Unknown => "unknown",
        }
    }
}

/// Structural metadata reported by the extractor, copied into every chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralMetadata {
    /// Page count, `None` when the extractor could not tell
    pub page_count: Option<u32>,
    pub has_tables: bool,
    pub has_images: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
}

/// Already-extracted document text plus its metadata. Read-only input of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub document_id: String,
    pub document_filename: String,
    pub document_type: DocumentType,
    pub complete_text: String,
    #[serde(default)]
    pub structure: StructuralMetadata,
}

impl ExtractedDocument {
    /// Create a document, inferring its type from the file name
    pub fn new(
        document_id: impl Into<String>,
        document_filename: impl Into<String>,
        complete_text: impl Into<String>,
    ) -> Self {
        let document_filename = document_filename.into();
        Self {
            document_id: document_id.into(),
            document_type: DocumentType::from_filename(&document_filename),
            document_filename,
            complete_text: complete_text.into(),
            structure: StructuralMetadata::default(),
        }
    }

    /// Builder: set document type
    #[must_use]
    pub const fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    /// Builder: set structural metadata
    #[must_use]
    pub fn structure(mut self, structure: StructuralMetadata) -> Self {
        self.structure = structure;
        self
    }

    /// Span covering the whole text
    #[must_use]
    pub fn full_span(&self) -> Span {
        Span::new(0, self.complete_text.len())
    }
}

/// Token-bounded chunk boundary before metadata enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCandidate {
    /// Full extent of the chunk, overlap prefix included
    pub span: Span,
    /// Bytes at the start of `span` shared with the previous candidate
    pub overlap_len: usize,
    pub token_count: usize,
}

impl ChunkCandidate {
    /// Start of the content this candidate contributes on its own
    #[must_use]
    pub const fn own_start(&self) -> usize {
        self.span.start + self.overlap_len
    }
}

/// Final chunk record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: String,

    /// Position in the document (0-based, gapless)
    pub chunk_index: usize,

    /// Byte offset of `content` in the document text
    pub start_offset: usize,

    /// Byte offset one past the end of `content`
    pub end_offset: usize,

    /// Leading bytes of `content` repeated from the previous chunk
    pub overlap_len: usize,

    pub content: String,

    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    #[must_use]
    pub const fn token_count(&self) -> usize {
        self.metadata.chunk_token_count
    }

    #[must_use]
    pub const fn char_count(&self) -> usize {
        self.metadata.chunk_char_count
    }

    /// Content without the overlap prefix
    #[must_use]
    pub fn own_content(&self) -> &str {
        &self.content[self.overlap_len..]
    }

    /// The overlap prefix shared with the previous chunk
    #[must_use]
    pub fn overlap_content(&self) -> &str {
        &self.content[..self.overlap_len]
    }
}

/// Metadata attached to every chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_filename: String,
    pub document_type: DocumentType,
    #[serde(flatten)]
    pub structure: StructuralMetadata,
    pub chunk_token_count: usize,
    pub chunk_char_count: usize,
    /// Strategy that produced the chunk boundaries
    pub processing_method: String,
    /// Token counts come from the character-ratio estimator, not a tokenizer
    #[serde(default)]
    pub token_count_estimated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_helpers() {
        let span = Span::new(2, 7);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert_eq!(span.slice("hello world"), "llo w");
        assert_eq!(span.extend_to(Span::new(7, 9)), Span::new(2, 9));
        assert!(Span::new(4, 4).is_empty());
    }

    #[test]
    fn test_document_type_detection() {
        assert_eq!(DocumentType::from_filename("report.PDF"), DocumentType::Pdf);
        assert_eq!(DocumentType::from_filename("notes.md"), DocumentType::Markdown);
        assert_eq!(DocumentType::from_filename("page.htm"), DocumentType::Html);
        assert_eq!(DocumentType::from_filename("slides.ppt"), DocumentType::Pptx);
        assert_eq!(DocumentType::from_filename("README"), DocumentType::Unknown);
        assert_eq!(
            DocumentType::from_mime_type("application/vnd.ms-powerpoint"),
            DocumentType::Pptx
        );
        assert_eq!(DocumentType::Unknown.mime_type(), "application/octet-stream");
        assert_eq!(DocumentType::Markdown.as_str(), "md");
    }

    #[test]
    fn test_document_type_serde_names() {
        let json = serde_json::to_string(&DocumentType::Markdown).unwrap();
        assert_eq!(json, "\"md\"");
        let parsed: DocumentType = serde_json::from_str("\"txt\"").unwrap();
        assert_eq!(parsed, DocumentType::Text);
    }

    #[test]
    fn test_extracted_document_builder() {
        let doc = ExtractedDocument::new("doc-1", "paper.pdf", "Body").structure(
            StructuralMetadata {
                page_count: Some(3),
                has_tables: true,
                ..Default::default()
            },
        );
        assert_eq!(doc.document_type, DocumentType::Pdf);
        assert_eq!(doc.full_span(), Span::new(0, 4));
        assert_eq!(doc.structure.page_count, Some(3));
    }

    #[test]
    fn test_chunk_content_views() {
        let chunk = DocumentChunk {
            document_id: "d".to_string(),
            chunk_index: 1,
            start_offset: 4,
            end_offset: 13,
            overlap_len: 4,
            content: "two three".to_string(),
            metadata: ChunkMetadata::default(),
        };
        assert_eq!(chunk.overlap_content(), "two ");
        assert_eq!(chunk.own_content(), "three");
    }
}
