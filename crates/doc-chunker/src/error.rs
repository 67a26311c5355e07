use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while chunking a document.
///
/// Every variant aborts the whole operation for the document; no partial
/// chunk list is ever returned alongside an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkerError {
    /// Invalid configuration, rejected before any text is processed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The token counter failed on the given byte range of the document text
    #[error("Tokenization failed for bytes {start}..{end}: {message}")]
    Tokenization {
        start: usize,
        end: usize,
        message: String,
    },

    /// An internal consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Empty (or whitespace-only) document text
    #[error("Empty content provided")]
    EmptyContent,

    /// The caller cancelled the operation
    #[error("Chunking cancelled")]
    Cancelled,
}

/// Coarse classification of a [`ChunkerError`], carried by the failed pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Tokenization,
    InvariantViolation,
    EmptyContent,
    Cancelled,
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a tokenization error for a byte range
    pub fn tokenization(start: usize, end: usize, msg: impl Into<String>) -> Self {
        Self::Tokenization {
            start,
            end,
            message: msg.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::Tokenization { .. } => ErrorKind::Tokenization,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::EmptyContent => ErrorKind::EmptyContent,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ChunkerError::invalid_config("bad").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ChunkerError::tokenization(3, 13, "boom").kind(),
            ErrorKind::Tokenization
        );
        assert_eq!(
            ChunkerError::invariant("gap").kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(ChunkerError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_tokenization_message_names_range() {
        let err = ChunkerError::tokenization(3, 13, "unknown byte");
        assert_eq!(
            err.to_string(),
            "Tokenization failed for bytes 3..13: unknown byte"
        );
    }
}
