//! Error types for credential compaction
//!
//! None of these ever reach a caller of the enclosing RPC: every interceptor
//! recovers locally by falling back to the whole credential (or to nothing).

use thiserror::Error;

/// Codec and wire-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompactionError {
    /// Credential does not have exactly three dot-separated segments
    #[error("invalid credential format: expected 3 segments, got {segments}")]
    Format { segments: usize },

    /// Payload segment is not valid base64url, UTF-8 or (4-way) a JSON object
    #[error("failed to decode credential payload: {0}")]
    Decode(String),

    /// Inbound call indicates the decomposed scheme but a field is absent
    #[error("missing metadata field `{0}`")]
    MissingField(&'static str),

    /// Value cannot be carried as ASCII gRPC metadata
    #[error("metadata field `{0}` does not hold a visible ASCII value")]
    InvalidMetadata(&'static str),

    /// Header differs from the configured constant under a header-eliding
    /// scheme and the mismatch policy asks for the whole credential
    #[error("credential header differs from the configured header segment")]
    HeaderMismatch,
}

impl CompactionError {
    /// Short label used for logs and the fallback metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format { .. } => "format",
            Self::Decode(_) => "decode",
            Self::MissingField(_) => "missing_field",
            Self::InvalidMetadata(_) => "invalid_metadata",
            Self::HeaderMismatch => "header_mismatch",
        }
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid compaction configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("header segment must be non-empty base64url text, got {0:?}")]
    InvalidHeaderSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = CompactionError::Format { segments: 2 };
        assert_eq!(
            err.to_string(),
            "invalid credential format: expected 3 segments, got 2"
        );
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let err = CompactionError::MissingField("x-jwt-sig");
        assert!(err.to_string().contains("x-jwt-sig"));
        assert_eq!(err.kind(), "missing_field");
    }
}
