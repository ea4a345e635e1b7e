//! Error types shared across Cueline crates.

use std::path::PathBuf;

/// Top-level error type for Cueline operations.
#[derive(Debug, thiserror::Error)]
pub enum CuelineError {
    /// A persisted transition record could not be decoded.
    #[error("Malformed {category} record: {reason}")]
    MalformedRecord { category: String, reason: String },

    /// A referenced media file does not exist.
    #[error("Media not found: {path}")]
    MissingMedia { path: PathBuf },

    /// The allocator could not find a free scheduling slot.
    #[error("No free timestamp near {requested}ms after {attempts} attempts")]
    TimestampExhausted { requested: u64, attempts: u32 },

    /// A player was touched while it was being torn down.
    #[error("Clock state conflict: {message}")]
    ClockStateConflict { message: String },

    #[error("Unknown transition: {key}")]
    UnknownTransition { key: String },

    #[error("Marker key already in use: {key}")]
    DuplicateKey { key: String },

    #[error("Invalid time range for {key}: start {start_ms}ms, stop {stop_ms}ms")]
    InvalidRange {
        key: String,
        start_ms: u64,
        stop_ms: u64,
    },

    /// The operation does not apply to this kind of transition.
    #[error("{operation} is not supported for {key}")]
    Unsupported { key: String, operation: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Profile error: {message}")]
    Profile { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CuelineError.
pub type CuelineResult<T> = Result<T, CuelineError>;

impl CuelineError {
    pub fn malformed(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            category: category.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_media(path: impl Into<PathBuf>) -> Self {
        Self::MissingMedia { path: path.into() }
    }

    pub fn clock_conflict(msg: impl Into<String>) -> Self {
        Self::ClockStateConflict {
            message: msg.into(),
        }
    }

    pub fn unknown_transition(key: impl Into<String>) -> Self {
        Self::UnknownTransition { key: key.into() }
    }

    pub fn unsupported(key: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            key: key.into(),
            operation: operation.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile {
            message: msg.into(),
        }
    }

    /// Whether the error should be shown to the operator as an actionable
    /// message rather than treated as an internal fault.
    pub fn is_operator_facing(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. }
                | Self::MissingMedia { .. }
                | Self::DuplicateKey { .. }
                | Self::InvalidRange { .. }
                | Self::UnknownTransition { .. }
                | Self::Unsupported { .. }
                | Self::Profile { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_category() {
        let err = CuelineError::malformed("Text", "expected 7 fields, found 3");
        assert_eq!(
            err.to_string(),
            "Malformed Text record: expected 7 fields, found 3"
        );
        assert!(err.is_operator_facing());
    }

    #[test]
    fn test_clock_conflict_is_internal() {
        let err = CuelineError::clock_conflict("seek during teardown");
        assert!(!err.is_operator_facing());
    }
}
