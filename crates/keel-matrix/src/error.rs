//! Error types for matrix resolution

use thiserror::Error;

/// Result type alias for keel-matrix
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Errors raised while refreshing, reading or filtering the release matrix
///
/// `Fetch` and `NoMatch` end a run. `Parse` is reported per release and the
/// release is skipped.
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Upstream unreachable or answered with a non-success status
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Release tag does not carry a dotted numeric version
    #[error("Malformed version tag '{tag}': {reason}")]
    Parse { tag: String, reason: String },

    /// Filters left nothing to act on
    #[error("No build targets match {filters}")]
    NoMatch { filters: String },

    /// Asset cache could not be read or written
    #[error("Asset cache error for '{key}': {reason}")]
    Cache { key: String, reason: String },

    /// Persisted matrix artifact missing or unreadable
    #[error("Failed to read matrix {path}: {reason}")]
    Matrix { path: String, reason: String },

    /// Configuration problem (bad pattern, unknown variant)
    #[error(transparent)]
    Config(#[from] keel_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    pub fn fetch(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn parse(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    pub fn no_match(filters: impl Into<String>) -> Self {
        Self::NoMatch {
            filters: filters.into(),
        }
    }

    pub fn cache(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cache {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn matrix(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Matrix {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed
    ///
    /// Transport failures, 5xx and 429 are transient; other statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            MatrixError::Fetch { status: None, .. } => true,
            MatrixError::Fetch {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
