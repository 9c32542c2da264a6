//! Failure taxonomy for repository operations.
//!
//! "Not an artifact" is deliberately absent: extractors report it as
//! `Ok(None)` and traversals skip the item.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CaveError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog document {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("request to {url} failed: {detail}")]
    Network { url: String, detail: String },

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("content at {url} too large: {size} bytes (max: {max})")]
    ContentTooLarge { url: String, size: u64, max: u64 },

    #[error("failed to walk {path}: {detail}")]
    Walk { path: PathBuf, detail: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl CaveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaveError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, detail: impl std::fmt::Display) -> Self {
        CaveError::Parse {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn network(url: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        CaveError::Network {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Failures a recursive proxy tolerates on a child link.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            CaveError::Network { .. }
                | CaveError::HttpStatus { .. }
                | CaveError::ContentTooLarge { .. }
                | CaveError::InvalidUrl(_)
                | CaveError::UnsupportedScheme { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CaveError>;
