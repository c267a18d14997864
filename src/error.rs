//! Failure taxonomy shared by every stage of a run.
//!
//! Stage-specific errors (`FetchError`, `ExtractError`, `OracleError`) live next to
//! the code that produces them; each maps onto a [`FailureKind`] so reports can
//! record what went wrong without carrying the error values around.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    FetchError,
    ExtractError,
    EmptyDocument,
    TransientError,
    QuotaExceeded,
    InvalidResponse,
    Rejected,
    PersistError,
    Cancelled,
    ConfigError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FetchError => "FetchError",
            FailureKind::ExtractError => "ExtractError",
            FailureKind::EmptyDocument => "EmptyDocument",
            FailureKind::TransientError => "TransientError",
            FailureKind::QuotaExceeded => "QuotaExceeded",
            FailureKind::InvalidResponse => "InvalidResponse",
            FailureKind::Rejected => "Rejected",
            FailureKind::PersistError => "PersistError",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::ConfigError => "ConfigError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preconditions that abort a run before any source is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not found: set the {env} environment variable")]
    MissingCredential { env: String },

    #[error("API key in {env} is still the template placeholder")]
    PlaceholderCredential { env: String },

    #[error("failed to read source list {path}: {source}")]
    SourceList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid URLs found in {path}; add one URL per line")]
    NoSources { path: PathBuf },

    #[error("invalid normalize pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ConfigError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ConfigError
    }
}
