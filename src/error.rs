//! Error types for once-again
//!
//! All modules use `OnceAgainResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for once-again operations
pub type OnceAgainResult<T> = Result<T, OnceAgainError>;

/// All errors that can occur in once-again
#[derive(Error, Debug)]
pub enum OnceAgainError {
    // Callable resolution errors
    #[error("Unsupported callable `{name}`: {reason}")]
    UnsupportedCallableKind { name: String, reason: String },

    #[error("Keyword argument `{0}` given more than once")]
    DuplicateKeyword(String),

    // Cache errors
    #[error("Cache path {0} exists but is not a directory")]
    CacheDirectoryConflict(PathBuf),

    #[error("Cache entry not found: {0}")]
    EntryNotFound(PathBuf),

    #[error("Corrupt cache entry {path}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },

    #[error("Result for {path} cannot be stored: {reason}")]
    UnstorableResult { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    User(String),
}

impl OnceAgainError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a corrupt entry error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported callable error
    pub fn unsupported(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedCallableKind {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only means "recompute": the entry is absent or unusable
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::EntryNotFound(_) | Self::CorruptEntry { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedCallableKind { .. } => {
                Some("Give closures and function pointers an explicit name: Function::named(\"name\", f)")
            }
            Self::CacheDirectoryConflict(_) => {
                Some("Remove the file or point cache.root at a different directory")
            }
            Self::CorruptEntry { .. } => Some("Run: once-again gc (removes unreadable entries)"),
            Self::ConfigInvalid { .. } => Some("Run: once-again config init --force"),
            _ => None,
        }
    }
}
