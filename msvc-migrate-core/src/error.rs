//! Error types for the migration engine

use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentError;

/// Result alias used throughout the migration engine
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors raised while migrating a directory tree
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A project file could not be parsed or serialized
    #[error("{}: {source}", .path.display())]
    Document {
        path:   PathBuf,
        #[source]
        source: DocumentError,
    },

    /// A directory in the tree could not be enumerated
    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A rule selector is malformed
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    /// A file-name pattern could not be compiled
    #[error("invalid file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source:  regex::Error,
    },

    /// The configuration file is not valid TOML for this tool
    #[error("failed to parse configuration {}: {source}", .path.display())]
    ConfigParse {
        path:   PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration is well-formed but describes an unusable rule
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MigrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.to_string(),
            reason:   reason.into(),
        }
    }
}
