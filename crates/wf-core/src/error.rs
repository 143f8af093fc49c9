//! # Configuration Errors
//!
//! Every failure the settings loader can produce. Start-up treats all of
//! them as fatal, so each variant carries enough context for an operator
//! to fix the deployment without reading source.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating [`Settings`](crate::Settings).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A settings file exists but could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid JSON.
    #[error("malformed settings file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A settings file parsed, but its top level is not a JSON object.
    #[error("settings file {path} must contain a JSON object at the top level")]
    NotAnObject { path: PathBuf },

    /// One or more keys are missing or carry unusable values.
    ///
    /// Every problem found is listed, not just the first one.
    #[error("invalid configuration: {}", .problems.join("; "))]
    Invalid { problems: Vec<String> },
}

impl ConfigError {
    /// The individual problems behind an [`ConfigError::Invalid`], or an
    /// empty slice for file-level errors.
    pub fn problems(&self) -> &[String] {
        match self {
            Self::Invalid { problems } => problems,
            _ => &[],
        }
    }
}
