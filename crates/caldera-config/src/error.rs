//! Errors surfaced by the settings file.

use std::path::PathBuf;

/// Failures while persisting or restoring engine settings.
///
/// Every filesystem variant carries the offending path, since the settings
/// file location is caller-chosen.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("could not read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file or its parent directory could not be written.
    #[error("could not write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's RON content does not describe a valid settings tree.
    #[error("malformed settings file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// The in-memory settings could not be rendered as RON.
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}
