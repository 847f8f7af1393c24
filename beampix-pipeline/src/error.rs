//! Error types for the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the conversion pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// An external stage process exited with a failure.
    #[error("stage '{stage}' failed: {details}")]
    StageFailed {
        /// Stage name.
        stage: String,
        /// Exit status and captured diagnostics.
        details: String,
    },

    /// A stage was asked to run but its input artifact does not exist.
    #[error("stage '{stage}' is missing its input artifact: {}", path.display())]
    MissingArtifact {
        /// Stage name.
        stage: String,
        /// Expected input path.
        path: PathBuf,
    },

    /// An external tool does not match the required major version.
    #[error("{tool} major version {required} required, found {found}")]
    ToolVersionMismatch {
        /// Tool name.
        tool: String,
        /// Required major version.
        required: u32,
        /// Version actually reported by the tool.
        found: String,
    },

    /// A stage subset named a stage that does not exist.
    #[error("unknown stage '{name}'")]
    UnknownStage {
        /// The unmatched stage name.
        name: String,
    },

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Run log could not be parsed.
    #[error("run log error: {0}")]
    RunLog(#[from] serde_json::Error),

    /// Detector geometry error.
    #[error(transparent)]
    Core(#[from] beampix_core::Error),

    /// Alignment or mask error.
    #[error(transparent)]
    Geo(#[from] beampix_geo::Error),

    /// Store or tree I/O error.
    #[error(transparent)]
    Store(#[from] beampix_io::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
