//! Error types for beampix-geo.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for beampix-geo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry and alignment error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested alignment step has not produced its geometry file.
    #[error("no alignment for step '{step}': {} does not exist", path.display())]
    MissingAlignment { step: String, path: PathBuf },

    /// The pre-alignment geometry file is absent.
    #[error("geometry file does not exist: {}", path.display())]
    MissingGeometry { path: PathBuf },

    /// A plane has no sensor entry in the alignment file.
    #[error("alignment step '{step}' has no sensor {sensor}")]
    MissingSensor { step: String, sensor: usize },

    /// No alignment steps are configured.
    #[error("no alignment steps configured")]
    NoAlignmentSteps,

    /// The pixel mask file is absent.
    #[error("mask file does not exist: {}", path.display())]
    MissingMask { path: PathBuf },

    /// The rotation's planar projection cannot be inverted.
    #[error("degenerate alignment rotation (det = {det})")]
    DegenerateTransform { det: f64 },

    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("toml serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
