//! Artifact I/O error types.

use thiserror::Error;

/// Result type for artifact I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Artifact I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Invalid artifact layout.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] beampix_core::Error),

    /// Geometry/alignment error.
    #[error("geometry error: {0}")]
    Geo(#[from] beampix_geo::Error),
}
