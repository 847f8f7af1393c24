//! Error types for beampix-core.

use thiserror::Error;

/// Result type alias for beampix-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for beampix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pixel pitch must be finite and positive.
    #[error("invalid pixel pitch on {axis} axis: {value}")]
    InvalidPitch { axis: char, value: f64 },

    /// Sensor matrix must have at least one column and row.
    #[error("invalid sensor matrix: {cols} x {rows}")]
    InvalidMatrix { cols: u32, rows: u32 },
}
