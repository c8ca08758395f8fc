//! Matrix Error Types

use file_channel::ChannelError;
use thiserror::Error;

/// Errors raised by vector and matrix operations
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Element access outside `[0, rows) x [0, cols)`
    #[error("Index ({row}, {col}) out of bounds for {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Element access outside `[0, len)`
    #[error("Index {index} out of bounds for vector of length {len}")]
    VectorIndexOutOfBounds { index: usize, len: usize },

    /// Operand shapes are incompatible
    #[error("Dimension mismatch: expected {}x{}, got {}x{}", .expected.0, .expected.1, .actual.0, .actual.1)]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Operation requires a square matrix
    #[error("Matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },

    /// Cholesky pivot was not strictly positive
    #[error("Matrix is not positive definite (pivot {index})")]
    NotPositiveDefinite { index: usize },

    /// Operation is undefined on an empty matrix
    #[error("Matrix has dimension 0")]
    ZeroDimension,

    /// LU decomposition met an all-zero row
    #[error("Matrix is singular (row {row} is zero)")]
    Singular { row: usize },

    /// Malformed persisted matrix
    #[error("Parse error: {0}")]
    Parse(String),

    /// Write failure while persisting
    #[error("I/O error: {0}")]
    Io(String),

    /// Read failure while loading
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl From<std::io::Error> for MatrixError {
    fn from(err: std::io::Error) -> Self {
        MatrixError::Io(err.to_string())
    }
}
