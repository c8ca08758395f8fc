//! Dense Linear Algebra Kernel
//!
//! Resizable numeric vectors, a general row-major matrix with LU-based
//! inversion, and a symmetric square matrix with Cholesky-based inversion.
//!
//! Both matrix types address elements as `(row, col)`.

mod element;
mod error;
mod lu;
mod matrix;
mod persist;
mod square;
mod vector;

pub use element::Element;
pub use error::MatrixError;
pub use matrix::Matrix;
pub use square::SquareMatrix;
pub use vector::DenseVector;

/// Double precision matrix, the common case for model parameters
pub type DoubleMatrix = Matrix<f64>;
/// Single precision vector, the storage type of feature buffers
pub type FloatVector = DenseVector<f32>;
/// Double precision vector
pub type DoubleVector = DenseVector<f64>;
