//! General Dense Matrix

use crate::element::Element;
use crate::error::MatrixError;
use crate::lu;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Dense `rows x cols` matrix stored row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// Create a zero-filled matrix
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::ZERO; rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut m = Self::new(size, size);
        for i in 0..size {
            m.data[i * size + i] = T::ONE;
        }
        m
    }

    /// Build from row-major data of exactly `rows * cols` elements
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::DimensionMismatch {
                expected: (rows, cols),
                actual: (1, data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a slice of equally long rows
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MatrixError::DimensionMismatch {
                    expected: (rows.len(), cols),
                    actual: (rows.len(), row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reallocate to `rows x cols`; previous content is discarded
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, T::ZERO);
    }

    pub fn set_all(&mut self, value: T) {
        self.data.fill(value);
    }

    fn check(&self, row: usize, col: usize) -> Result<usize, MatrixError> {
        if row >= self.rows || col >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Bounds-checked read
    pub fn at(&self, row: usize, col: usize) -> Result<T, MatrixError> {
        let idx = self.check(row, col)?;
        Ok(self.data[idx])
    }

    /// Bounds-checked mutable access
    pub fn at_mut(&mut self, row: usize, col: usize) -> Result<&mut T, MatrixError> {
        let idx = self.check(row, col)?;
        Ok(&mut self.data[idx])
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Row-major element slice
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Standard product `self * other`
    pub fn multiply(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatrixError> {
        if self.cols != other.rows {
            // Shape of the right operand
            return Err(MatrixError::DimensionMismatch {
                expected: (self.cols, other.cols),
                actual: (other.rows, other.cols),
            });
        }
        let mut out = Matrix::new(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = T::ZERO;
                for k in 0..self.cols {
                    sum += self.data[i * self.cols + k] * other.data[k * other.cols + j];
                }
                out.data[i * other.cols + j] = sum;
            }
        }
        Ok(out)
    }

    fn zip_with(&self, other: &Matrix<T>, f: impl Fn(T, T) -> T) -> Result<Matrix<T>, MatrixError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(MatrixError::DimensionMismatch {
                expected: (self.rows, self.cols),
                actual: (other.rows, other.cols),
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    pub fn add(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatrixError> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn subtract(&self, other: &Matrix<T>) -> Result<Matrix<T>, MatrixError> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn scale(&mut self, factor: T) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Out-of-place transpose
    pub fn transpose(&self) -> Matrix<T> {
        let mut out = Matrix::new(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        out
    }

    /// In-place transpose by following permutation cycles
    pub fn transpose_in_place(&mut self) {
        let (rows, cols) = (self.rows, self.cols);
        if rows == cols {
            for i in 0..rows {
                for j in (i + 1)..cols {
                    self.data.swap(i * cols + j, j * cols + i);
                }
            }
        } else {
            let len = self.data.len();
            let mut visited = vec![false; len];
            for start in 0..len {
                if visited[start] {
                    continue;
                }
                let mut cur = start;
                let mut carry = self.data[start];
                loop {
                    // (cur / cols, cur % cols) moves to (cur % cols, cur / cols)
                    let next = (cur % cols) * rows + cur / cols;
                    std::mem::swap(&mut self.data[next], &mut carry);
                    visited[next] = true;
                    cur = next;
                    if cur == start {
                        break;
                    }
                }
            }
        }
        self.rows = cols;
        self.cols = rows;
    }

    /// Inverse through LU decomposition with scaled partial pivoting
    pub fn invert(&self) -> Result<Matrix<T>, MatrixError> {
        let n = self.square_size()?;
        let mut lu_data = self.data.clone();
        let pivots = lu::decompose(&mut lu_data, n)?;

        let mut out = Matrix::new(n, n);
        let mut column = vec![T::ZERO; n];
        for j in 0..n {
            column.fill(T::ZERO);
            column[j] = T::ONE;
            lu::back_substitute(&lu_data, n, &pivots, &mut column);
            for (i, &v) in column.iter().enumerate() {
                out.data[i * n + j] = v;
            }
        }
        Ok(out)
    }

    /// Determinant through LU decomposition
    pub fn determinant(&self) -> Result<T, MatrixError> {
        let n = self.square_size()?;
        let mut lu_data = self.data.clone();
        let pivots = match lu::decompose(&mut lu_data, n) {
            Ok(p) => p,
            Err(MatrixError::Singular { .. }) => return Ok(T::ZERO),
            Err(err) => return Err(err),
        };
        let mut det = T::from_f64(pivots.parity);
        for i in 0..n {
            det *= lu_data[i * n + i];
        }
        Ok(det)
    }

    fn square_size(&self) -> Result<usize, MatrixError> {
        if !self.is_square() {
            return Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.rows == 0 {
            return Err(MatrixError::ZeroDimension);
        }
        Ok(self.rows)
    }

    /// Element-wise comparison within an absolute tolerance
    pub fn approx_eq(&self, other: &Matrix<T>, tolerance: T) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(&a, &b)| (a - b).abs() <= tolerance)
    }

    /// Largest absolute element, zero for an empty matrix
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .map(|v| v.abs())
            .fold(T::ZERO, |acc, v| if v > acc { v } else { acc })
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &mut self.data[row * self.cols + col]
    }
}
