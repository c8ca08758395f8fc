//! Symmetric Square Matrix With Cholesky Inversion
//!
//! Storage is column-major: element `(row, col)` lives at `col * size + row`.
//! Callers only need to populate the upper triangle (`col >= row`); the
//! lower triangle is never read by the factorization.

use crate::error::MatrixError;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Square matrix of doubles intended for symmetric positive-definite data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    size: usize,
    data: Vec<f64>,
}

/// Lower Cholesky factor kept in a column-major scratch buffer
struct Cholesky {
    size: usize,
    /// Strictly lower part holds L, diagonal lives in `diag`
    factor: Vec<f64>,
    diag: Vec<f64>,
}

impl Cholesky {
    #[inline]
    fn lower(&self, row: usize, col: usize) -> f64 {
        self.factor[col * self.size + row]
    }

    fn decompose(source: &SquareMatrix) -> Result<Self, MatrixError> {
        let n = source.size;
        let mut factor = source.data.clone();
        let mut diag = vec![0.0; n];
        for i in 0..n {
            for j in i..n {
                let mut sum = factor[j * n + i];
                for k in 0..i {
                    sum -= factor[k * n + i] * factor[k * n + j];
                }
                if i == j {
                    // NaN fails too
                    if !(sum > 0.0) {
                        debug!("Cholesky pivot {} is {}", i, sum);
                        return Err(MatrixError::NotPositiveDefinite { index: i });
                    }
                    diag[i] = sum.sqrt();
                } else {
                    factor[i * n + j] = sum / diag[i];
                }
            }
        }
        Ok(Self {
            size: n,
            factor,
            diag,
        })
    }

    /// Solve `L Lt x = e_col` for one standard basis column
    fn solve_unit(&self, col: usize, x: &mut [f64]) {
        let n = self.size;
        for i in 0..n {
            let mut sum = if i == col { 1.0 } else { 0.0 };
            for k in 0..i {
                sum -= self.lower(i, k) * x[k];
            }
            x[i] = sum / self.diag[i];
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for k in (i + 1)..n {
                sum -= self.lower(k, i) * x[k];
            }
            x[i] = sum / self.diag[i];
        }
    }

    fn determinant(&self) -> f64 {
        self.diag.iter().map(|d| d * d).product()
    }
}

impl SquareMatrix {
    /// Create a zero-filled `size x size` matrix
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut m = Self::new(size);
        for i in 0..size {
            m.data[i * size + i] = 1.0;
        }
        m
    }

    /// Build from a slice of rows; the input must be square
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let size = rows.len();
        let mut m = Self::new(size);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(MatrixError::NotSquare {
                    rows: size,
                    cols: row.len(),
                });
            }
            for (c, &v) in row.iter().enumerate() {
                m.data[c * size + r] = v;
            }
        }
        Ok(m)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Reallocate to `size x size`; previous content is discarded
    pub fn resize(&mut self, size: usize) {
        self.size = size;
        self.data.clear();
        self.data.resize(size * size, 0.0);
    }

    pub fn set_all(&mut self, value: f64) {
        self.data.fill(value);
    }

    fn check(&self, row: usize, col: usize) -> Result<usize, MatrixError> {
        if row >= self.size || col >= self.size {
            return Err(MatrixError::IndexOutOfBounds {
                row,
                col,
                rows: self.size,
                cols: self.size,
            });
        }
        Ok(col * self.size + row)
    }

    /// Bounds-checked read
    pub fn at(&self, row: usize, col: usize) -> Result<f64, MatrixError> {
        let idx = self.check(row, col)?;
        Ok(self.data[idx])
    }

    /// Bounds-checked mutable access
    pub fn at_mut(&mut self, row: usize, col: usize) -> Result<&mut f64, MatrixError> {
        let idx = self.check(row, col)?;
        Ok(&mut self.data[idx])
    }

    /// Column-major element slice
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn check_output(&self, out: &SquareMatrix) -> Result<(), MatrixError> {
        if self.size == 0 {
            return Err(MatrixError::ZeroDimension);
        }
        if out.size != self.size {
            return Err(MatrixError::DimensionMismatch {
                expected: (self.size, self.size),
                actual: (out.size, out.size),
            });
        }
        Ok(())
    }

    /// Invert into `out` through Cholesky decomposition
    ///
    /// Returns the determinant of `self`. `out` receives the full symmetric
    /// inverse.
    pub fn invert(&self, out: &mut SquareMatrix) -> Result<f64, MatrixError> {
        self.check_output(out)?;
        let chol = Cholesky::decompose(self)?;

        let n = self.size;
        let mut x = vec![0.0; n];
        for col in 0..n {
            chol.solve_unit(col, &mut x);
            out.data[col * n..(col + 1) * n].copy_from_slice(&x);
        }
        Ok(chol.determinant())
    }

    /// Allocate and return the inverse
    pub fn inverse(&self) -> Result<SquareMatrix, MatrixError> {
        let mut out = SquareMatrix::new(self.size);
        self.invert(&mut out)?;
        Ok(out)
    }

    /// Write the upper Cholesky factor `U` (with `self = Ut U`) into `out`
    ///
    /// The strictly lower triangle of `out` is zeroed.
    pub fn upper_cholesky(&self, out: &mut SquareMatrix) -> Result<(), MatrixError> {
        self.check_output(out)?;
        let chol = Cholesky::decompose(self)?;

        let n = self.size;
        out.set_all(0.0);
        for row in 0..n {
            out.data[row * n + row] = chol.diag[row];
            for col in (row + 1)..n {
                out.data[col * n + row] = chol.lower(col, row);
            }
        }
        Ok(())
    }

    /// Determinant from the Cholesky diagonal
    pub fn determinant(&self) -> Result<f64, MatrixError> {
        if self.size == 0 {
            return Err(MatrixError::ZeroDimension);
        }
        Ok(Cholesky::decompose(self)?.determinant())
    }

    /// Copy into a general row-major matrix
    pub fn to_matrix(&self) -> Matrix<f64> {
        let n = self.size;
        let mut m = Matrix::new(n, n);
        for row in 0..n {
            for col in 0..n {
                m[(row, col)] = self.data[col * n + row];
            }
        }
        m
    }

    /// Element-wise comparison within an absolute tolerance
    pub fn approx_eq(&self, other: &SquareMatrix, tolerance: f64) -> bool {
        self.size == other.size
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl TryFrom<&Matrix<f64>> for SquareMatrix {
    type Error = MatrixError;

    fn try_from(m: &Matrix<f64>) -> Result<Self, MatrixError> {
        if !m.is_square() {
            return Err(MatrixError::NotSquare {
                rows: m.rows(),
                cols: m.cols(),
            });
        }
        let n = m.rows();
        let mut out = SquareMatrix::new(n);
        for row in 0..n {
            for col in 0..n {
                out.data[col * n + row] = m[(row, col)];
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(rows: &[&[f64]]) -> SquareMatrix {
        SquareMatrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    fn assert_round_trip(m: &SquareMatrix) {
        let inv = m.inverse().unwrap();
        let back = inv.inverse().unwrap();
        let scale = m.as_slice().iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
        assert!(
            back.approx_eq(m, 1e-12 * scale),
            "round trip drifted: {:?} vs {:?}",
            back,
            m
        );
    }

    #[test]
    fn test_round_trip_1x1() {
        let m = sq(&[&[4.0]]);
        let mut inv = SquareMatrix::new(1);
        let det = m.invert(&mut inv).unwrap();
        assert_eq!(det, 4.0);
        assert_eq!(inv.at(0, 0).unwrap(), 0.25);
        assert_round_trip(&m);
    }

    #[test]
    fn test_round_trip_2x2() {
        let m = sq(&[&[30.0, 20.0], &[20.0, 36.0]]);
        let mut inv = SquareMatrix::new(2);
        let det = m.invert(&mut inv).unwrap();
        assert!((det - 680.0).abs() < 1e-10);
        assert!((inv.at(0, 0).unwrap() - 36.0 / 680.0).abs() < 1e-15);
        assert!((inv.at(0, 1).unwrap() + 20.0 / 680.0).abs() < 1e-15);
        assert!((inv.at(1, 0).unwrap() + 20.0 / 680.0).abs() < 1e-15);
        assert_round_trip(&m);
    }

    #[test]
    fn test_round_trip_3x3() {
        let m = sq(&[&[4.0, 1.0, 0.5], &[1.0, 3.0, 0.25], &[0.5, 0.25, 2.0]]);
        let det = m.determinant().unwrap();
        assert!((det - 21.25).abs() < 1e-12);
        assert_round_trip(&m);
    }

    #[test]
    fn test_round_trip_4x4() {
        let m = sq(&[
            &[5.0, 1.0, 0.0, 0.5],
            &[1.0, 4.0, 1.0, 0.0],
            &[0.0, 1.0, 3.0, 0.5],
            &[0.5, 0.0, 0.5, 2.0],
        ]);
        assert_round_trip(&m);

        let inv = m.inverse().unwrap();
        let product = m.to_matrix().multiply(&inv.to_matrix()).unwrap();
        assert!(product.approx_eq(&Matrix::identity(4), 1e-13));
    }

    #[test]
    fn test_upper_triangle_is_enough() {
        let full = sq(&[&[30.0, 20.0], &[20.0, 36.0]]);
        let upper = sq(&[&[30.0, 20.0], &[0.0, 36.0]]);
        assert!(full.inverse().unwrap().approx_eq(&upper.inverse().unwrap(), 0.0));
    }

    #[test]
    fn test_agrees_with_lu_determinant() {
        let m = sq(&[
            &[5.0, 1.0, 0.0, 0.5],
            &[1.0, 4.0, 1.0, 0.0],
            &[0.0, 1.0, 3.0, 0.5],
            &[0.5, 0.0, 0.5, 2.0],
        ]);
        let lu_det = m.to_matrix().determinant().unwrap();
        assert!((m.determinant().unwrap() - lu_det).abs() < 1e-10);
    }

    #[test]
    fn test_upper_cholesky_reconstructs() {
        let m = sq(&[&[4.0, 12.0, -16.0], &[12.0, 37.0, -43.0], &[-16.0, -43.0, 98.0]]);
        let mut u = SquareMatrix::new(3);
        m.upper_cholesky(&mut u).unwrap();

        let expected = sq(&[&[2.0, 6.0, -8.0], &[0.0, 1.0, 5.0], &[0.0, 0.0, 3.0]]);
        assert!(u.approx_eq(&expected, 1e-12));

        let u = u.to_matrix();
        let rebuilt = u.transpose().multiply(&u).unwrap();
        assert!(rebuilt.approx_eq(&m.to_matrix(), 1e-12));
    }

    #[test]
    fn test_zero_dimension() {
        let m = SquareMatrix::new(0);
        let mut out = SquareMatrix::new(0);
        assert!(matches!(m.invert(&mut out), Err(MatrixError::ZeroDimension)));
        assert!(matches!(m.upper_cholesky(&mut out), Err(MatrixError::ZeroDimension)));
        assert!(matches!(m.determinant(), Err(MatrixError::ZeroDimension)));
    }

    #[test]
    fn test_output_dimension_mismatch() {
        let m = SquareMatrix::identity(3);
        let mut out = SquareMatrix::new(2);
        assert!(matches!(
            m.invert(&mut out),
            Err(MatrixError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_not_positive_definite() {
        let negative = sq(&[&[-1.0, 0.0], &[0.0, 1.0]]);
        assert!(matches!(
            negative.inverse(),
            Err(MatrixError::NotPositiveDefinite { index: 0 })
        ));

        // Symmetric but indefinite: second pivot is 1 - 4 = -3
        let indefinite = sq(&[&[1.0, 2.0], &[2.0, 1.0]]);
        assert!(matches!(
            indefinite.inverse(),
            Err(MatrixError::NotPositiveDefinite { index: 1 })
        ));
    }

    #[test]
    fn test_row_col_addressing() {
        let mut m = SquareMatrix::new(2);
        *m.at_mut(0, 1).unwrap() = 3.0;
        assert_eq!(m.at(0, 1).unwrap(), 3.0);
        assert_eq!(m.at(1, 0).unwrap(), 0.0);
        assert_eq!(m.to_matrix()[(0, 1)], 3.0);
        assert!(m.at(2, 0).is_err());

        let back = SquareMatrix::try_from(&m.to_matrix()).unwrap();
        assert_eq!(back, m);
        assert!(SquareMatrix::try_from(&Matrix::new(2, 3)).is_err());
    }
}
