//! LU Decomposition With Scaled Partial Pivoting
//!
//! Operates on a row-major `n x n` slice. The decomposition overwrites the
//! input with L (unit diagonal, below) and U (on and above the diagonal).

use crate::element::Element;
use crate::error::MatrixError;

/// Substitute for an exactly zero pivot
const TINY: f64 = 1.0e-20;

/// Row permutation produced by [`decompose`]
pub(crate) struct Pivots {
    /// Row swapped with row `j` at step `j`
    pub(crate) index: Vec<usize>,
    /// `1` for an even number of swaps, `-1` for odd
    pub(crate) parity: f64,
}

/// Factor `a` in place
///
/// Pivot rows are chosen by the largest element relative to its row's
/// largest magnitude. A zero pivot is replaced by [`TINY`] rather than
/// failing, so only an all-zero row is reported as singular.
pub(crate) fn decompose<T: Element>(a: &mut [T], n: usize) -> Result<Pivots, MatrixError> {
    let mut scale = vec![T::ZERO; n];
    for (i, s) in scale.iter_mut().enumerate() {
        let row = &a[i * n..(i + 1) * n];
        let big = row
            .iter()
            .map(|v| v.abs())
            .fold(T::ZERO, |acc, v| if v > acc { v } else { acc });
        if big == T::ZERO {
            return Err(MatrixError::Singular { row: i });
        }
        *s = T::ONE / big;
    }

    let mut index = vec![0usize; n];
    let mut parity = 1.0;
    for j in 0..n {
        for i in 0..j {
            let mut sum = a[i * n + j];
            for k in 0..i {
                sum -= a[i * n + k] * a[k * n + j];
            }
            a[i * n + j] = sum;
        }

        let mut big = T::ZERO;
        let mut imax = j;
        for i in j..n {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= a[i * n + k] * a[k * n + j];
            }
            a[i * n + j] = sum;
            let dum = scale[i] * sum.abs();
            if dum >= big {
                big = dum;
                imax = i;
            }
        }

        if j != imax {
            for k in 0..n {
                a.swap(imax * n + k, j * n + k);
            }
            parity = -parity;
            scale[imax] = scale[j];
        }
        index[j] = imax;

        if a[j * n + j] == T::ZERO {
            a[j * n + j] = T::from_f64(TINY);
        }
        if j + 1 != n {
            let dum = T::ONE / a[j * n + j];
            for i in (j + 1)..n {
                a[i * n + j] *= dum;
            }
        }
    }

    Ok(Pivots { index, parity })
}

/// Solve `A x = b` in place given the output of [`decompose`]
pub(crate) fn back_substitute<T: Element>(lu: &[T], n: usize, pivots: &Pivots, b: &mut [T]) {
    let mut first_nonzero: Option<usize> = None;
    for i in 0..n {
        let ip = pivots.index[i];
        let mut sum = b[ip];
        b[ip] = b[i];
        if let Some(start) = first_nonzero {
            for j in start..i {
                sum -= lu[i * n + j] * b[j];
            }
        } else if sum != T::ZERO {
            first_nonzero = Some(i);
        }
        b[i] = sum;
    }

    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= lu[i * n + j] * b[j];
        }
        b[i] = sum / lu[i * n + i];
    }
}
