//! Resizable Dense Vector

use crate::element::Element;
use crate::error::MatrixError;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Flat, resizable buffer of numeric elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseVector<T> {
    data: Vec<T>,
}

impl<T: Element> DenseVector<T> {
    /// Create an empty vector
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a zero-filled vector of `len` elements
    pub fn with_len(len: usize) -> Self {
        Self::with_value(len, T::ZERO)
    }

    /// Create a vector of `len` copies of `value`
    pub fn with_value(len: usize, value: T) -> Self {
        Self {
            data: vec![value; len],
        }
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Change the length; new slots are zero, surviving slots keep their value
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, T::ZERO);
    }

    pub fn set_all(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Bounds-checked read
    pub fn at(&self, index: usize) -> Result<T, MatrixError> {
        self.data
            .get(index)
            .copied()
            .ok_or(MatrixError::VectorIndexOutOfBounds {
                index,
                len: self.data.len(),
            })
    }

    /// Bounds-checked mutable access
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, MatrixError> {
        let len = self.data.len();
        self.data
            .get_mut(index)
            .ok_or(MatrixError::VectorIndexOutOfBounds { index, len })
    }

    pub fn sum(&self) -> T {
        self.data.iter().fold(T::ZERO, |acc, &v| acc + v)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Index<usize> for DenseVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for DenseVector<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T: Element> From<Vec<T>> for DenseVector<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_keeps_prefix() {
        let mut v = DenseVector::from_vec(vec![1.0f32, 2.0, 3.0]);
        v.resize(5);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 0.0, 0.0]);
        v.resize(2);
        assert_eq!(v.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut v = DenseVector::<f64>::with_len(3);
        *v.at_mut(1).unwrap() = 4.5;
        assert_eq!(v.at(1).unwrap(), 4.5);
        assert!(matches!(
            v.at(3),
            Err(MatrixError::VectorIndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(v.at_mut(10).is_err());
    }

    #[test]
    fn test_set_all_and_sum() {
        let mut v = DenseVector::<f64>::with_value(4, 2.0);
        assert_eq!(v.sum(), 8.0);
        v.set_all(0.5);
        v.push(1.0);
        assert_eq!(v.len(), 5);
        assert_eq!(v.sum(), 3.0);
        v.clear();
        assert!(v.is_empty());
    }
}
