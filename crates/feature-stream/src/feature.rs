//! Feature Vector

use serde::{Deserialize, Serialize};

/// One frame of coefficients with a validity flag and optional label code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    values: Vec<f64>,
    valid: bool,
    label_code: Option<usize>,
}

impl Feature {
    /// Zero-filled, valid feature of `vect_size` coefficients
    pub fn new(vect_size: usize) -> Self {
        Self {
            values: vec![0.0; vect_size],
            valid: true,
            label_code: None,
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            valid: true,
            label_code: None,
        }
    }

    pub fn vect_size(&self) -> usize {
        self.values.len()
    }

    /// Change the dimension; new coefficients are zero
    pub fn set_vect_size(&mut self, vect_size: usize) {
        self.values.resize(vect_size, 0.0);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn label_code(&self) -> Option<usize> {
        self.label_code
    }

    pub fn set_label_code(&mut self, code: Option<usize>) {
        self.label_code = code;
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn set(&mut self, index: usize, value: f64) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Overwrite every coefficient from single-precision samples
    pub(crate) fn load_samples(&mut self, samples: &[f32]) {
        self.values.clear();
        self.values.extend(samples.iter().map(|&v| f64::from(v)));
        self.valid = true;
    }
}

impl Default for Feature {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_valid_and_zeroed() {
        let f = Feature::new(3);
        assert!(f.is_valid());
        assert_eq!(f.values(), &[0.0, 0.0, 0.0]);
        assert_eq!(f.label_code(), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut f = Feature::new(2);
        assert!(f.set(1, 2.5));
        assert!(!f.set(2, 1.0));
        assert_eq!(f.get(1), Some(2.5));
        assert_eq!(f.get(2), None);
    }

    #[test]
    fn test_load_samples_resizes() {
        let mut f = Feature::new(5);
        f.set_valid(false);
        f.load_samples(&[1.0, -0.5]);
        assert!(f.is_valid());
        assert_eq!(f.values(), &[1.0, -0.5]);
    }
}
