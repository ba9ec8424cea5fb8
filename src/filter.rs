//! Finite impulse response filters applied to most-recent-first histories.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::error::SimError;

/// A low-pass filter given by its coefficients.
///
/// The first coefficient weighs the most recent value of the history it is applied to.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Filter {
    coefficients: Vec<f64>,
}

impl Default for Filter {
    /// The identity filter, i.e., a single unit coefficient.
    fn default() -> Self {
        Filter {
            coefficients: vec![1.0],
        }
    }
}

impl Filter {
    /// Create a new filter with the given coefficients.
    /// The function returns an error if there is no coefficient.
    pub fn build(coefficients: Vec<f64>) -> Result<Self, SimError> {
        if coefficients.is_empty() {
            return Err(SimError::EmptyFilter);
        }
        Ok(Filter { coefficients })
    }

    /// Create a filter of the given size with unit coefficients.
    pub fn ones(size: usize) -> Result<Self, SimError> {
        Filter::build(vec![1.0; size])
    }

    /// Replace the filter coefficients.
    /// The function returns an error (and leaves the filter untouched) if there is no coefficient.
    pub fn set_coefficients(&mut self, coefficients: Vec<f64>) -> Result<(), SimError> {
        if coefficients.is_empty() {
            return Err(SimError::EmptyFilter);
        }
        self.coefficients = coefficients;
        Ok(())
    }

    /// Returns a slice of the filter coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients[..]
    }

    /// Returns the number of coefficients.
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// Always false for a filter obtained through `build`.
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Apply the filter to a most-recent-first history.
    /// Missing history entries count as zero.
    pub fn apply<'a, I>(&self, history: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        self.coefficients
            .iter()
            .zip(history)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Apply the filter to a queue whose front holds the most recent value.
    pub fn apply_queue(&self, queue: &VecDeque<f64>) -> f64 {
        self.apply(queue.iter())
    }
}

/// Returns the discrete convolution of two filters scaled by the time step, i.e.,
/// `out[i + j] += f1[i] * f2[j] * delta_t`.
pub fn convolve(f1: &Filter, f2: &Filter, delta_t: f64) -> Filter {
    let mut out = vec![0.0; f1.len() + f2.len() - 1];
    for (i, a) in f1.coefficients().iter().enumerate() {
        for (j, b) in f2.coefficients().iter().enumerate() {
            out[i + j] += a * b * delta_t;
        }
    }
    Filter { coefficients: out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_build_empty_filter() {
        assert_eq!(Filter::build(vec![]), Err(SimError::EmptyFilter));
        assert_eq!(Filter::ones(0), Err(SimError::EmptyFilter));

        let mut filter = Filter::default();
        assert_eq!(filter.set_coefficients(vec![]), Err(SimError::EmptyFilter));
        assert_eq!(filter.coefficients(), &[1.0]);
    }

    #[test]
    fn test_apply() {
        let filter = Filter::build(vec![0.5, 0.25, 0.125]).unwrap();
        let history = VecDeque::from(vec![1.0, 2.0, 4.0, 8.0]);
        assert_relative_eq!(filter.apply_queue(&history), 1.5);

        // Short histories are padded with zeros
        assert_relative_eq!(filter.apply(&[2.0]), 1.0);
        assert_relative_eq!(filter.apply(&[]), 0.0);
    }

    #[test]
    fn test_convolve() {
        let f1 = Filter::build(vec![1.0, 2.0]).unwrap();
        let f2 = Filter::build(vec![1.0, 0.5, 0.25]).unwrap();
        let out = convolve(&f1, &f2, 2.0);
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out.coefficients()[0], 2.0);
        assert_relative_eq!(out.coefficients()[1], 5.0);
        assert_relative_eq!(out.coefficients()[2], 2.5);
        assert_relative_eq!(out.coefficients()[3], 1.0);
    }
}
