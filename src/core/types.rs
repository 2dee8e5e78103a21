//! Core type definitions for SVM

use crate::core::{Dataset, Result, SVMError};
use serde::{Deserialize, Serialize};

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements (0-based)
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, sorting indices.
    ///
    /// Repeated indices are merged by summing their values, so the result
    /// keeps strictly increasing indices.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        // Sort by indices
        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (idx, value) in pairs {
            match (indices.last(), values.last_mut()) {
                (Some(&last), Some(sum)) if last == idx => *sum += value,
                _ => {
                    indices.push(idx);
                    values.push(value);
                }
            }
        }
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a sparse vector from a dense slice, dropping exact zeros
    pub fn from_dense(dense: &[f64]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Compute L2 norm
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Smallest dense dimension that holds every stored index
    pub fn dim(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    /// Iterate over `(index, value)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Training sample with features and label
#[derive(Clone, Debug)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class label (integer-valued for classification) or regression target
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// A training problem: `l` labels and `l` sparse feature vectors.
///
/// Read-only once built; every formulation borrows it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Problem {
    /// Labels or regression targets
    pub y: Vec<f64>,
    /// Feature vectors, one per label
    pub x: Vec<SparseVector>,
}

impl Problem {
    /// Create a problem from parallel feature and label vectors
    pub fn new(x: Vec<SparseVector>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SVMError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        Ok(Self { y, x })
    }

    /// Create a problem from labelled samples
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            y: samples.iter().map(|s| s.label).collect(),
            x: samples.iter().map(|s| s.features.clone()).collect(),
        }
    }

    /// Collect every sample of a dataset into a problem
    pub fn from_dataset<D: Dataset + ?Sized>(dataset: &D) -> Self {
        let samples: Vec<Sample> = (0..dataset.len()).map(|i| dataset.get_sample(i)).collect();
        Self::from_samples(&samples)
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Check if the problem has no examples
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Largest feature dimension over all examples
    pub fn num_features(&self) -> usize {
        self.x.iter().map(SparseVector::dim).max().unwrap_or(0)
    }

    /// Build a new problem from the examples at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            y: indices.iter().map(|&i| self.y[i]).collect(),
            x: indices.iter().map(|&i| self.x[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_creation() {
        let indices = vec![2, 0, 4];
        let values = vec![2.0, 1.0, 3.0];
        let sv = SparseVector::new(indices, values);

        // Check that indices are sorted
        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sparse_vector_merges_repeated_indices() {
        let sv = SparseVector::new(vec![3, 0, 0], vec![4.0, 1.0, 2.0]);
        assert_eq!(sv.indices, vec![0, 3]);
        assert_eq!(sv.values, vec![3.0, 4.0]);
        assert_eq!(sv.norm_squared(), 25.0);
    }

    #[test]
    fn test_sparse_vector_get() {
        let sv = SparseVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);

        assert_eq!(sv.get(0), 0.0);
        assert_eq!(sv.get(1), 1.0);
        assert_eq!(sv.get(3), 2.0);
        assert_eq!(sv.get(5), 3.0);
        assert_eq!(sv.get(6), 0.0);
    }

    #[test]
    fn test_sparse_vector_norm() {
        let sv = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);
        assert_eq!(sv.norm_squared(), 25.0);
        assert_eq!(sv.norm(), 5.0);
    }

    #[test]
    fn test_sparse_vector_from_dense() {
        let sv = SparseVector::from_dense(&[0.0, 1.5, 0.0, -2.0]);
        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![1.5, -2.0]);
        assert_eq!(sv.dim(), 4);
        assert_eq!(SparseVector::empty().dim(), 0);
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_problem_construction() {
        let x = vec![
            SparseVector::new(vec![0], vec![1.0]),
            SparseVector::new(vec![2], vec![1.0]),
        ];
        let problem = Problem::new(x.clone(), vec![1.0, 2.0]).unwrap();
        assert_eq!(problem.len(), 2);
        assert_eq!(problem.num_features(), 3);

        let sub = problem.subset(&[1]);
        assert_eq!(sub.y, vec![2.0]);
        assert_eq!(sub.x[0], x[1]);

        assert!(matches!(
            Problem::new(x, vec![1.0]),
            Err(SVMError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_problem_from_samples() {
        let samples = vec![
            Sample::new(SparseVector::new(vec![0], vec![1.0]), 3.0),
            Sample::new(SparseVector::new(vec![1], vec![2.0]), 5.0),
        ];
        let problem = Problem::from_samples(&samples);
        assert_eq!(problem.y, vec![3.0, 5.0]);
        assert_eq!(problem.x[1].get(1), 2.0);
    }
}
