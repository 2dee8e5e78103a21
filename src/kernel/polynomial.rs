//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::SparseVector;
use crate::kernel::linear::dot;
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialKernel {
    /// Scaling factor for the dot product
    pub gamma: f64,
    /// Independent term in the polynomial
    pub coef0: f64,
    /// Degree of the polynomial
    pub degree: i32,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Examples
    /// ```
    /// use svmkit::kernel::{Kernel, PolynomialKernel};
    /// use svmkit::SparseVector;
    ///
    /// // Quadratic kernel: (x·y + 1)²
    /// let kernel = PolynomialKernel::new(2, 1.0, 1.0);
    /// let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
    /// let y = SparseVector::new(vec![0, 1], vec![2.0, 1.0]);
    /// assert_eq!(kernel.compute(&x, &y), 25.0);
    /// ```
    pub fn new(degree: i32, gamma: f64, coef0: f64) -> Self {
        Self {
            gamma,
            coef0,
            degree,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        powi(self.gamma * dot(x, y) + self.coef0, self.degree)
    }
}

/// Integer power by repeated squaring.
///
/// Negative bases are kept as-is (odd degrees give negative kernel values).
/// A non-positive exponent yields 1.
pub fn powi(base: f64, times: i32) -> f64 {
    let mut tmp = base;
    let mut ret = 1.0;
    let mut t = times;
    while t > 0 {
        if t % 2 == 1 {
            ret *= tmp;
        }
        tmp *= tmp;
        t /= 2;
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_kernel_computation() {
        let kernel = PolynomialKernel::new(2, 1.0, 1.0);

        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![2.0, 1.0]);

        // Dot product: 4, kernel: (4 + 1)² = 25
        assert_relative_eq!(kernel.compute(&x, &y), 25.0, epsilon = 1e-10);
    }

    #[test]
    fn test_polynomial_kernel_same_vector() {
        let kernel = PolynomialKernel::new(3, 0.5, 2.0);
        let x = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);

        // (0.5 * 25 + 2.0)³ = 14.5³
        assert_relative_eq!(kernel.compute(&x, &x), 3048.625, epsilon = 1e-6);
    }

    #[test]
    fn test_polynomial_kernel_negative_base() {
        let kernel = PolynomialKernel::new(3, 1.0, -2.0);
        let x = SparseVector::new(vec![0], vec![1.0]);

        // (1 - 2)³ = -1
        assert_relative_eq!(kernel.compute(&x, &x), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polynomial_kernel_high_degree() {
        let kernel = PolynomialKernel::new(5, 0.1, 1.0);

        let x = SparseVector::new(vec![0], vec![2.0]);
        let y = SparseVector::new(vec![0], vec![3.0]);

        // 1.6⁵
        assert_relative_eq!(kernel.compute(&x, &y), 10.48576, epsilon = 1e-10);
    }

    #[test]
    fn test_powi() {
        assert_eq!(powi(2.0, 0), 1.0);
        assert_eq!(powi(2.0, 1), 2.0);
        assert_eq!(powi(2.0, 10), 1024.0);
        assert_eq!(powi(-3.0, 3), -27.0);
        assert_eq!(powi(5.0, -1), 1.0);
    }
}
