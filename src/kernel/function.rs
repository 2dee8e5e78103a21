//! Closed kernel dispatch and the permutable kernel matrix used by the solver

use crate::core::{KernelType, SparseVector, SvmParameter};
use crate::kernel::{Kernel, LinearKernel, PolynomialKernel, RBFKernel, SigmoidKernel};

/// One of the four supported kernels, chosen from [`SvmParameter`].
///
/// Dispatch is a `match`, so the hot loop never goes through a vtable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
}

impl KernelFunction {
    /// Build the kernel named by `param.kernel_type` with its hyperparameters.
    ///
    /// `param.gamma` is used as-is; resolve a zero gamma first
    /// (see [`SvmParameter::resolved_for`]).
    pub fn from_parameter(param: &SvmParameter) -> Self {
        match param.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => KernelFunction::Polynomial(PolynomialKernel::new(
                param.degree,
                param.gamma,
                param.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(param.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(param.gamma, param.coef0))
            }
        }
    }

    /// Whether `compute_with_norms` makes use of squared norms
    pub fn uses_norms(&self) -> bool {
        matches!(self, KernelFunction::Rbf(_))
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Polynomial(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            other => other.compute(x, y),
        }
    }
}

/// Kernel evaluations over a training set whose order the solver permutes.
///
/// Holds borrowed vectors plus their squared norms, both swapped in step
/// with the solver's active set.
#[derive(Debug, Clone)]
pub struct KernelMatrix<'a> {
    kernel: KernelFunction,
    x: Vec<&'a SparseVector>,
    x_square: Vec<f64>,
}

impl<'a> KernelMatrix<'a> {
    pub fn new(kernel: KernelFunction, x: Vec<&'a SparseVector>) -> Self {
        let x_square = if kernel.uses_norms() {
            x.iter().map(|v| v.norm_squared()).collect()
        } else {
            vec![0.0; x.len()]
        };
        Self {
            kernel,
            x,
            x_square,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// K(x_i, x_j) in the current order
    #[inline]
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        self.kernel
            .compute_with_norms(self.x[i], self.x[j], self.x_square[i], self.x_square[j])
    }

    pub fn swap_index(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        self.x_square.swap(i, j);
    }
}
