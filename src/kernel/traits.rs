//! Kernel trait definition

use crate::core::SparseVector;

/// A kernel function `K(x, z)` on sparse vectors.
///
/// Solver code evaluates kernels through [`KernelFunction`], which
/// dispatches to the implementors of this trait.
///
/// [`KernelFunction`]: crate::kernel::KernelFunction
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Compute K(x, y) given `‖x‖²` and `‖y‖²`.
    ///
    /// Kernel matrices cache the squared norms of their rows and call this
    /// instead of [`Kernel::compute`]; only distance-based kernels use them.
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        _x_norm_sq: f64,
        _y_norm_sq: f64,
    ) -> f64 {
        self.compute(x, y)
    }
}
