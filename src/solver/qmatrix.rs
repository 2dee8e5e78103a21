//! Q matrices seen by the SMO solver
//!
//! Each formulation presents its quadratic term through [`QMatrix`]:
//! - [`SvcQ`]: `Q_ij = y_i y_j K(x_i, x_j)` for classification
//! - [`OneClassQ`]: `Q_ij = K(x_i, x_j)`
//! - [`SvrQ`]: a `2l × 2l` matrix over `l` training vectors, where the
//!   first `l` variables carry sign `+1` and the second `l` sign `-1`
//!
//! Rows are produced lazily through a [`RowCache`]; the diagonal is
//! computed once up front and never evicted.

use crate::cache::{CacheStats, RowCache};
use crate::core::SparseVector;
use crate::kernel::{KernelFunction, KernelMatrix};

/// Quadratic term of the dual problem, addressed in the solver's permuted order
pub trait QMatrix {
    /// Row `i`, valid for its first `len` entries
    fn get_q(&mut self, i: usize, len: usize) -> &[f64];

    /// `Q_ii` for every variable
    fn diagonal(&self) -> &[f64];

    /// Exchange variables `i` and `j` everywhere the matrix keeps per-variable state
    fn swap_index(&mut self, i: usize, j: usize);

    /// Counters of the underlying row cache
    fn cache_stats(&self) -> CacheStats;
}

/// Q matrix for C-SVC and nu-SVC
pub struct SvcQ<'a> {
    kernel: KernelMatrix<'a>,
    y: Vec<f64>,
    cache: RowCache,
    qd: Vec<f64>,
}

impl<'a> SvcQ<'a> {
    /// `y` holds the `±1` labels matching `x`
    pub fn new(x: &'a [SparseVector], y: &[i8], kernel: KernelFunction, cache_mb: f64) -> Self {
        let kernel = KernelMatrix::new(kernel, x.iter().collect());
        let qd = (0..x.len()).map(|i| kernel.eval(i, i)).collect();
        Self {
            y: y.iter().map(|&v| f64::from(v)).collect(),
            cache: RowCache::with_megabytes(x.len(), cache_mb),
            kernel,
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let (row, start) = self.cache.get_data(i, len);
        let yi = self.y[i];
        for j in start..len {
            row[j] = yi * self.y[j] * self.kernel.eval(i, j);
        }
        &row[..len]
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.y.swap(i, j);
        self.qd.swap(i, j);
    }
}

/// Q matrix for one-class SVM
pub struct OneClassQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: RowCache,
    qd: Vec<f64>,
}

impl<'a> OneClassQ<'a> {
    pub fn new(x: &'a [SparseVector], kernel: KernelFunction, cache_mb: f64) -> Self {
        let kernel = KernelMatrix::new(kernel, x.iter().collect());
        let qd = (0..x.len()).map(|i| kernel.eval(i, i)).collect();
        Self {
            cache: RowCache::with_megabytes(x.len(), cache_mb),
            kernel,
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let (row, start) = self.cache.get_data(i, len);
        for j in start..len {
            row[j] = self.kernel.eval(i, j);
        }
        &row[..len]
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.qd.swap(i, j);
    }
}

/// Q matrix for epsilon-SVR and nu-SVR.
///
/// The kernel cache stays in the original `l` order; only the `2l`
/// sign/index/diagonal arrays follow the solver's permutation. Rows are
/// assembled into one of two output buffers, alternating per call, so the
/// previous row stays valid while the next one is built.
pub struct SvrQ<'a> {
    l: usize,
    kernel: KernelMatrix<'a>,
    cache: RowCache,
    sign: Vec<f64>,
    index: Vec<usize>,
    qd: Vec<f64>,
    buffer: [Vec<f64>; 2],
    next_buffer: usize,
}

impl<'a> SvrQ<'a> {
    pub fn new(x: &'a [SparseVector], kernel: KernelFunction, cache_mb: f64) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(kernel, x.iter().collect());

        let sign = (0..2 * l).map(|k| if k < l { 1.0 } else { -1.0 }).collect();
        let index = (0..2 * l).map(|k| k % l).collect();
        let qd = (0..2 * l).map(|k| kernel.eval(k % l, k % l)).collect();

        Self {
            l,
            cache: RowCache::with_megabytes(l, cache_mb),
            kernel,
            sign,
            index,
            qd,
            buffer: [vec![0.0; 2 * l], vec![0.0; 2 * l]],
            next_buffer: 0,
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[f64] {
        let real_i = self.index[i];
        let (data, start) = self.cache.get_data(real_i, self.l);
        for j in start..self.l {
            data[j] = self.kernel.eval(real_i, j);
        }

        let buf = &mut self.buffer[self.next_buffer];
        self.next_buffer = 1 - self.next_buffer;
        let si = self.sign[i];
        for j in 0..len {
            buf[j] = si * self.sign[j] * data[self.index[j]];
        }
        &buf[..len]
    }

    fn diagonal(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.sign.swap(i, j);
        self.index.swap(i, j);
        self.qd.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, LinearKernel, RBFKernel};
    use approx::assert_relative_eq;

    fn points() -> Vec<SparseVector> {
        vec![
            SparseVector::new(vec![0], vec![1.0]),
            SparseVector::new(vec![0, 1], vec![2.0, 1.0]),
            SparseVector::new(vec![1], vec![-1.0]),
        ]
    }

    #[test]
    fn test_svc_q_signs() {
        let x = points();
        let y: [i8; 3] = [1, -1, 1];
        let kernel = KernelFunction::Linear(LinearKernel);
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);

        let row = q.get_q(0, 3).to_vec();
        assert_eq!(row, vec![1.0, -2.0, 0.0]);
        assert_eq!(q.diagonal(), &[1.0, 5.0, 1.0]);

        let row = q.get_q(1, 3).to_vec();
        assert_eq!(row, vec![-2.0, 5.0, 1.0]);
    }

    #[test]
    fn test_repeated_row_is_a_cache_hit() {
        let x = points();
        let y: [i8; 3] = [1, 1, -1];
        let mut q = SvcQ::new(&x, &y, KernelFunction::Linear(LinearKernel), 1.0);
        q.get_q(1, 3);
        q.get_q(1, 2);

        let stats = q.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_svc_q_swap_keeps_consistency() {
        let x = points();
        let y: [i8; 3] = [1, -1, 1];
        let kernel = KernelFunction::Rbf(RBFKernel::new(0.5));
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);
        q.get_q(0, 3);
        q.get_q(2, 3);

        q.swap_index(0, 2);

        // Row 0 is now the old row 2 with its columns permuted
        let expected_02 = kernel.compute(&x[2], &x[0]);
        let row = q.get_q(0, 3).to_vec();
        assert_relative_eq!(row[2], expected_02, epsilon = 1e-12);
        assert_relative_eq!(row[1], -kernel.compute(&x[2], &x[1]), epsilon = 1e-12);
        assert_relative_eq!(row[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_one_class_q() {
        let x = points();
        let mut q = OneClassQ::new(&x, KernelFunction::Linear(LinearKernel), 1.0);
        assert_eq!(q.get_q(1, 3), &[2.0, 5.0, -1.0]);
        assert_eq!(q.diagonal(), &[1.0, 5.0, 1.0]);

        // Partial row first, then the full row
        assert_eq!(q.get_q(2, 1), &[0.0]);
        assert_eq!(q.get_q(2, 3), &[0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_svr_q_double_size() {
        let x = points();
        let mut q = SvrQ::new(&x, KernelFunction::Linear(LinearKernel), 1.0);

        assert_eq!(q.diagonal(), &[1.0, 5.0, 1.0, 1.0, 5.0, 1.0]);

        // Row 0 (sign +1): K(0, j) for j < l, -K(0, j - l) otherwise
        let row0 = q.get_q(0, 6).to_vec();
        assert_eq!(row0, vec![1.0, 2.0, 0.0, -1.0, -2.0, -0.0]);

        // Row 4 (sign -1, vector 1)
        let row4 = q.get_q(4, 6).to_vec();
        assert_eq!(row4, vec![-2.0, -5.0, 1.0, 2.0, 5.0, -1.0]);

        q.swap_index(0, 4);
        assert_eq!(q.diagonal()[0], 5.0);
        let swapped = q.get_q(0, 6).to_vec();
        assert_eq!(swapped[0], 5.0);
        assert_eq!(swapped[4], -2.0);
    }
}
