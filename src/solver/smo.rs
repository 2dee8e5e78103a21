//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the dual problem shared by every formulation in this crate:
//!
//! ```text
//! min  0.5 αᵀQα + pᵀα
//! s.t. yᵀα = Δ,  0 ≤ α_t ≤ C_t
//! ```
//!
//! where `y_t = ±1`. Each iteration picks the maximal violating variable
//! `i` and the partner `j` that maximises the second-order decrease of the
//! objective, then solves the two-variable subproblem analytically.
//!
//! The `Nu` formulation adds a second equality constraint (`eᵀα` fixed),
//! so `i` and `j` are chosen among variables sharing the same label.

use crate::core::{CancellationToken, Result, SVMError};
use crate::solver::qmatrix::QMatrix;
use log::{debug, info, warn};

/// Floor for non-positive curvature in the two-variable subproblem
pub const TAU: f64 = 1e-12;

/// Where a variable sits relative to its box `[0, C_t]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Which dual the solver is optimizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formulation {
    /// One equality constraint `yᵀα = Δ` (C-SVC, one-class, epsilon-SVR)
    Standard,
    /// Two equality constraints, one per label sign (nu-SVC, nu-SVR)
    Nu,
}

/// Solver configuration for one optimization run
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Upper bound for variables with `y_t = +1`
    pub cp: f64,
    /// Upper bound for variables with `y_t = -1`
    pub cn: f64,
    /// Stopping tolerance on the maximal violation
    pub eps: f64,
    /// Enable the shrinking heuristic
    pub shrinking: bool,
    pub formulation: Formulation,
}

/// Summary of a finished optimization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionInfo {
    /// Final dual objective value
    pub obj: f64,
    /// Offset of the decision function
    pub rho: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    /// `(r1 + r2) / 2` for the `Nu` formulation, 0 otherwise
    pub r: f64,
    pub iterations: usize,
}

/// SMO solver working state.
///
/// All per-variable arrays are kept in the permuted order; `active_set[t]`
/// maps position `t` back to the caller's index. Positions
/// `0..active_size` are the active (unshrunk) variables.
pub struct SMOSolver<'q, Q: QMatrix> {
    pub(super) q: &'q mut Q,
    pub(super) formulation: Formulation,
    pub(super) l: usize,
    pub(super) active_size: usize,
    pub(super) y: Vec<i8>,
    pub(super) p: Vec<f64>,
    pub(super) alpha: Vec<f64>,
    pub(super) alpha_status: Vec<AlphaStatus>,
    /// Gradient of the objective
    pub(super) g: Vec<f64>,
    /// Gradient contribution of variables at their upper bound
    pub(super) g_bar: Vec<f64>,
    pub(super) active_set: Vec<usize>,
    pub(super) cp: f64,
    pub(super) cn: f64,
    pub(super) eps: f64,
    pub(super) unshrink: bool,
    /// Row buffers for the two working-set variables
    pub(super) q_i: Vec<f64>,
    pub(super) q_j: Vec<f64>,
}

/// Run SMO on `q` and write the optimal `alpha` back in the caller's order.
///
/// `alpha` holds a feasible starting point on entry.
pub fn solve<Q: QMatrix>(
    q: &mut Q,
    p: &[f64],
    y: &[i8],
    alpha: &mut [f64],
    config: &SolverConfig,
    cancel: Option<&CancellationToken>,
) -> Result<SolutionInfo> {
    if p.len() != y.len() || alpha.len() != y.len() {
        return Err(SVMError::DimensionMismatch {
            expected: y.len(),
            actual: p.len().min(alpha.len()),
        });
    }

    let mut solver = SMOSolver::new(q, p, y, alpha, config);
    let info = solver.run(config.shrinking, cancel)?;

    for (t, &original) in solver.active_set.iter().enumerate() {
        alpha[original] = solver.alpha[t];
    }
    Ok(info)
}

impl<'q, Q: QMatrix> SMOSolver<'q, Q> {
    fn new(q: &'q mut Q, p: &[f64], y: &[i8], alpha: &[f64], config: &SolverConfig) -> Self {
        let l = y.len();
        let mut solver = Self {
            q,
            formulation: config.formulation,
            l,
            active_size: l,
            y: y.to_vec(),
            p: p.to_vec(),
            alpha: alpha.to_vec(),
            alpha_status: vec![AlphaStatus::Free; l],
            g: p.to_vec(),
            g_bar: vec![0.0; l],
            active_set: (0..l).collect(),
            cp: config.cp,
            cn: config.cn,
            eps: config.eps,
            unshrink: false,
            q_i: Vec::with_capacity(l),
            q_j: Vec::with_capacity(l),
        };
        for t in 0..l {
            solver.update_alpha_status(t);
        }
        solver.initialize_gradient();
        solver
    }

    fn initialize_gradient(&mut self) {
        let l = self.l;
        for i in 0..l {
            if self.is_lower_bound(i) {
                continue;
            }
            let alpha_i = self.alpha[i];
            let c_i = self.get_c(i);
            let upper = self.is_upper_bound(i);
            let q_i = self.q.get_q(i, l);
            for j in 0..l {
                self.g[j] += alpha_i * q_i[j];
            }
            if upper {
                for j in 0..l {
                    self.g_bar[j] += c_i * q_i[j];
                }
            }
        }
    }

    fn run(&mut self, shrinking: bool, cancel: Option<&CancellationToken>) -> Result<SolutionInfo> {
        let l = self.l;
        let max_iter = 10_000_000usize.max(l.saturating_mul(100));
        let shrink_interval = l.min(1000);
        let mut counter = shrink_interval + 1;
        let mut iter = 0;

        while iter < max_iter {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SVMError::Cancelled);
            }

            counter -= 1;
            if counter == 0 {
                counter = shrink_interval;
                if shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    // Recheck the shrunk variables against the full gradient
                    self.reconstruct_gradient();
                    self.active_size = l;
                    match self.select_working_set() {
                        Some(pair) => {
                            // Shrink again on the next iteration
                            counter = 1;
                            pair
                        }
                        None => break,
                    }
                }
            };

            iter += 1;
            self.take_step(i, j);
        }

        if iter >= max_iter {
            if self.active_size < l {
                self.reconstruct_gradient();
                self.active_size = l;
            }
            warn!("reaching max number of iterations ({max_iter})");
        }

        let rho = self.calculate_rho();
        let r = match self.formulation {
            Formulation::Standard => 0.0,
            Formulation::Nu => self.calculate_r(),
        };

        let obj = (0..l)
            .map(|t| self.alpha[t] * (self.g[t] + self.p[t]))
            .sum::<f64>()
            / 2.0;

        info!("optimization finished, #iter = {iter}");
        let stats = self.q.cache_stats();
        debug!(
            "kernel cache: {} hits, {} misses ({:.1}% hit rate), {} rows held",
            stats.hits,
            stats.misses,
            100.0 * stats.hit_rate(),
            stats.rows
        );

        Ok(SolutionInfo {
            obj,
            rho,
            upper_bound_p: self.cp,
            upper_bound_n: self.cn,
            r,
            iterations: iter,
        })
    }

    /// Solve the two-variable subproblem on `(i, j)` and update the gradients
    fn take_step(&mut self, i: usize, j: usize) {
        let active_size = self.active_size;
        load_row(self.q, i, active_size, &mut self.q_i);
        load_row(self.q, j, active_size, &mut self.q_j);

        let qd = self.q.diagonal();
        let (qd_i, qd_j) = (qd[i], qd[j]);
        let c_i = self.get_c(i);
        let c_j = self.get_c(j);

        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];
        let q_ij = self.q_i[j];

        if self.y[i] != self.y[j] {
            let quad_coef = positive_or_tau(qd_i + qd_j + 2.0 * q_ij);
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let quad_coef = positive_or_tau(qd_i + qd_j - 2.0 * q_ij);
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;
        for k in 0..active_size {
            self.g[k] += self.q_i[k] * delta_alpha_i + self.q_j[k] * delta_alpha_j;
        }

        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        self.update_g_bar(i, c_i, was_upper_i);
        self.update_g_bar(j, c_j, was_upper_j);
    }

    /// Keep `g_bar` in sync when variable `t` enters or leaves its upper bound
    fn update_g_bar(&mut self, t: usize, c_t: f64, was_upper: bool) {
        if was_upper == self.is_upper_bound(t) {
            return;
        }
        let l = self.l;
        let q_t = self.q.get_q(t, l);
        let sign = if was_upper { -1.0 } else { 1.0 };
        for k in 0..l {
            self.g_bar[k] += sign * c_t * q_t[k];
        }
    }

    /// Pick the working pair, or `None` when the active set is optimal
    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.formulation {
            Formulation::Standard => self.select_working_set_standard(),
            Formulation::Nu => self.select_working_set_nu(),
        }
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let active_size = self.active_size;

        // i = argmax { -y_t G_t | t in I_up }
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        for t in 0..active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        if let Some(i) = gmax_idx {
            load_row(self.q, i, active_size, &mut self.q_i);
        }
        let qd = self.q.diagonal();

        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..active_size {
            let (grad_diff, quad_sign) = if self.y[j] == 1 {
                if self.is_lower_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(self.g[j]);
                (gmax + self.g[j], -1.0)
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(-self.g[j]);
                (gmax - self.g[j], 1.0)
            };

            if grad_diff > 0.0 {
                if let Some(i) = gmax_idx {
                    let quad_coef =
                        qd[i] + qd[j] + quad_sign * 2.0 * f64::from(self.y[i]) * self.q_i[j];
                    let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        Some((gmax_idx?, gmin_idx?))
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let active_size = self.active_size;

        let mut gmaxp = f64::NEG_INFINITY;
        let mut gmaxp_idx = None;
        let mut gmaxn = f64::NEG_INFINITY;
        let mut gmaxn_idx = None;

        for t in 0..active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        if let Some(ip) = gmaxp_idx {
            load_row(self.q, ip, active_size, &mut self.q_i);
        }
        if let Some(in_) = gmaxn_idx {
            load_row(self.q, in_, active_size, &mut self.q_j);
        }
        let qd = self.q.diagonal();

        let mut gmaxp2 = f64::NEG_INFINITY;
        let mut gmaxn2 = f64::NEG_INFINITY;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..active_size {
            let candidate = if self.y[j] == 1 {
                if self.is_lower_bound(j) {
                    continue;
                }
                gmaxp2 = gmaxp2.max(self.g[j]);
                gmaxp_idx.map(|ip| (gmaxp + self.g[j], qd[ip] + qd[j] - 2.0 * self.q_i[j]))
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                gmaxn2 = gmaxn2.max(-self.g[j]);
                gmaxn_idx.map(|in_| (gmaxn - self.g[j], qd[in_] + qd[j] - 2.0 * self.q_j[j]))
            };

            if let Some((grad_diff, quad_coef)) = candidate {
                if grad_diff > 0.0 {
                    let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < self.eps {
            return None;
        }
        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx } else { gmaxn_idx };
        Some((i?, j))
    }

    /// Offset of the decision function from the final gradient
    fn calculate_rho(&self) -> f64 {
        match self.formulation {
            Formulation::Standard => {
                let mut ub = f64::INFINITY;
                let mut lb = f64::NEG_INFINITY;
                let mut nr_free = 0usize;
                let mut sum_free = 0.0;

                for t in 0..self.active_size {
                    let yg = f64::from(self.y[t]) * self.g[t];
                    match self.alpha_status[t] {
                        AlphaStatus::UpperBound => {
                            if self.y[t] == -1 {
                                ub = ub.min(yg);
                            } else {
                                lb = lb.max(yg);
                            }
                        }
                        AlphaStatus::LowerBound => {
                            if self.y[t] == 1 {
                                ub = ub.min(yg);
                            } else {
                                lb = lb.max(yg);
                            }
                        }
                        AlphaStatus::Free => {
                            nr_free += 1;
                            sum_free += yg;
                        }
                    }
                }

                if nr_free > 0 {
                    sum_free / nr_free as f64
                } else {
                    (ub + lb) / 2.0
                }
            }
            Formulation::Nu => {
                let (r1, r2) = self.nu_offsets();
                (r1 - r2) / 2.0
            }
        }
    }

    fn calculate_r(&self) -> f64 {
        let (r1, r2) = self.nu_offsets();
        (r1 + r2) / 2.0
    }

    /// Per-label offsets `(r1, r2)` for the `Nu` formulation
    fn nu_offsets(&self) -> (f64, f64) {
        let mut ub = [f64::INFINITY; 2];
        let mut lb = [f64::NEG_INFINITY; 2];
        let mut nr_free = [0usize; 2];
        let mut sum_free = [0.0; 2];

        for t in 0..self.active_size {
            let k = usize::from(self.y[t] != 1);
            match self.alpha_status[t] {
                AlphaStatus::UpperBound => lb[k] = lb[k].max(self.g[t]),
                AlphaStatus::LowerBound => ub[k] = ub[k].min(self.g[t]),
                AlphaStatus::Free => {
                    nr_free[k] += 1;
                    sum_free[k] += self.g[t];
                }
            }
        }

        let r = |k: usize| {
            if nr_free[k] > 0 {
                sum_free[k] / nr_free[k] as f64
            } else {
                (ub[k] + lb[k]) / 2.0
            }
        };
        (r(0), r(1))
    }

    pub(super) fn get_c(&self, t: usize) -> f64 {
        if self.y[t] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    pub(super) fn update_alpha_status(&mut self, t: usize) {
        self.alpha_status[t] = if self.alpha[t] >= self.get_c(t) {
            AlphaStatus::UpperBound
        } else if self.alpha[t] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(super) fn is_upper_bound(&self, t: usize) -> bool {
        self.alpha_status[t] == AlphaStatus::UpperBound
    }

    pub(super) fn is_lower_bound(&self, t: usize) -> bool {
        self.alpha_status[t] == AlphaStatus::LowerBound
    }

    pub(super) fn is_free(&self, t: usize) -> bool {
        self.alpha_status[t] == AlphaStatus::Free
    }

    /// Exchange positions `i` and `j` in every per-variable array
    pub(super) fn swap_index(&mut self, i: usize, j: usize) {
        self.q.swap_index(i, j);
        self.y.swap(i, j);
        self.g.swap(i, j);
        self.alpha_status.swap(i, j);
        self.alpha.swap(i, j);
        self.p.swap(i, j);
        self.active_set.swap(i, j);
        self.g_bar.swap(i, j);
    }
}

/// Copy the first `len` entries of row `i` into `buf`
pub(super) fn load_row<Q: QMatrix>(q: &mut Q, i: usize, len: usize, buf: &mut Vec<f64>) {
    buf.clear();
    buf.extend_from_slice(q.get_q(i, len));
}

#[inline]
fn positive_or_tau(quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        quad_coef
    } else {
        TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::{KernelFunction, LinearKernel, RBFKernel};
    use crate::solver::qmatrix::{OneClassQ, SvcQ};
    use approx::assert_relative_eq;

    fn line_points(values: &[f64]) -> Vec<SparseVector> {
        values
            .iter()
            .map(|&v| SparseVector::new(vec![0], vec![v]))
            .collect()
    }

    fn config(c: f64, shrinking: bool) -> SolverConfig {
        SolverConfig {
            cp: c,
            cn: c,
            eps: 1e-3,
            shrinking,
            formulation: Formulation::Standard,
        }
    }

    #[test]
    fn test_two_points_closed_form() {
        // x = -1 (y = -1), x = +1 (y = +1), linear kernel: w = 1, b = 0
        let x = line_points(&[-1.0, 1.0]);
        let y = [-1i8, 1];
        let mut q = SvcQ::new(&x, &y, KernelFunction::Linear(LinearKernel), 1.0);
        let mut alpha = vec![0.0; 2];

        let info = solve(&mut q, &[-1.0, -1.0], &y, &mut alpha, &config(10.0, true), None)
            .unwrap();

        assert_relative_eq!(alpha[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(alpha[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(info.rho, 0.0, epsilon = 1e-9);
        assert_relative_eq!(info.obj, -0.5, epsilon = 1e-9);
        assert_eq!(info.upper_bound_p, 10.0);
    }

    #[test]
    fn test_box_and_equality_constraints_hold() {
        let x = line_points(&[-3.0, -2.0, -1.5, -0.2, 0.1, 0.4, 1.0, 2.5, 3.0]);
        let y = [-1i8, -1, 1, -1, 1, -1, 1, 1, 1];
        let c = 0.8;
        let mut q = SvcQ::new(&x, &y, KernelFunction::Rbf(RBFKernel::new(0.5)), 1.0);
        let mut alpha = vec![0.0; x.len()];
        let p = vec![-1.0; x.len()];

        solve(&mut q, &p, &y, &mut alpha, &config(c, true), None).unwrap();

        let mut balance = 0.0;
        for (a, &yi) in alpha.iter().zip(&y) {
            assert!(*a >= 0.0 && *a <= c + 1e-12);
            balance += a * f64::from(yi);
        }
        assert!(balance.abs() < 1e-9);
    }

    #[test]
    fn test_shrinking_does_not_change_solution() {
        let values: Vec<f64> = (0..40).map(|i| (i as f64 * 0.37).sin() * 3.0).collect();
        let x = line_points(&values);
        let y: Vec<i8> = values
            .iter()
            .enumerate()
            .map(|(i, v)| if *v + 0.3 * ((i % 3) as f64 - 1.0) > 0.0 { 1 } else { -1 })
            .collect();
        let p = vec![-1.0; x.len()];
        let kernel = KernelFunction::Rbf(RBFKernel::new(1.0));

        let tight = |shrinking| SolverConfig {
            eps: 1e-9,
            ..config(1.0, shrinking)
        };

        let mut alpha_a = vec![0.0; x.len()];
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);
        let a = solve(&mut q, &p, &y, &mut alpha_a, &tight(true), None).unwrap();

        let mut alpha_b = vec![0.0; x.len()];
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);
        let b = solve(&mut q, &p, &y, &mut alpha_b, &tight(false), None).unwrap();

        assert_relative_eq!(a.obj, b.obj, epsilon = 1e-6);
        assert_relative_eq!(a.rho, b.rho, epsilon = 1e-4);
    }

    #[test]
    fn test_kkt_conditions_at_optimum() {
        let x = line_points(&[-2.0, -1.0, -0.5, 0.5, 1.0, 2.0]);
        let y = [-1i8, -1, 1, -1, 1, 1];
        let kernel = KernelFunction::Rbf(RBFKernel::new(1.0));
        let c = 2.0;
        let eps = 1e-3;
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);
        let mut alpha = vec![0.0; x.len()];
        let info = solve(&mut q, &[-1.0; 6], &y, &mut alpha, &config(c, true), None).unwrap();

        // Gradient of the dual: G_t = sum_s Q_ts alpha_s - 1
        let mut q = SvcQ::new(&x, &y, kernel, 1.0);
        for t in 0..x.len() {
            let row = q.get_q(t, x.len()).to_vec();
            let g: f64 = row.iter().zip(&alpha).map(|(q, a)| q * a).sum::<f64>() - 1.0;
            let yg = f64::from(y[t]) * g;
            let yt = f64::from(y[t]);
            // -y_t G_t must not exceed the threshold in I_up, nor fall below it in I_low
            if alpha[t] < c && yt > 0.0 || alpha[t] > 0.0 && yt < 0.0 {
                assert!(-yg <= -info.rho + eps, "t = {t}");
            }
            if alpha[t] < c && yt < 0.0 || alpha[t] > 0.0 && yt > 0.0 {
                assert!(-yg >= -info.rho - eps, "t = {t}");
            }
        }
    }

    #[test]
    fn test_nu_formulation_keeps_both_sums() {
        // One-class style box [0, 1] with the nu solver; labels split in two groups
        let x = line_points(&[0.0, 0.3, 0.6, 2.0, 2.2, 2.4]);
        let y = [1i8, 1, 1, -1, -1, -1];
        let mut q = SvcQ::new(&x, &y, KernelFunction::Rbf(RBFKernel::new(1.0)), 1.0);
        let mut alpha = vec![0.5, 0.5, 0.0, 0.5, 0.5, 0.0];
        let cfg = SolverConfig {
            cp: 1.0,
            cn: 1.0,
            eps: 1e-3,
            shrinking: true,
            formulation: Formulation::Nu,
        };

        let info = solve(&mut q, &[0.0; 6], &y, &mut alpha, &cfg, None).unwrap();

        let pos: f64 = alpha[..3].iter().sum();
        let neg: f64 = alpha[3..].iter().sum();
        assert_relative_eq!(pos, 1.0, epsilon = 1e-9);
        assert_relative_eq!(neg, 1.0, epsilon = 1e-9);
        assert!(info.r.is_finite());
    }

    #[test]
    fn test_one_class_solution() {
        let x = line_points(&[0.0, 0.1, 0.2, 0.3]);
        let y = [1i8; 4];
        let mut q = OneClassQ::new(&x, KernelFunction::Rbf(RBFKernel::new(1.0)), 1.0);
        let mut alpha = vec![1.0, 1.0, 0.0, 0.0];

        solve(&mut q, &[0.0; 4], &y, &mut alpha, &config(1.0, true), None).unwrap();

        assert_relative_eq!(alpha.iter().sum::<f64>(), 2.0, epsilon = 1e-9);
        assert!(alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_cancellation() {
        let x = line_points(&[-1.0, 1.0]);
        let y = [-1i8, 1];
        let mut q = SvcQ::new(&x, &y, KernelFunction::Linear(LinearKernel), 1.0);
        let mut alpha = vec![0.0; 2];
        let token = CancellationToken::new();
        token.cancel();

        let result = solve(&mut q, &[-1.0, -1.0], &y, &mut alpha, &config(1.0, true), Some(&token));
        assert!(matches!(result, Err(SVMError::Cancelled)));
    }

    #[test]
    fn test_length_mismatch() {
        let x = line_points(&[-1.0, 1.0]);
        let y = [-1i8, 1];
        let mut q = SvcQ::new(&x, &y, KernelFunction::Linear(LinearKernel), 1.0);
        let mut alpha = vec![0.0; 2];
        assert!(solve(&mut q, &[-1.0], &y, &mut alpha, &config(1.0, true), None).is_err());
    }
}
