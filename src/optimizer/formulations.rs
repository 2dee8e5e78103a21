//! Per-type dual formulations handed to the SMO solver
//!
//! Each formulation builds the linear term, labels, starting point and
//! bounds for its dual, runs the solver, and maps the solution back to one
//! signed coefficient per training example.

use crate::core::{CancellationToken, Problem, Result, SvmParameter, SvmType};
use crate::kernel::KernelFunction;
use crate::solver::{solve, Formulation, OneClassQ, SolutionInfo, SolverConfig, SvcQ, SvrQ};
use log::{info, warn};

/// One trained decision function `f(x) = Σ alpha_i K(x_i, x) - rho`
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFunction {
    /// Signed coefficient per training example (zero for non-support vectors)
    pub alpha: Vec<f64>,
    pub rho: f64,
}

impl DecisionFunction {
    /// Number of examples with a non-zero coefficient
    pub fn n_sv(&self) -> usize {
        self.alpha.iter().filter(|a| a.abs() > 0.0).count()
    }
}

/// Train a single decision function on `problem`.
///
/// `cp` and `cn` are the box bounds for positive and negative examples
/// (used by C-SVC only; the other formulations derive their bounds from
/// `param`).
pub fn train_one(
    problem: &Problem,
    param: &SvmParameter,
    cp: f64,
    cn: f64,
    cancel: Option<&CancellationToken>,
) -> Result<DecisionFunction> {
    let kernel = KernelFunction::from_parameter(param);

    let (alpha, si) = match param.svm_type {
        SvmType::CSvc => solve_c_svc(problem, param, kernel, cp, cn, cancel)?,
        SvmType::NuSvc => solve_nu_svc(problem, param, kernel, cancel)?,
        SvmType::OneClass => solve_one_class(problem, param, kernel, cancel)?,
        SvmType::EpsilonSvr => solve_epsilon_svr(problem, param, kernel, cancel)?,
        SvmType::NuSvr => solve_nu_svr(problem, param, kernel, cancel)?,
    };

    info!("obj = {:.6}, rho = {:.6}", si.obj, si.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (a, &y) in alpha.iter().zip(&problem.y) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if y > 0.0 {
                si.upper_bound_p
            } else {
                si.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    info!("nSV = {n_sv}, nBSV = {n_bsv}");

    Ok(DecisionFunction { alpha, rho: si.rho })
}

fn signs(problem: &Problem) -> Vec<i8> {
    problem
        .y
        .iter()
        .map(|&y| if y > 0.0 { 1 } else { -1 })
        .collect()
}

fn solver_config(param: &SvmParameter, cp: f64, cn: f64, formulation: Formulation) -> SolverConfig {
    SolverConfig {
        cp,
        cn,
        eps: param.eps,
        shrinking: param.shrinking,
        formulation,
    }
}

fn solve_c_svc(
    problem: &Problem,
    param: &SvmParameter,
    kernel: KernelFunction,
    cp: f64,
    cn: f64,
    cancel: Option<&CancellationToken>,
) -> Result<(Vec<f64>, SolutionInfo)> {
    let l = problem.len();
    let y = signs(problem);
    let minus_ones = vec![-1.0; l];
    let mut alpha = vec![0.0; l];

    let mut q = SvcQ::new(&problem.x, &y, kernel, param.cache_size);
    let config = solver_config(param, cp, cn, Formulation::Standard);
    let si = solve(&mut q, &minus_ones, &y, &mut alpha, &config, cancel)?;

    if cp == cn {
        let sum_alpha: f64 = alpha.iter().sum();
        info!("nu = {:.6}", sum_alpha / (cp * l as f64));
    }

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(yi);
    }
    Ok((alpha, si))
}

fn solve_nu_svc(
    problem: &Problem,
    param: &SvmParameter,
    kernel: KernelFunction,
    cancel: Option<&CancellationToken>,
) -> Result<(Vec<f64>, SolutionInfo)> {
    let l = problem.len();
    let y = signs(problem);

    let mut sum_pos = param.nu * l as f64 / 2.0;
    let mut sum_neg = param.nu * l as f64 / 2.0;
    let mut alpha: Vec<f64> = y
        .iter()
        .map(|&yi| {
            let sum = if yi == 1 { &mut sum_pos } else { &mut sum_neg };
            let a = sum.min(1.0);
            *sum -= a;
            a
        })
        .collect();

    let zeros = vec![0.0; l];
    let mut q = SvcQ::new(&problem.x, &y, kernel, param.cache_size);
    let config = solver_config(param, 1.0, 1.0, Formulation::Nu);
    let mut si = solve(&mut q, &zeros, &y, &mut alpha, &config, cancel)?;

    rescale_nu_solution(&mut alpha, &y, &mut si);
    Ok((alpha, si))
}

/// Map the nu-SVC solution onto the C-SVC scale: `alpha * y / r`,
/// `rho / r`, `obj / r²`, bounds `1 / r`.
///
/// With `r == 0` (or a non-finite `r`) there is no such scale; the result
/// is the constant decision function `f(x) = 0`.
pub(crate) fn rescale_nu_solution(alpha: &mut [f64], y: &[i8], si: &mut SolutionInfo) {
    let r = si.r;
    if r == 0.0 || !r.is_finite() {
        warn!("nu-SVC solution has r = {r}; using a zero decision function");
        alpha.iter_mut().for_each(|a| *a = 0.0);
        si.rho = 0.0;
        si.obj = 0.0;
        si.upper_bound_p = f64::INFINITY;
        si.upper_bound_n = f64::INFINITY;
        return;
    }

    info!("C = {:.6}", 1.0 / r);
    for (a, &yi) in alpha.iter_mut().zip(y) {
        *a *= f64::from(yi) / r;
    }
    si.rho /= r;
    si.obj /= r * r;
    si.upper_bound_p = 1.0 / r;
    si.upper_bound_n = 1.0 / r;
}

fn solve_one_class(
    problem: &Problem,
    param: &SvmParameter,
    kernel: KernelFunction,
    cancel: Option<&CancellationToken>,
) -> Result<(Vec<f64>, SolutionInfo)> {
    let l = problem.len();
    let nu_l = param.nu * l as f64;
    let n = nu_l as usize;

    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        alpha[n] = nu_l - n as f64;
    }

    let zeros = vec![0.0; l];
    let ones = vec![1i8; l];
    let mut q = OneClassQ::new(&problem.x, kernel, param.cache_size);
    let config = solver_config(param, 1.0, 1.0, Formulation::Standard);
    let si = solve(&mut q, &zeros, &ones, &mut alpha, &config, cancel)?;

    Ok((alpha, si))
}

fn solve_epsilon_svr(
    problem: &Problem,
    param: &SvmParameter,
    kernel: KernelFunction,
    cancel: Option<&CancellationToken>,
) -> Result<(Vec<f64>, SolutionInfo)> {
    let l = problem.len();
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut y = vec![0i8; 2 * l];
    for (i, &target) in problem.y.iter().enumerate() {
        linear_term[i] = param.p - target;
        y[i] = 1;
        linear_term[i + l] = param.p + target;
        y[i + l] = -1;
    }

    let mut q = SvrQ::new(&problem.x, kernel, param.cache_size);
    let config = solver_config(param, param.c, param.c, Formulation::Standard);
    let si = solve(&mut q, &linear_term, &y, &mut alpha2, &config, cancel)?;

    let alpha: Vec<f64> = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    let sum_alpha: f64 = alpha.iter().map(|a| a.abs()).sum();
    info!("nu = {:.6}", sum_alpha / (param.c * l as f64));

    Ok((alpha, si))
}

fn solve_nu_svr(
    problem: &Problem,
    param: &SvmParameter,
    kernel: KernelFunction,
    cancel: Option<&CancellationToken>,
) -> Result<(Vec<f64>, SolutionInfo)> {
    let l = problem.len();
    let c = param.c;
    let mut sum = c * param.nu * l as f64 / 2.0;

    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut y = vec![0i8; 2 * l];
    for (i, &target) in problem.y.iter().enumerate() {
        let a = sum.min(c);
        alpha2[i] = a;
        alpha2[i + l] = a;
        sum -= a;

        linear_term[i] = -target;
        y[i] = 1;
        linear_term[i + l] = target;
        y[i + l] = -1;
    }

    let mut q = SvrQ::new(&problem.x, kernel, param.cache_size);
    let config = solver_config(param, c, c, Formulation::Nu);
    let si = solve(&mut q, &linear_term, &y, &mut alpha2, &config, cancel)?;

    info!("epsilon = {:.6}", -si.r);

    let alpha = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    Ok((alpha, si))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector};
    use approx::assert_relative_eq;

    fn line_problem(xs: &[f64], ys: &[f64]) -> Problem {
        let x = xs
            .iter()
            .map(|&v| SparseVector::new(vec![0], vec![v]))
            .collect();
        Problem::new(x, ys.to_vec()).unwrap()
    }

    fn linear(svm_type: SvmType) -> SvmParameter {
        SvmParameter {
            svm_type,
            kernel_type: KernelType::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn test_c_svc_coefficients_are_signed() {
        let problem = line_problem(&[-2.0, -1.0, 1.0, 2.0], &[-1.0, -1.0, 1.0, 1.0]);
        let f = train_one(&problem, &linear(SvmType::CSvc), 1.0, 1.0, None).unwrap();

        // Only the two inner points are support vectors
        assert_eq!(f.n_sv(), 2);
        assert_relative_eq!(f.alpha[1], -0.5, epsilon = 1e-6);
        assert_relative_eq!(f.alpha[2], 0.5, epsilon = 1e-6);
        assert_relative_eq!(f.rho, 0.0, epsilon = 1e-6);
        assert_relative_eq!(f.alpha.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_one_class_initial_mass() {
        let problem = line_problem(&[0.0, 0.1, 0.2, 0.3, 0.4], &[1.0; 5]);
        let param = SvmParameter {
            svm_type: SvmType::OneClass,
            nu: 0.5,
            gamma: 1.0,
            ..Default::default()
        };
        let f = train_one(&problem, &param, 0.0, 0.0, None).unwrap();

        // Σ alpha = nu * l throughout the optimization
        assert_relative_eq!(f.alpha.iter().sum::<f64>(), 2.5, epsilon = 1e-9);
        assert!(f.alpha.iter().all(|&a| (0.0..=1.0 + 1e-12).contains(&a)));
    }

    #[test]
    fn test_epsilon_svr_fits_line() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x).collect();
        let problem = line_problem(&xs, &ys);
        let param = SvmParameter {
            c: 100.0,
            p: 0.01,
            eps: 1e-6,
            ..linear(SvmType::EpsilonSvr)
        };
        let f = train_one(&problem, &param, 0.0, 0.0, None).unwrap();

        // w = Σ alpha_i x_i, f(x) = w x - rho
        let w: f64 = f.alpha.iter().zip(&xs).map(|(a, x)| a * x).sum();
        assert_relative_eq!(w, 2.0, epsilon = 0.05);
        assert!(f.rho.abs() < 0.05);
        assert!(f.alpha.iter().all(|a| a.abs() <= 100.0 + 1e-9));
    }

    #[test]
    fn test_nu_svr_coefficients_balance() {
        let xs: Vec<f64> = (0..12).map(|i| i as f64 / 4.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| (x * 1.3).sin()).collect();
        let problem = line_problem(&xs, &ys);
        let param = SvmParameter {
            svm_type: SvmType::NuSvr,
            nu: 0.5,
            c: 1.0,
            gamma: 1.0,
            ..Default::default()
        };
        let f = train_one(&problem, &param, 0.0, 0.0, None).unwrap();

        assert_relative_eq!(f.alpha.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        assert!(f.alpha.iter().all(|a| a.abs() <= 1.0 + 1e-12));
    }

    #[test]
    fn test_nu_svc_matches_scale() {
        let problem = line_problem(
            &[-3.0, -2.0, -1.0, -0.5, 0.5, 1.0, 2.0, 3.0],
            &[-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0],
        );
        let param = SvmParameter {
            nu: 0.5,
            ..linear(SvmType::NuSvc)
        };
        let f = train_one(&problem, &param, 0.0, 0.0, None).unwrap();

        // Rescaled coefficients still satisfy yᵀalpha = 0 and separate the data
        assert_relative_eq!(f.alpha.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        let w: f64 = f
            .alpha
            .iter()
            .zip(&problem.x)
            .map(|(a, x)| a * x.get(0))
            .sum();
        for (x, &y) in problem.x.iter().zip(&problem.y) {
            assert!((w * x.get(0) - f.rho) * y > 0.0);
        }
    }

    #[test]
    fn test_rescale_with_zero_r() {
        let mut alpha = vec![0.5, 0.5];
        let y = [1i8, -1];
        let mut si = SolutionInfo {
            obj: -1.0,
            rho: 0.3,
            r: 0.0,
            ..Default::default()
        };
        rescale_nu_solution(&mut alpha, &y, &mut si);
        assert_eq!(alpha, vec![0.0, 0.0]);
        assert_eq!(si.rho, 0.0);
        assert!(si.upper_bound_p.is_infinite());
    }

    #[test]
    fn test_rescale_regular() {
        let mut alpha = vec![0.5, 0.25];
        let y = [1i8, -1];
        let mut si = SolutionInfo {
            obj: -1.0,
            rho: 0.3,
            r: 0.5,
            ..Default::default()
        };
        rescale_nu_solution(&mut alpha, &y, &mut si);
        assert_eq!(alpha, vec![1.0, -0.5]);
        assert_relative_eq!(si.rho, 0.6);
        assert_relative_eq!(si.obj, -4.0);
        assert_eq!(si.upper_bound_n, 2.0);
    }
}
