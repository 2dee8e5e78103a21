//! Probability calibration
//!
//! - Platt scaling: a sigmoid `1 / (1 + exp(A f + B))` fitted to decision
//!   values from internal cross-validation, one per class pair
//! - Pairwise coupling of the pair probabilities into class probabilities
//! - A Laplace scale for regression residuals
//! - Density marks that map one-class decision values to probabilities

use crate::core::{CancellationToken, Problem, Result, SvmParameter};
use crate::optimizer::{cross_validation_inner, train_inner};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Folds used for the internal cross-validation
const PROBABILITY_FOLDS: usize = 5;

/// Number of one-class density marks
const NR_MARKS: usize = 10;

/// Fit the sigmoid `(A, B)` to decision values and `±1` labels.
///
/// Newton's method with backtracking line search on the regularized
/// log-likelihood, using `(N+ + 1) / (N+ + 2)` and `1 / (N- + 2)` as targets.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let max_iter = 100;
    let min_step = 1e-10;
    let sigma = 1e-12;
    let eps = 1e-5;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&t)
            .map(|(&f, &ti)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (ti - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < max_iter {
        // Gradient and Hessian
        let mut h11 = sigma;
        let mut h22 = sigma;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&f, &ti) in dec_values.iter().zip(&t) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = ti - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < eps && g2.abs() < eps {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut stepsize = 1.0;
        while stepsize >= min_step {
            let new_a = a + stepsize * d_a;
            let new_b = b + stepsize * d_b;
            let newf = objective(new_a, new_b);
            if newf < fval + 0.0001 * stepsize * gd {
                a = new_a;
                b = new_b;
                fval = newf;
                break;
            }
            stepsize /= 2.0;
        }

        if stepsize < min_step {
            debug!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= max_iter {
        debug!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// `1 / (1 + exp(A f + B))`, evaluated without overflow
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        let e = (-f_apb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

const COUPLING_MAX_ITER: usize = 100;
const COUPLING_EPS: f64 = 1e-3;

/// Couple pairwise probabilities `r[i][j] ≈ P(i | i or j)` into class
/// probabilities (Wu, Lin and Weng, method 2).
///
/// Stops once every component of `Qp - pᵀQp` is below `1e-3`, or after
/// 100 sweeps with the current estimate.
pub fn multiclass_probability(k: usize, r: &[Vec<f64>]) -> Vec<f64> {
    let max_iter = COUPLING_MAX_ITER;
    let eps = COUPLING_EPS;
    let mut p = vec![1.0 / k as f64; k];

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        // Recompute Qp and pQp from scratch for numerical accuracy
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        debug!("exceeds max_iter in multiclass probability");
    }
    p
}

/// Fit the sigmoid for one binary sub-problem (`y = ±1`) from 5-fold
/// cross-validated decision values.
///
/// Folds lacking one of the classes get constant decision values instead of
/// a trained sub-model. Sub-models use `C = 1` with `cp`/`cn` as class weights.
pub(crate) fn binary_svc_probability(
    problem: &Problem,
    param: &SvmParameter,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<(f64, f64)> {
    let l = problem.len();
    let mut perm: Vec<usize> = (0..l).collect();
    perm.shuffle(rng);

    let mut dec_values = vec![0.0; l];
    let subparam = SvmParameter {
        probability: false,
        c: 1.0,
        weights: vec![(1, cp), (-1, cn)],
        ..param.clone()
    };

    for fold in 0..PROBABILITY_FOLDS {
        let begin = fold * l / PROBABILITY_FOLDS;
        let end = (fold + 1) * l / PROBABILITY_FOLDS;

        let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let subprob = problem.subset(&train_idx);

        let p_count = subprob.y.iter().filter(|&&y| y > 0.0).count();
        let n_count = subprob.len() - p_count;

        let constant = match (p_count, n_count) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };

        if let Some(value) = constant {
            for &t in &perm[begin..end] {
                dec_values[t] = value;
            }
            continue;
        }

        let submodel = train_inner(&subprob, &subparam, rng, cancel)?;
        let sign = f64::from(submodel.labels().first().copied().unwrap_or(1));
        for &t in &perm[begin..end] {
            let (_, values) = submodel.predict_values(&problem.x[t]);
            dec_values[t] = values[0] * sign;
        }
    }

    Ok(sigmoid_train(&dec_values, &problem.y))
}

/// Laplace scale of the cross-validated regression residuals.
///
/// Residuals beyond `5 * sqrt(2 * mae²)` are treated as outliers and left
/// out of the final mean absolute error.
pub(crate) fn svr_probability(
    problem: &Problem,
    param: &SvmParameter,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<f64> {
    let newparam = SvmParameter {
        probability: false,
        ..param.clone()
    };
    let predicted = cross_validation_inner(problem, &newparam, PROBABILITY_FOLDS, rng, cancel)?;

    let residuals: Vec<f64> = problem
        .y
        .iter()
        .zip(&predicted)
        .map(|(y, p)| y - p)
        .collect();
    let l = residuals.len() as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l;
    let std = (2.0 * mae * mae).sqrt();

    let inliers: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let mae = if inliers.is_empty() {
        mae
    } else {
        inliers.iter().sum::<f64>() / inliers.len() as f64
    };

    info!(
        "prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {mae}"
    );
    Ok(mae)
}

/// Density marks from the sorted training decision values of a one-class model.
///
/// Returns `None` when fewer than five values fall on either side of zero.
pub(crate) fn one_class_density_marks(dec_values: &[f64]) -> Option<Vec<f64>> {
    let mut values = dec_values.to_vec();
    values.sort_by(f64::total_cmp);

    let l = values.len();
    let neg_counter = values.iter().position(|&v| v >= 0.0).unwrap_or(l);
    let pos_counter = l - neg_counter;
    let mid = NR_MARKS / 2;

    if neg_counter < mid || pos_counter < mid {
        warn!(
            "number of positive or negative decision values < {mid}; \
             too few to do a probability estimation"
        );
        return None;
    }

    let mut tmp_marks = vec![0.0; NR_MARKS + 1];
    for i in 0..mid {
        tmp_marks[i] = values[i * neg_counter / mid];
    }
    tmp_marks[mid] = 0.0;
    for i in mid + 1..=NR_MARKS {
        tmp_marks[i] = values[neg_counter - 1 + (i - mid) * pos_counter / mid];
    }

    Some(
        tmp_marks
            .windows(2)
            .map(|w| (w[0] + w[1]) / 2.0)
            .collect(),
    )
}

/// Map a one-class decision value onto the density marks
pub(crate) fn predict_one_class_probability(marks: &[f64], dec_value: f64) -> f64 {
    let nr_marks = marks.len();
    if nr_marks == 0 {
        return 0.5;
    }
    if dec_value < marks[0] {
        return 0.001;
    }
    if dec_value >= marks[nr_marks - 1] {
        return 0.999;
    }
    (1..nr_marks)
        .find(|&i| dec_value < marks[i])
        .map_or(0.999, |i| i as f64 / nr_marks as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_predict_is_stable() {
        assert_relative_eq!(sigmoid_predict(0.0, 1.0, 0.0), 0.5, epsilon = 1e-15);
        assert!(sigmoid_predict(1e6, 1.0, 0.0).is_finite());
        assert!(sigmoid_predict(-1e6, 1.0, 0.0).is_finite());
        assert_relative_eq!(sigmoid_predict(-1e6, 1.0, 0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(sigmoid_predict(1e6, 1.0, 0.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sigmoid_train_orients_positive_values() {
        // Positive decision values belong to the positive class
        let dec: Vec<f64> = vec![-3.0, -2.0, -1.5, -0.5, 0.2, 0.5, 1.0, 2.0, 2.5, 3.0];
        let labels: Vec<f64> = vec![-1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let (a, b) = sigmoid_train(&dec, &labels);

        // P(y = 1 | f) = 1 / (1 + exp(A f + B)) must increase with f
        assert!(a < 0.0);
        assert!(sigmoid_predict(2.0, a, b) > 0.7);
        assert!(sigmoid_predict(-2.0, a, b) < 0.3);
    }

    #[test]
    fn test_sigmoid_train_single_class() {
        let dec = vec![1.0, 2.0, 3.0];
        let labels = vec![1.0, 1.0, 1.0];
        let (a, b) = sigmoid_train(&dec, &labels);
        assert!(a.is_finite() && b.is_finite());
    }

    #[test]
    fn test_multiclass_probability_sums_to_one() {
        let r = vec![
            vec![0.0, 0.7, 0.8],
            vec![0.3, 0.0, 0.6],
            vec![0.2, 0.4, 0.0],
        ];
        let p = multiclass_probability(3, &r);
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn test_multiclass_probability_residual_below_tolerance() {
        let r = vec![
            vec![0.0, 0.9, 0.6, 0.55],
            vec![0.1, 0.0, 0.35, 0.2],
            vec![0.4, 0.65, 0.0, 0.5],
            vec![0.45, 0.8, 0.5, 0.0],
        ];
        let k = 4;
        let p = multiclass_probability(k, &r);

        let mut q = vec![vec![0.0; k]; k];
        for t in 0..k {
            for j in 0..k {
                if j == t {
                    continue;
                }
                q[t][t] += r[j][t] * r[j][t];
                q[t][j] = -r[j][t] * r[t][j];
            }
        }
        let qp: Vec<f64> = (0..k)
            .map(|t| (0..k).map(|j| q[t][j] * p[j]).sum())
            .collect();
        let pqp: f64 = (0..k).map(|t| p[t] * qp[t]).sum();
        for v in qp {
            assert!((v - pqp).abs() < 1e-3, "residual {}", (v - pqp).abs());
        }
    }

    #[test]
    fn test_multiclass_probability_uniform() {
        let r = vec![vec![0.5; 4]; 4];
        let p = multiclass_probability(4, &r);
        for v in p {
            assert_relative_eq!(v, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_density_marks() {
        let values: Vec<f64> = (-10..10).map(|v| v as f64 + 0.5).collect();
        let marks = one_class_density_marks(&values).unwrap();
        assert_eq!(marks.len(), NR_MARKS);
        assert!(marks.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(predict_one_class_probability(&marks, -100.0), 0.001);
        assert_eq!(predict_one_class_probability(&marks, 100.0), 0.999);
        let mid = predict_one_class_probability(&marks, 0.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_density_marks_need_both_sides() {
        let values = vec![-1.0, -0.5, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(one_class_density_marks(&values).is_none());
    }
}
