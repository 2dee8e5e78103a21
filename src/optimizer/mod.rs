//! Model training
//!
//! Ties the kernels, the SMO solver and probability calibration together.
//! Classification problems are split into one binary sub-problem per pair
//! of classes and the pairs are trained in parallel; one-class and
//! regression problems train a single decision function.

pub mod cross_validation;
pub mod formulations;

pub use cross_validation::*;
pub use formulations::{train_one, DecisionFunction};

use crate::core::{
    check_parameter, CancellationToken, Problem, Result, SVMError, SparseVector, SvmParameter,
    SvmType,
};
use crate::model::SvmModel;
use crate::probability::{binary_svc_probability, one_class_density_marks, svr_probability};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Seed used when the caller does not pick one
pub const DEFAULT_SEED: u64 = 1;

/// Knobs that affect how training runs but not what it computes
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Seed for the shuffles in probability calibration and cross-validation
    pub seed: u64,
    /// Checked once per solver iteration
    pub cancel: Option<CancellationToken>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            cancel: None,
        }
    }
}

impl TrainOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Train a model with default options.
///
/// Parameters are validated first; a gamma of 0 is replaced by
/// `1 / num_features`.
pub fn train(problem: &Problem, param: &SvmParameter) -> Result<SvmModel> {
    train_with(problem, param, &TrainOptions::default())
}

/// Train a model with an explicit seed and optional cancellation.
///
/// Identical inputs and seeds give identical models regardless of how many
/// threads rayon uses.
pub fn train_with(
    problem: &Problem,
    param: &SvmParameter,
    options: &TrainOptions,
) -> Result<SvmModel> {
    check_parameter(problem, param)?;
    let param = param.resolved_for(problem);
    let mut rng = StdRng::seed_from_u64(options.seed);
    train_inner(problem, &param, &mut rng, options.cancel.as_ref())
}

/// Training without validation, for callers that already checked `param`.
pub(crate) fn train_inner(
    problem: &Problem,
    param: &SvmParameter,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<SvmModel> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }

    match param.svm_type {
        SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
            train_single(problem, param, rng, cancel)
        }
        SvmType::CSvc | SvmType::NuSvc => train_classifier(problem, param, rng, cancel),
    }
}

/// Training examples grouped by class
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassGroups {
    /// Distinct labels in order of first appearance
    pub label: Vec<i32>,
    /// Offset of each class in `perm`
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    /// Example indices ordered by class
    pub perm: Vec<usize>,
}

/// Group examples by label (labels are truncated to integers).
///
/// Classes are numbered by first appearance, except that a binary `{-1, +1}`
/// problem listing `-1` first is flipped so `+1` is class 0.
pub(crate) fn group_classes(y: &[f64]) -> ClassGroups {
    let mut label: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut data_label = Vec::with_capacity(y.len());

    for &value in y {
        let this_label = value as i32;
        match label.iter().position(|&l| l == this_label) {
            Some(j) => {
                count[j] += 1;
                data_label.push(j);
            }
            None => {
                data_label.push(label.len());
                label.push(this_label);
                count.push(1);
            }
        }
    }

    if label.len() == 2 && label[0] == -1 && label[1] == 1 {
        label.swap(0, 1);
        count.swap(0, 1);
        for d in data_label.iter_mut() {
            *d = 1 - *d;
        }
    }

    let nr_class = label.len();
    let mut start = vec![0usize; nr_class];
    for i in 1..nr_class {
        start[i] = start[i - 1] + count[i - 1];
    }

    let mut fill = start.clone();
    let mut perm = vec![0usize; y.len()];
    for (i, &d) in data_label.iter().enumerate() {
        perm[fill[d]] = i;
        fill[d] += 1;
    }

    ClassGroups {
        label,
        start,
        count,
        perm,
    }
}

fn train_single(
    problem: &Problem,
    param: &SvmParameter,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<SvmModel> {
    let mut prob_a = Vec::new();
    if param.probability && param.svm_type.is_regression() {
        prob_a.push(svr_probability(problem, param, rng, cancel)?);
    }

    let f = train_one(problem, param, 0.0, 0.0, cancel)?;

    let mut sv = Vec::new();
    let mut coef = Vec::new();
    let mut sv_indices = Vec::new();
    for (i, &a) in f.alpha.iter().enumerate() {
        if a.abs() > 0.0 {
            sv.push(problem.x[i].clone());
            coef.push(a);
            sv_indices.push(i + 1);
        }
    }

    let mut model = SvmModel {
        param: param.clone(),
        nr_class: 2,
        sv,
        sv_coef: vec![coef],
        rho: vec![f.rho],
        prob_a,
        prob_b: Vec::new(),
        prob_density_marks: Vec::new(),
        sv_indices,
        label: Vec::new(),
        n_sv: Vec::new(),
    };

    if param.probability && param.svm_type == SvmType::OneClass {
        let dec_values: Vec<f64> = problem
            .x
            .iter()
            .map(|x| model.predict_values(x).1[0])
            .collect();
        match one_class_density_marks(&dec_values) {
            Some(marks) => model.prob_density_marks = marks,
            None => warn!("too few training values on one side of the boundary for probability marks"),
        }
    }

    Ok(model)
}

/// Result of training one pair of classes
struct PairOutcome {
    f: DecisionFunction,
    probability: Option<(f64, f64)>,
}

fn train_classifier(
    problem: &Problem,
    param: &SvmParameter,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<SvmModel> {
    let groups = group_classes(&problem.y);
    let nr_class = groups.label.len();
    if nr_class == 1 {
        warn!("training data in only one class; the model predicts it unconditionally");
    }

    let x: Vec<&SparseVector> = groups.perm.iter().map(|&i| &problem.x[i]).collect();

    let mut weighted_c = vec![param.c; nr_class];
    for &(weight_label, weight) in &param.weights {
        match groups.label.iter().position(|&l| l == weight_label) {
            Some(j) => weighted_c[j] *= weight,
            None => warn!("class label {weight_label} specified in weight is not found"),
        }
    }

    let pairs: Vec<(usize, usize)> = (0..nr_class)
        .flat_map(|i| (i + 1..nr_class).map(move |j| (i, j)))
        .collect();
    // Drawn up front so the result does not depend on scheduling
    let seeds: Vec<u64> = pairs.iter().map(|_| rng.random()).collect();
    debug!("training {} pairwise classifiers", pairs.len());

    let outcomes = pairs
        .par_iter()
        .zip(seeds.par_iter())
        .map(|(&(i, j), &seed)| {
            let (si, ci) = (groups.start[i], groups.count[i]);
            let (sj, cj) = (groups.start[j], groups.count[j]);

            let sub_x: Vec<SparseVector> = x[si..si + ci]
                .iter()
                .chain(&x[sj..sj + cj])
                .map(|&v| v.clone())
                .collect();
            let sub_y: Vec<f64> = std::iter::repeat(1.0)
                .take(ci)
                .chain(std::iter::repeat(-1.0).take(cj))
                .collect();
            let sub = Problem { x: sub_x, y: sub_y };

            let mut pair_rng = StdRng::seed_from_u64(seed);
            let probability = if param.probability {
                Some(binary_svc_probability(
                    &sub,
                    param,
                    weighted_c[i],
                    weighted_c[j],
                    &mut pair_rng,
                    cancel,
                )?)
            } else {
                None
            };

            let f = train_one(&sub, param, weighted_c[i], weighted_c[j], cancel)?;
            Ok(PairOutcome { f, probability })
        })
        .collect::<Result<Vec<_>>>()?;

    // Mark every example that is a support vector in at least one pair
    let l = problem.len();
    let mut nonzero = vec![false; l];
    for (&(i, j), outcome) in pairs.iter().zip(&outcomes) {
        let (si, ci) = (groups.start[i], groups.count[i]);
        let (sj, cj) = (groups.start[j], groups.count[j]);
        for k in 0..ci {
            if outcome.f.alpha[k].abs() > 0.0 {
                nonzero[si + k] = true;
            }
        }
        for k in 0..cj {
            if outcome.f.alpha[ci + k].abs() > 0.0 {
                nonzero[sj + k] = true;
            }
        }
    }

    let n_sv: Vec<usize> = (0..nr_class)
        .map(|c| {
            let s = groups.start[c];
            (s..s + groups.count[c]).filter(|&k| nonzero[k]).count()
        })
        .collect();
    let total_sv: usize = n_sv.iter().sum();
    info!("Total nSV = {total_sv}");

    let mut sv = Vec::with_capacity(total_sv);
    let mut sv_indices = Vec::with_capacity(total_sv);
    for k in 0..l {
        if nonzero[k] {
            sv.push(x[k].clone());
            sv_indices.push(groups.perm[k] + 1);
        }
    }

    let mut nz_start = vec![0usize; nr_class];
    for c in 1..nr_class {
        nz_start[c] = nz_start[c - 1] + n_sv[c - 1];
    }

    let mut sv_coef = vec![vec![0.0; total_sv]; nr_class.saturating_sub(1)];
    let mut rho = Vec::with_capacity(pairs.len());
    for (&(i, j), outcome) in pairs.iter().zip(&outcomes) {
        let (si, ci) = (groups.start[i], groups.count[i]);
        let (sj, cj) = (groups.start[j], groups.count[j]);

        let mut q = nz_start[i];
        for k in 0..ci {
            if nonzero[si + k] {
                sv_coef[j - 1][q] = outcome.f.alpha[k];
                q += 1;
            }
        }
        let mut q = nz_start[j];
        for k in 0..cj {
            if nonzero[sj + k] {
                sv_coef[i][q] = outcome.f.alpha[ci + k];
                q += 1;
            }
        }
        rho.push(outcome.f.rho);
    }

    let (prob_a, prob_b) = if param.probability {
        outcomes
            .iter()
            .filter_map(|outcome| outcome.probability)
            .unzip()
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(SvmModel {
        param: param.clone(),
        nr_class,
        sv,
        sv_coef,
        rho,
        prob_a,
        prob_b,
        prob_density_marks: Vec::new(),
        sv_indices,
        label: groups.label,
        n_sv,
    })
}
