//! k-fold cross-validation

use crate::core::{check_parameter, CancellationToken, Problem, Result, SVMError, SvmParameter};
use crate::optimizer::{group_classes, train_inner, TrainOptions};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Predict every example from a model trained on the other folds.
///
/// Classification folds are stratified by class. Returns one prediction per
/// example in the original order. `nr_fold` larger than the number of
/// examples falls back to leave-one-out.
pub fn cross_validation(
    problem: &Problem,
    param: &SvmParameter,
    nr_fold: usize,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    check_parameter(problem, param)?;
    let param = param.resolved_for(problem);
    cross_validation_inner(problem, &param, nr_fold, rng, None)
}

/// [`cross_validation`] seeded and cancelled through [`TrainOptions`]
pub fn cross_validation_with(
    problem: &Problem,
    param: &SvmParameter,
    nr_fold: usize,
    options: &TrainOptions,
) -> Result<Vec<f64>> {
    check_parameter(problem, param)?;
    let param = param.resolved_for(problem);
    let mut rng = StdRng::seed_from_u64(options.seed);
    cross_validation_inner(problem, &param, nr_fold, &mut rng, options.cancel.as_ref())
}

pub(crate) fn cross_validation_inner(
    problem: &Problem,
    param: &SvmParameter,
    nr_fold: usize,
    rng: &mut StdRng,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<f64>> {
    let l = problem.len();
    if l == 0 {
        return Err(SVMError::EmptyDataset);
    }
    if nr_fold < 2 {
        return Err(SVMError::InvalidParameter(format!(
            "number of folds must be at least 2, got {nr_fold}"
        )));
    }

    let mut nr_fold = nr_fold;
    if nr_fold > l {
        warn!("{nr_fold} folds requested for {l} examples; using leave-one-out");
        nr_fold = l;
    }

    let (perm, fold_start) = if param.svm_type.is_classification() && nr_fold < l {
        stratified_folds(&problem.y, nr_fold, rng)
    } else {
        let mut perm: Vec<usize> = (0..l).collect();
        perm.shuffle(rng);
        let fold_start = (0..=nr_fold).map(|i| i * l / nr_fold).collect();
        (perm, fold_start)
    };
    debug!("cross-validation with {nr_fold} folds over {l} examples");

    let seeds: Vec<u64> = (0..nr_fold).map(|_| rng.random()).collect();
    let use_probability = param.probability && param.svm_type.is_classification();

    let folds = (0..nr_fold)
        .into_par_iter()
        .zip(seeds.into_par_iter())
        .map(|(fold, seed)| {
            let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
            let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
            let subprob = problem.subset(&train_idx);

            let mut fold_rng = StdRng::seed_from_u64(seed);
            let submodel = train_inner(&subprob, param, &mut fold_rng, cancel)?;

            let predictions: Vec<(usize, f64)> = perm[begin..end]
                .iter()
                .map(|&t| {
                    let x = &problem.x[t];
                    let value = if use_probability {
                        submodel.predict_probability(x).0
                    } else {
                        submodel.predict(x)
                    };
                    (t, value)
                })
                .collect();
            Ok(predictions)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut target = vec![0.0; l];
    for (t, value) in folds.into_iter().flatten() {
        target[t] = value;
    }
    Ok(target)
}

/// Shuffle each class and deal it evenly across the folds.
///
/// Returns the example order and the `nr_fold + 1` fold boundaries into it.
fn stratified_folds(y: &[f64], nr_fold: usize, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let groups = group_classes(y);
    let nr_class = groups.label.len();

    let mut index = groups.perm.clone();
    for c in 0..nr_class {
        let s = groups.start[c];
        index[s..s + groups.count[c]].shuffle(rng);
    }

    let fold_count: Vec<usize> = (0..nr_fold)
        .map(|i| {
            groups
                .count
                .iter()
                .map(|&n| (i + 1) * n / nr_fold - i * n / nr_fold)
                .sum()
        })
        .collect();

    let mut fold_start = vec![0usize; nr_fold + 1];
    for i in 1..=nr_fold {
        fold_start[i] = fold_start[i - 1] + fold_count[i - 1];
    }

    let mut fill = fold_start.clone();
    let mut perm = vec![0usize; y.len()];
    for c in 0..nr_class {
        let (s, n) = (groups.start[c], groups.count[c]);
        for i in 0..nr_fold {
            let begin = s + i * n / nr_fold;
            let end = s + (i + 1) * n / nr_fold;
            for &example in &index[begin..end] {
                perm[fill[i]] = example;
                fill[i] += 1;
            }
        }
    }

    (perm, fold_start)
}
