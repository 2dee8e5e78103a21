//! Trained SVM model
//!
//! A model is produced once by training (or loaded from disk) and is
//! read-only afterwards. Classification models with `k` classes keep
//! `k(k-1)/2` pairwise decision functions over a shared pool of support
//! vectors grouped by class; one-class and regression models keep a
//! single decision function.
//!
//! Coefficient layout for classification: `sv_coef` has `k - 1` rows of
//! `total_sv` entries. For the pair `(i, j)`, `i < j`, the coefficients of
//! class `i`'s support vectors live in row `j - 1` and those of class `j`'s
//! support vectors in row `i`.

pub mod predict;

use crate::core::{SparseVector, SvmParameter, SvmType};
use crate::kernel::KernelFunction;
use serde::{Deserialize, Serialize};

/// A trained SVM model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    /// Parameters used for training, with gamma resolved
    pub(crate) param: SvmParameter,
    /// Number of classes (2 for one-class and regression)
    pub(crate) nr_class: usize,
    /// Support vectors, grouped by class for classification
    pub(crate) sv: Vec<SparseVector>,
    /// `k - 1` rows of `total_sv` coefficients
    pub(crate) sv_coef: Vec<Vec<f64>>,
    /// One offset per pairwise decision function
    pub(crate) rho: Vec<f64>,
    /// Sigmoid slopes per pair (classification), or the Laplace scale (regression)
    pub(crate) prob_a: Vec<f64>,
    /// Sigmoid intercepts per pair
    pub(crate) prob_b: Vec<f64>,
    /// Decision-value marks for one-class probability output
    pub(crate) prob_density_marks: Vec<f64>,
    /// 1-based positions of the support vectors in the training problem
    pub(crate) sv_indices: Vec<usize>,
    /// Class labels in internal order
    pub(crate) label: Vec<i32>,
    /// Support vectors per class
    pub(crate) n_sv: Vec<usize>,
}

impl SvmModel {
    pub fn param(&self) -> &SvmParameter {
        &self.param
    }

    pub fn svm_type(&self) -> SvmType {
        self.param.svm_type
    }

    /// Number of classes; 2 for one-class and regression models
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in the order used by decision values and probabilities
    pub fn labels(&self) -> &[i32] {
        &self.label
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.sv
    }

    pub fn total_sv(&self) -> usize {
        self.sv.len()
    }

    /// Support vectors per class (classification only)
    pub fn n_sv(&self) -> &[usize] {
        &self.n_sv
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    /// 1-based indices of the support vectors in the training problem
    pub fn sv_indices(&self) -> &[usize] {
        &self.sv_indices
    }

    pub fn prob_a(&self) -> &[f64] {
        &self.prob_a
    }

    pub fn prob_b(&self) -> &[f64] {
        &self.prob_b
    }

    pub fn prob_density_marks(&self) -> &[f64] {
        &self.prob_density_marks
    }

    /// Whether `predict_probability` returns calibrated estimates
    pub fn check_probability_model(&self) -> bool {
        match self.param.svm_type {
            SvmType::CSvc | SvmType::NuSvc => !self.prob_a.is_empty() && !self.prob_b.is_empty(),
            SvmType::EpsilonSvr | SvmType::NuSvr => !self.prob_a.is_empty(),
            SvmType::OneClass => !self.prob_density_marks.is_empty(),
        }
    }

    /// Laplace scale σ of the regression residuals, when fitted
    pub fn svr_probability(&self) -> Option<f64> {
        if self.param.svm_type.is_regression() {
            self.prob_a.first().copied()
        } else {
            None
        }
    }

    pub(crate) fn kernel(&self) -> KernelFunction {
        KernelFunction::from_parameter(&self.param)
    }
}
