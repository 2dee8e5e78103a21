//! High-level API for Support Vector Machine operations
//!
//! This module provides a user-friendly interface for common SVM tasks,
//! including training, prediction, cross-validation and model evaluation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use svmkit::api::SVM;
//! use svmkit::{KernelType, SvmType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Train a model on data
//! let model = SVM::new()
//!     .with_svm_type(SvmType::CSvc)
//!     .with_kernel_type(KernelType::Rbf)
//!     .with_c(10.0)
//!     .train_from_file("data.libsvm")?;
//!
//! // Make predictions
//! let predictions = model.predict_from_file("test.libsvm")?;
//! let metrics = model.evaluate_from_file("test.libsvm")?;
//! println!("{} predictions, accuracy {:.2}%", predictions.len(), metrics.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    CancellationToken, Dataset, KernelType, Problem, Result, SparseVector, SvmParameter, SvmType,
};
use crate::data::LibSVMDataset;
use crate::model::SvmModel;
use crate::optimizer::{cross_validation_with, train_with, TrainOptions};
use std::path::Path;

/// High-level SVM interface with builder pattern
#[derive(Debug, Clone, Default)]
pub struct SVM {
    param: SvmParameter,
    options: TrainOptions,
}

impl SVM {
    /// Create a new SVM with default parameters (C-SVC, RBF kernel)
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing parameter set
    pub fn with_parameter(param: SvmParameter) -> Self {
        Self {
            param,
            options: TrainOptions::default(),
        }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.param.svm_type = svm_type;
        self
    }

    pub fn with_kernel_type(mut self, kernel_type: KernelType) -> Self {
        self.param.kernel_type = kernel_type;
        self
    }

    /// Kernel gamma; 0 means `1 / num_features`
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.param.gamma = gamma;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.param.degree = degree;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.param.coef0 = coef0;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.param.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.param.nu = nu;
        self
    }

    /// Width of the insensitive tube for epsilon-SVR
    pub fn with_p(mut self, p: f64) -> Self {
        self.param.p = p;
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.param.cache_size = megabytes;
        self
    }

    /// Set stopping tolerance on the KKT violation
    pub fn with_tolerance(mut self, eps: f64) -> Self {
        self.param.eps = eps;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.param.shrinking = shrinking;
        self
    }

    /// Fit probability estimates during training
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.param.probability = probability;
        self
    }

    /// Multiply C by `weight` for the class `label` (C-SVC)
    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        self.param.weights.push((label, weight));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    pub fn param(&self) -> &SvmParameter {
        &self.param
    }

    /// Train on a dataset
    pub fn train<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<TrainedModel> {
        self.train_problem(&Problem::from_dataset(dataset))
    }

    pub fn train_problem(&self, problem: &Problem) -> Result<TrainedModel> {
        let model = train_with(problem, &self.param, &self.options)?;
        Ok(TrainedModel { model })
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<TrainedModel> {
        let dataset = LibSVMDataset::from_file(path)?;
        self.train_problem(&dataset.to_problem())
    }

    /// k-fold cross-validation, scored against the dataset's own labels
    pub fn cross_validate<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        nr_fold: usize,
    ) -> Result<EvaluationMetrics> {
        let problem = Problem::from_dataset(dataset);
        let predicted = cross_validation_with(&problem, &self.param, nr_fold, &self.options)?;
        Ok(EvaluationMetrics::from_predictions(&predicted, &problem.y))
    }
}

/// Trained SVM model with high-level prediction interface
#[derive(Debug, Clone)]
pub struct TrainedModel {
    model: SvmModel,
}

impl From<SvmModel> for TrainedModel {
    fn from(model: SvmModel) -> Self {
        Self { model }
    }
}

impl TrainedModel {
    /// Predicted label or value for a single vector
    pub fn predict(&self, x: &SparseVector) -> f64 {
        self.model.predict(x)
    }

    /// Prediction plus per-class probabilities when the model has them
    pub fn predict_probability(&self, x: &SparseVector) -> (f64, Option<Vec<f64>>) {
        self.model.predict_probability(x)
    }

    /// Predict from dataset
    pub fn predict_dataset<D: Dataset + ?Sized>(&self, dataset: &D) -> Vec<f64> {
        (0..dataset.len())
            .map(|i| self.predict(&dataset.get_sample(i).features))
            .collect()
    }

    /// Predict from LibSVM file
    pub fn predict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<f64>> {
        let dataset = LibSVMDataset::from_file(path)?;
        Ok(self.predict_dataset(&dataset))
    }

    /// Compare predictions with the dataset's labels
    pub fn evaluate<D: Dataset + ?Sized>(&self, dataset: &D) -> EvaluationMetrics {
        let predicted = self.predict_dataset(dataset);
        EvaluationMetrics::from_predictions(&predicted, &dataset.get_labels())
    }

    /// Evaluate from LibSVM file
    pub fn evaluate_from_file<P: AsRef<Path>>(&self, path: P) -> Result<EvaluationMetrics> {
        let dataset = LibSVMDataset::from_file(path)?;
        Ok(self.evaluate(&dataset))
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        ModelInfo::from(&self.model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.model.save(path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            model: SvmModel::load(path)?,
        })
    }

    /// Get the underlying trained model
    pub fn inner(&self) -> &SvmModel {
        &self.model
    }

    pub fn into_inner(self) -> SvmModel {
        self.model
    }
}

/// Classification and regression scores for a set of predictions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationMetrics {
    pub total: usize,
    /// Predictions equal to the target
    pub correct: usize,
    pub squared_error: f64,
    sum_p: f64,
    sum_t: f64,
    sum_pp: f64,
    sum_tt: f64,
    sum_pt: f64,
}

impl EvaluationMetrics {
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Self {
        let mut metrics = Self::default();
        for (&p, &t) in predicted.iter().zip(actual) {
            metrics.total += 1;
            if p == t {
                metrics.correct += 1;
            }
            metrics.squared_error += (p - t) * (p - t);
            metrics.sum_p += p;
            metrics.sum_t += t;
            metrics.sum_pp += p * p;
            metrics.sum_tt += t * t;
            metrics.sum_pt += p * t;
        }
        metrics
    }

    /// Fraction of exact matches
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn mean_squared_error(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.squared_error / self.total as f64
        }
    }

    /// Squared Pearson correlation between predictions and targets
    pub fn squared_correlation(&self) -> f64 {
        let n = self.total as f64;
        let numerator = n * self.sum_pt - self.sum_p * self.sum_t;
        let denominator = (n * self.sum_pp - self.sum_p * self.sum_p)
            * (n * self.sum_tt - self.sum_t * self.sum_t);
        if denominator == 0.0 {
            0.0
        } else {
            numerator * numerator / denominator
        }
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    pub nr_class: usize,
    pub labels: Vec<i32>,
    pub total_sv: usize,
    pub n_sv: Vec<usize>,
    pub rho: Vec<f64>,
    pub has_probability: bool,
}

impl From<&SvmModel> for ModelInfo {
    fn from(model: &SvmModel) -> Self {
        Self {
            svm_type: model.svm_type(),
            kernel_type: model.param().kernel_type,
            nr_class: model.nr_class(),
            labels: model.labels().to_vec(),
            total_sv: model.total_sv(),
            n_sv: model.n_sv().to_vec(),
            rho: model.rho().to_vec(),
            has_probability: model.check_probability_model(),
        }
    }
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train a C-SVC with default parameters on LibSVM data
    pub fn train_libsvm<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
        SVM::new().train_from_file(path)
    }

    /// Quick evaluation: train on training file, test on test file
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        train_path: P1,
        test_path: P2,
    ) -> Result<EvaluationMetrics> {
        let model = train_libsvm(train_path)?;
        model.evaluate_from_file(test_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Sample;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct MockDataset {
        samples: Vec<Sample>,
    }

    impl Dataset for MockDataset {
        fn len(&self) -> usize {
            self.samples.len()
        }
        fn dim(&self) -> usize {
            1
        }
        fn get_sample(&self, i: usize) -> Sample {
            self.samples[i].clone()
        }
        fn get_labels(&self) -> Vec<f64> {
            self.samples.iter().map(|s| s.label).collect()
        }
    }

    fn line_samples() -> Vec<Sample> {
        [2.0, -2.0, 1.5, -1.5, 1.8, -1.8]
            .iter()
            .map(|&v| Sample::new(SparseVector::new(vec![0], vec![v]), v.signum()))
            .collect()
    }

    #[test]
    fn test_svm_builder_pattern() {
        let svm = SVM::new()
            .with_svm_type(SvmType::NuSvc)
            .with_kernel_type(KernelType::Polynomial)
            .with_degree(2)
            .with_c(2.0)
            .with_nu(0.3)
            .with_tolerance(0.01)
            .with_shrinking(false)
            .with_weight(1, 3.0);

        let param = svm.param();
        assert_eq!(param.svm_type, SvmType::NuSvc);
        assert_eq!(param.kernel_type, KernelType::Polynomial);
        assert_eq!(param.degree, 2);
        assert_eq!(param.c, 2.0);
        assert_eq!(param.nu, 0.3);
        assert_eq!(param.eps, 0.01);
        assert!(!param.shrinking);
        assert_eq!(param.weights, vec![(1, 3.0)]);
    }

    #[test]
    fn test_quick_training() {
        let dataset = MockDataset {
            samples: line_samples(),
        };

        let model = SVM::new()
            .with_kernel_type(KernelType::Linear)
            .train(&dataset)
            .expect("Training should succeed");

        assert_eq!(model.predict(&SparseVector::new(vec![0], vec![1.0])), 1.0);
        assert_eq!(model.evaluate(&dataset).accuracy(), 1.0);

        let info = model.info();
        assert_eq!(info.nr_class, 2);
        assert_eq!(info.labels, vec![1, -1]);
        assert!(info.total_sv > 0);
        assert!(!info.has_probability);
    }

    #[test]
    fn test_evaluation_metrics() {
        let metrics = EvaluationMetrics::from_predictions(&[1.0, 2.0, 3.0, 5.0], &[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(metrics.accuracy(), 0.75);
        assert_relative_eq!(metrics.mean_squared_error(), 0.25);
        assert!(metrics.squared_correlation() > 0.9);

        let perfect = EvaluationMetrics::from_predictions(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert_relative_eq!(perfect.squared_correlation(), 1.0, epsilon = 1e-12);

        let empty = EvaluationMetrics::from_predictions(&[], &[]);
        assert_eq!(empty.accuracy(), 0.0);
        assert_eq!(empty.squared_correlation(), 0.0);
    }

    #[test]
    fn test_file_operations() {
        // Create temporary LibSVM file
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:2.0").expect("Failed to write");
        writeln!(temp_file, "-1 1:-2.0").expect("Failed to write");
        writeln!(temp_file, "+1 1:1.5").expect("Failed to write");
        writeln!(temp_file, "-1 1:-1.5").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let model = SVM::new()
            .with_kernel_type(KernelType::Linear)
            .train_from_file(temp_file.path())
            .expect("Training should succeed");

        let metrics = model
            .evaluate_from_file(temp_file.path())
            .expect("Evaluation should succeed");
        assert_eq!(metrics.accuracy(), 1.0);

        let model_file = NamedTempFile::new().expect("Failed to create temp file");
        model.save(model_file.path()).expect("Save should succeed");
        let loaded = TrainedModel::load(model_file.path()).expect("Load should succeed");
        assert_eq!(loaded.info(), model.info());

        let metrics = quick::evaluate_split(temp_file.path(), temp_file.path())
            .expect("Quick evaluation should succeed");
        assert_eq!(metrics.total, 4);
    }

    #[test]
    fn test_cross_validate() {
        let dataset = MockDataset {
            samples: line_samples(),
        };
        let metrics = SVM::new()
            .with_kernel_type(KernelType::Linear)
            .with_seed(5)
            .cross_validate(&dataset, 3)
            .expect("Cross-validation should succeed");

        assert_eq!(metrics.total, 6);
        assert_eq!(metrics.accuracy(), 1.0);
    }
}
