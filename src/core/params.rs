//! Training parameters and their validation

use crate::core::{Problem, Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five supported SVM formulations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SvmType {
    /// C-support vector classification
    CSvc,
    /// nu-support vector classification
    NuSvc,
    /// One-class SVM (distribution estimation)
    OneClass,
    /// epsilon-support vector regression
    EpsilonSvr,
    /// nu-support vector regression
    NuSvr,
}

impl SvmType {
    /// Whether the formulation assigns class labels (C-SVC, nu-SVC)
    pub fn is_classification(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    /// Whether the formulation predicts a real value (epsilon-SVR, nu-SVR)
    pub fn is_regression(self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }

    /// Name used in the text model format
    pub fn as_str(self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "c_svc" | "c-svc" | "csvc" => Ok(SvmType::CSvc),
            "nu_svc" | "nu-svc" | "nusvc" => Ok(SvmType::NuSvc),
            "one_class" | "one-class" | "oneclass" => Ok(SvmType::OneClass),
            "epsilon_svr" | "epsilon-svr" | "eps_svr" | "epsilonsvr" => Ok(SvmType::EpsilonSvr),
            "nu_svr" | "nu-svr" | "nusvr" => Ok(SvmType::NuSvr),
            other => Err(SVMError::ParseError(format!("unknown svm type '{other}'"))),
        }
    }
}

/// The four supported kernel families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
}

impl KernelType {
    /// Name used in the text model format
    pub fn as_str(self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(KernelType::Linear),
            "polynomial" | "poly" => Ok(KernelType::Polynomial),
            "rbf" => Ok(KernelType::Rbf),
            "sigmoid" | "tanh" => Ok(KernelType::Sigmoid),
            other => Err(SVMError::ParseError(format!("unknown kernel type '{other}'"))),
        }
    }
}

/// Hyperparameters for a training run.
///
/// `gamma == 0.0` means "use `1 / num_features`", resolved when training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParameter {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    pub gamma: f64,
    pub coef0: f64,
    /// Row cache size in megabytes
    pub cache_size: f64,
    /// Stopping tolerance on the maximal KKT violation
    pub eps: f64,
    /// Cost for C-SVC, epsilon-SVR and nu-SVR
    pub c: f64,
    /// nu for nu-SVC, one-class and nu-SVR
    pub nu: f64,
    /// Width of the epsilon-insensitive tube for epsilon-SVR
    pub p: f64,
    pub shrinking: bool,
    /// Fit probability estimates after training
    pub probability: bool,
    /// Per-class multipliers on C, keyed by class label
    pub weights: Vec<(i32, f64)>,
}

impl Default for SvmParameter {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            eps: 1e-3,
            c: 1.0,
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
            weights: Vec::new(),
        }
    }
}

impl SvmParameter {
    /// Copy of the parameters with `gamma == 0` replaced by `1 / num_features`
    pub fn resolved_for(&self, problem: &Problem) -> Self {
        let mut param = self.clone();
        if param.gamma == 0.0 {
            let num_features = problem.num_features();
            if num_features > 0 {
                param.gamma = 1.0 / num_features as f64;
            }
        }
        param
    }
}

/// Validate `param` against `problem` before any solving happens
pub fn check_parameter(problem: &Problem, param: &SvmParameter) -> Result<()> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    if problem.x.len() != problem.y.len() {
        return Err(SVMError::DimensionMismatch {
            expected: problem.x.len(),
            actual: problem.y.len(),
        });
    }

    if param.kernel_type == KernelType::Polynomial && param.degree < 0 {
        return Err(invalid(format!("degree must be >= 0, got {}", param.degree)));
    }
    if !(param.gamma >= 0.0) {
        return Err(invalid(format!("gamma must be >= 0, got {}", param.gamma)));
    }
    if !(param.cache_size > 0.0) {
        return Err(invalid(format!(
            "cache_size must be > 0, got {}",
            param.cache_size
        )));
    }
    if !(param.eps > 0.0) {
        return Err(invalid(format!("eps must be > 0, got {}", param.eps)));
    }

    match param.svm_type {
        SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr if !(param.c > 0.0) => {
            return Err(invalid(format!("C must be > 0, got {}", param.c)));
        }
        _ => {}
    }
    match param.svm_type {
        SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
            if !(param.nu > 0.0 && param.nu <= 1.0) =>
        {
            return Err(invalid(format!("nu must be in (0, 1], got {}", param.nu)));
        }
        _ => {}
    }
    if param.svm_type == SvmType::EpsilonSvr && !(param.p >= 0.0) {
        return Err(invalid(format!("p must be >= 0, got {}", param.p)));
    }
    if let Some(&(label, weight)) = param
        .weights
        .iter()
        .find(|(_, w)| !(w.is_finite() && *w > 0.0))
    {
        return Err(invalid(format!(
            "weight for class {label} must be > 0, got {weight}"
        )));
    }

    if param.svm_type == SvmType::NuSvc {
        check_nu_feasibility(problem, param.nu)?;
    }

    Ok(())
}

fn check_nu_feasibility(problem: &Problem, nu: f64) -> Result<()> {
    let mut labels: Vec<i32> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for &y in &problem.y {
        let label = y as i32;
        match labels.iter().position(|&l| l == label) {
            Some(pos) => counts[pos] += 1,
            None => {
                labels.push(label);
                counts.push(1);
            }
        }
    }

    for i in 0..counts.len() {
        for j in i + 1..counts.len() {
            let (n1, n2) = (counts[i] as f64, counts[j] as f64);
            if nu * (n1 + n2) / 2.0 > n1.min(n2) {
                return Err(SVMError::InfeasibleNu);
            }
        }
    }
    Ok(())
}

fn invalid(msg: String) -> SVMError {
    SVMError::InvalidParameter(msg)
}
