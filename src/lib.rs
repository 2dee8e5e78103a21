//! Support Vector Machines in pure Rust
//!
//! Training uses the SMO decomposition method with second-order working-set
//! selection and shrinking, as described in "Working Set Selection Using
//! Second Order Information for Training SVM" by Fan, Chen and Lin.
//! Supported formulations are C-SVC, nu-SVC, one-class SVM, epsilon-SVR and
//! nu-SVR; multi-class problems use one-vs-one voting, and probability
//! estimates come from Platt scaling with pairwise coupling.
//!
//! ```rust
//! use svmkit::{train, KernelType, Problem, SparseVector, SvmParameter};
//!
//! let x = vec![
//!     SparseVector::from_dense(&[1.0, 1.0]),
//!     SparseVector::from_dense(&[2.0, 2.0]),
//!     SparseVector::from_dense(&[-1.0, -1.0]),
//!     SparseVector::from_dense(&[-2.0, -2.0]),
//! ];
//! let problem = Problem::new(x, vec![1.0, 1.0, -1.0, -1.0]).unwrap();
//! let param = SvmParameter {
//!     kernel_type: KernelType::Linear,
//!     ..Default::default()
//! };
//!
//! let model = train(&problem, &param).unwrap();
//! assert_eq!(model.predict(&SparseVector::from_dense(&[3.0, 2.5])), 1.0);
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod persistence;
pub mod probability;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, ModelInfo, TrainedModel, SVM};
pub use crate::cache::{CacheStats, RowCache};
pub use crate::core::*;
pub use crate::data::LibSVMDataset;
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::model::SvmModel;
pub use crate::optimizer::{cross_validation, cross_validation_with, train, train_with, TrainOptions};
pub use crate::persistence::{load_model, save_model, ModelMetadata};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
