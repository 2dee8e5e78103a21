//! SVM solver implementations
//!
//! A generalized SMO solver with second-order working-set selection and
//! shrinking, driven through the [`QMatrix`] abstraction so the same code
//! trains classification, one-class and regression formulations.

pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::qmatrix::*;
pub use self::smo::*;
