//! Prediction with a trained model

use crate::core::{SparseVector, SvmType};
use crate::kernel::Kernel;
use crate::model::SvmModel;
use crate::probability::{multiclass_probability, predict_one_class_probability, sigmoid_predict};

/// Floor and ceiling for pairwise probabilities before coupling
const MIN_PROB: f64 = 1e-7;

impl SvmModel {
    /// Predicted label (classification), class `±1` (one-class) or value
    /// (regression), together with the raw decision values.
    ///
    /// Classification returns one decision value per pair `(i, j)`, `i < j`,
    /// in pair order; other types return a single value.
    pub fn predict_values(&self, x: &SparseVector) -> (f64, Vec<f64>) {
        let kernel = self.kernel();

        match self.param.svm_type {
            SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
                let coef = self.sv_coef.first().map(Vec::as_slice).unwrap_or(&[]);
                let sum: f64 = coef
                    .iter()
                    .zip(&self.sv)
                    .map(|(c, sv)| c * kernel.compute(x, sv))
                    .sum::<f64>()
                    - self.rho.first().copied().unwrap_or(0.0);

                let prediction = if self.param.svm_type == SvmType::OneClass {
                    if sum > 0.0 {
                        1.0
                    } else {
                        -1.0
                    }
                } else {
                    sum
                };
                (prediction, vec![sum])
            }
            SvmType::CSvc | SvmType::NuSvc => {
                let nr_class = self.nr_class;
                let kvalue: Vec<f64> = self.sv.iter().map(|sv| kernel.compute(x, sv)).collect();

                let mut start = vec![0usize; nr_class];
                for i in 1..nr_class {
                    start[i] = start[i - 1] + self.n_sv[i - 1];
                }

                let mut vote = vec![0usize; nr_class];
                let mut dec_values = Vec::with_capacity(nr_class * nr_class.saturating_sub(1) / 2);
                let mut p = 0;
                for i in 0..nr_class {
                    for j in i + 1..nr_class {
                        let (si, sj) = (start[i], start[j]);
                        let (ci, cj) = (self.n_sv[i], self.n_sv[j]);
                        let coef1 = &self.sv_coef[j - 1];
                        let coef2 = &self.sv_coef[i];

                        let mut sum = 0.0;
                        for k in si..si + ci {
                            sum += coef1[k] * kvalue[k];
                        }
                        for k in sj..sj + cj {
                            sum += coef2[k] * kvalue[k];
                        }
                        sum -= self.rho[p];
                        dec_values.push(sum);

                        if sum > 0.0 {
                            vote[i] += 1;
                        } else {
                            vote[j] += 1;
                        }
                        p += 1;
                    }
                }

                // Ties go to the lowest class index
                let mut winner = 0;
                for i in 1..nr_class {
                    if vote[i] > vote[winner] {
                        winner = i;
                    }
                }
                let label = self.label.get(winner).copied().unwrap_or(0);
                (f64::from(label), dec_values)
            }
        }
    }

    /// Predicted label or value for `x`
    pub fn predict(&self, x: &SparseVector) -> f64 {
        self.predict_values(x).0
    }

    /// Prediction plus calibrated probabilities when the model has them.
    ///
    /// Classification yields one probability per class, in [`labels`] order.
    /// One-class yields `[p(inlier), p(outlier)]`. Without calibration (and
    /// for regression) the probabilities are `None` and the prediction is
    /// the same as [`predict`].
    ///
    /// [`labels`]: SvmModel::labels
    /// [`predict`]: SvmModel::predict
    pub fn predict_probability(&self, x: &SparseVector) -> (f64, Option<Vec<f64>>) {
        match self.param.svm_type {
            SvmType::CSvc | SvmType::NuSvc if self.check_probability_model() => {
                let nr_class = self.nr_class;
                let (_, dec_values) = self.predict_values(x);

                let mut pairwise = vec![vec![0.0; nr_class]; nr_class];
                let mut k = 0;
                for i in 0..nr_class {
                    for j in i + 1..nr_class {
                        let p = sigmoid_predict(dec_values[k], self.prob_a[k], self.prob_b[k])
                            .clamp(MIN_PROB, 1.0 - MIN_PROB);
                        pairwise[i][j] = p;
                        pairwise[j][i] = 1.0 - p;
                        k += 1;
                    }
                }

                let estimates = if nr_class == 2 {
                    vec![pairwise[0][1], pairwise[1][0]]
                } else {
                    multiclass_probability(nr_class, &pairwise)
                };

                let mut best = 0;
                for i in 1..nr_class {
                    if estimates[i] > estimates[best] {
                        best = i;
                    }
                }
                let label = self.label.get(best).copied().unwrap_or(0);
                (f64::from(label), Some(estimates))
            }
            SvmType::OneClass if self.check_probability_model() => {
                let (prediction, dec_values) = self.predict_values(x);
                let p = predict_one_class_probability(&self.prob_density_marks, dec_values[0]);
                (prediction, Some(vec![p, 1.0 - p]))
            }
            _ => (self.predict(x), None),
        }
    }
}
