//! Shrinking heuristic implementation
//!
//! Variables sitting at a bound whose gradient says they would only move
//! further outward are unlikely to change again. They are moved behind
//! `active_size` and left out of working-set selection and gradient
//! updates until the active problem looks optimal, at which point the full
//! gradient is rebuilt from `g_bar` and every variable is checked again.

use crate::solver::qmatrix::QMatrix;
use crate::solver::smo::{load_row, Formulation, SMOSolver};
use log::debug;

/// Largest violations of the active variables, used as shrinking thresholds
#[derive(Debug, Clone, Copy)]
enum Thresholds {
    /// `(max -y_t G_t over I_up, max y_t G_t over I_low)`
    Standard(f64, f64),
    /// The same pair computed separately for `y = +1` and `y = -1`:
    /// `(up+, low+, low-, up-)`
    Nu(f64, f64, f64, f64),
}

impl Thresholds {
    fn max_violation(self) -> f64 {
        match self {
            Thresholds::Standard(g1, g2) => g1 + g2,
            Thresholds::Nu(g1, g2, g3, g4) => (g1 + g2).max(g3 + g4),
        }
    }
}

impl<Q: QMatrix> SMOSolver<'_, Q> {
    /// Move variables that can be fixed at a bound out of the active set.
    ///
    /// The first time the violation drops to `10 * eps` the gradient is
    /// reconstructed and the whole problem is reactivated once.
    pub(super) fn do_shrinking(&mut self) {
        let thresholds = self.shrinking_thresholds();

        if !self.unshrink && thresholds.max_violation() <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.l;
            debug!("unshrinking: all {} variables active again", self.l);
        }

        let before = self.active_size;
        let mut i = 0;
        while i < self.active_size {
            if self.be_shrunk(i, thresholds) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !self.be_shrunk(self.active_size, thresholds) {
                        self.swap_index(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }

        if self.active_size != before {
            debug!(
                "shrinking: active set {} -> {} of {}",
                before, self.active_size, self.l
            );
        }
    }

    fn shrinking_thresholds(&self) -> Thresholds {
        match self.formulation {
            Formulation::Standard => {
                let mut gmax1 = f64::NEG_INFINITY;
                let mut gmax2 = f64::NEG_INFINITY;
                for t in 0..self.active_size {
                    let g = self.g[t];
                    if self.y[t] == 1 {
                        if !self.is_upper_bound(t) {
                            gmax1 = gmax1.max(-g);
                        }
                        if !self.is_lower_bound(t) {
                            gmax2 = gmax2.max(g);
                        }
                    } else {
                        if !self.is_upper_bound(t) {
                            gmax2 = gmax2.max(-g);
                        }
                        if !self.is_lower_bound(t) {
                            gmax1 = gmax1.max(g);
                        }
                    }
                }
                Thresholds::Standard(gmax1, gmax2)
            }
            Formulation::Nu => {
                let mut gmax1 = f64::NEG_INFINITY;
                let mut gmax2 = f64::NEG_INFINITY;
                let mut gmax3 = f64::NEG_INFINITY;
                let mut gmax4 = f64::NEG_INFINITY;
                for t in 0..self.active_size {
                    let g = self.g[t];
                    if !self.is_upper_bound(t) {
                        if self.y[t] == 1 {
                            gmax1 = gmax1.max(-g);
                        } else {
                            gmax4 = gmax4.max(-g);
                        }
                    }
                    if !self.is_lower_bound(t) {
                        if self.y[t] == 1 {
                            gmax2 = gmax2.max(g);
                        } else {
                            gmax3 = gmax3.max(g);
                        }
                    }
                }
                Thresholds::Nu(gmax1, gmax2, gmax3, gmax4)
            }
        }
    }

    fn be_shrunk(&self, t: usize, thresholds: Thresholds) -> bool {
        let g = self.g[t];
        let positive = self.y[t] == 1;
        match thresholds {
            Thresholds::Standard(gmax1, gmax2) => {
                if self.is_upper_bound(t) {
                    -g > if positive { gmax1 } else { gmax2 }
                } else if self.is_lower_bound(t) {
                    g > if positive { gmax2 } else { gmax1 }
                } else {
                    false
                }
            }
            Thresholds::Nu(gmax1, gmax2, gmax3, gmax4) => {
                if self.is_upper_bound(t) {
                    -g > if positive { gmax1 } else { gmax4 }
                } else if self.is_lower_bound(t) {
                    g > if positive { gmax2 } else { gmax3 }
                } else {
                    false
                }
            }
        }
    }

    /// Rebuild `g` for the inactive variables `active_size..l`.
    ///
    /// `G_t = G_bar_t + p_t + Σ_{free s} α_s Q_ts`; the free-variable sum is
    /// accumulated row-wise or column-wise, whichever touches fewer entries.
    pub(super) fn reconstruct_gradient(&mut self) {
        let l = self.l;
        let active_size = self.active_size;
        if active_size == l {
            return;
        }

        for t in active_size..l {
            self.g[t] = self.g_bar[t] + self.p[t];
        }

        let nr_free = (0..active_size).filter(|&t| self.is_free(t)).count();
        if 2 * nr_free < active_size {
            debug!("few free variables ({nr_free} of {active_size}); disabling shrinking may be faster");
        }

        if nr_free * l > 2 * active_size * (l - active_size) {
            for i in active_size..l {
                load_row(self.q, i, active_size, &mut self.q_i);
                for j in 0..active_size {
                    if self.is_free(j) {
                        self.g[i] += self.alpha[j] * self.q_i[j];
                    }
                }
            }
        } else {
            for i in 0..active_size {
                if !self.is_free(i) {
                    continue;
                }
                let alpha_i = self.alpha[i];
                let q_i = self.q.get_q(i, l);
                for j in active_size..l {
                    self.g[j] += alpha_i * q_i[j];
                }
            }
        }
    }
}
