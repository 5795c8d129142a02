use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Epsilon-SVR with an RBF kernel:
/// `f(x) = sum_i coefficients[i] * exp(-gamma * |x - sv_i|^2) - rho`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SvrModel {
    pub gamma: f64,
    pub rho: f64,
    pub feature_count: usize,
    pub support_vectors: Vec<Vec<f64>>,
    pub coefficients: Vec<f64>,
}

impl SvrModel {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let sum: f64 = self
            .support_vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(sv, coef)| coef * rbf(self.gamma, sv, x))
            .sum();
        sum - self.rho
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(format!("gamma must be positive, got {}", self.gamma));
        }
        if !self.rho.is_finite() {
            return Err("rho is not finite".to_string());
        }
        if self.support_vectors.is_empty() {
            return Err("no support vectors".to_string());
        }
        if self.support_vectors.len() != self.coefficients.len() {
            return Err(format!(
                "{} support vectors but {} coefficients",
                self.support_vectors.len(),
                self.coefficients.len()
            ));
        }
        if let Some(sv) = self.support_vectors.iter().find(|sv| sv.len() != self.feature_count) {
            return Err(format!(
                "support vector has {} features, expected {}",
                sv.len(),
                self.feature_count
            ));
        }
        Ok(())
    }
}

/// Training settings for one regressor. `p` is the half-width of the
/// insensitive tube.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SvrHyperParams {
    pub gamma: f64,
    pub c: f64,
    pub p: f64,
}

/// Defaults for the four finger-count buckets.
pub const DEFAULT_HYPER_PARAMS: [SvrHyperParams; 4] = [
    SvrHyperParams {
        gamma: 0.8219,
        c: 0.5,
        p: 9e-16,
    },
    SvrHyperParams {
        gamma: 0.3425,
        c: 0.4041,
        p: 1e-16,
    },
    SvrHyperParams {
        gamma: 0.3425,
        c: 0.5493,
        p: 1e-16,
    },
    SvrHyperParams {
        gamma: 0.2740,
        c: 0.41,
        p: 1e-16,
    },
];

const TOLERANCE: f64 = 1e-3;
const TAU: f64 = 1e-12;

fn rbf(gamma: f64, a: &[f64], b: &[f64]) -> f64 {
    let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * d2).exp()
}

/// Fits an epsilon-SVR by sequential minimal optimization over the 2l dual
/// variables (one pair per sample), selecting working sets by second-order
/// gain. Rows of `samples` must share one length.
pub fn train(samples: &[Vec<f64>], targets: &[f64], hyper: &SvrHyperParams) -> SvrModel {
    let l = samples.len();
    let feature_count = samples.first().map_or(0, Vec::len);

    let rows: Vec<Vec<f64>> = (0..l)
        .into_par_iter()
        .map(|i| (0..l).map(|j| rbf(hyper.gamma, &samples[i], &samples[j])).collect())
        .collect();
    let mut kernel = Array2::<f64>::zeros((l, l));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            kernel[[i, j]] = v;
        }
    }

    let n = 2 * l;
    let sign = |t: usize| if t < l { 1.0 } else { -1.0 };
    let k = |a: usize, b: usize| kernel[[a % l, b % l]];
    let c = hyper.c;

    let mut alpha = Array1::<f64>::zeros(n);
    let mut grad = Array1::from_shape_fn(n, |t| {
        if t < l {
            hyper.p - targets[t]
        } else {
            hyper.p + targets[t - l]
        }
    });

    let is_upper = |a: f64| a >= c;
    let is_lower = |a: f64| a <= 0.0;

    let max_iter = (100 * n).max(100_000);
    let mut iter = 0;
    while iter < max_iter {
        // i: maximal violator among variables that can move up
        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let v = -sign(t) * grad[t];
            let movable = if sign(t) > 0.0 {
                !is_upper(alpha[t])
            } else {
                !is_lower(alpha[t])
            };
            if movable && v >= g_max {
                g_max = v;
                i_sel = Some(t);
            }
        }
        let Some(i) = i_sel else { break };

        // j: best second-order gain among variables that can move down
        let mut g_max2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        let mut best_obj = f64::INFINITY;
        for t in 0..n {
            let movable = if sign(t) > 0.0 {
                !is_lower(alpha[t])
            } else {
                !is_upper(alpha[t])
            };
            if !movable {
                continue;
            }
            let v = sign(t) * grad[t];
            g_max2 = g_max2.max(v);
            let grad_diff = g_max + v;
            if grad_diff > 0.0 {
                let quad = k(i, i) + k(t, t) - 2.0 * k(i, t);
                let obj = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                if obj <= best_obj {
                    best_obj = obj;
                    j_sel = Some(t);
                }
            }
        }
        let Some(j) = j_sel else { break };
        if g_max + g_max2 < TOLERANCE {
            break;
        }

        let (yi, yj) = (sign(i), sign(j));
        let (old_i, old_j) = (alpha[i], alpha[j]);
        let qij = yi * yj * k(i, j);

        if yi != yj {
            let quad = (k(i, i) + k(j, j) + 2.0 * qij).max(TAU);
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let quad = (k(i, i) + k(j, j) - 2.0 * qij).max(TAU);
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (di, dj) = (alpha[i] - old_i, alpha[j] - old_j);
        for t in 0..n {
            let yt = sign(t);
            grad[t] += yi * yt * k(i, t) * di + yj * yt * k(j, t) * dj;
        }
        iter += 1;
    }
    if iter >= max_iter {
        log::warn!("svr solver stopped after {iter} iterations without converging");
    }

    // bias from free variables, else the midpoint of the feasible interval
    let (mut ub, mut lb) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut free, mut free_sum) = (0usize, 0.0f64);
    for t in 0..n {
        let yg = sign(t) * grad[t];
        if is_upper(alpha[t]) {
            if sign(t) < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if is_lower(alpha[t]) {
            if sign(t) > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }
    let rho = if free > 0 {
        free_sum / free as f64
    } else {
        (ub + lb) / 2.0
    };

    let mut support_vectors = Vec::new();
    let mut coefficients = Vec::new();
    for s in 0..l {
        let beta = alpha[s] - alpha[s + l];
        if beta != 0.0 {
            support_vectors.push(samples[s].clone());
            coefficients.push(beta);
        }
    }

    log::debug!(
        "svr trained on {l} samples: {} support vectors, rho {rho:.4}, {iter} iterations",
        support_vectors.len()
    );

    SvrModel {
        gamma: hyper.gamma,
        rho,
        feature_count,
        support_vectors,
        coefficients,
    }
}
