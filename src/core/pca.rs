//! Candid covariance-free incremental PCA (CCIPCA).
//!
//! Keeps `k` running principal directions and a running mean over an
//! unbounded stream of feature vectors without ever building a covariance
//! matrix. Each absorbed vector costs a handful of dot products over the
//! feature dimension, which is what makes it usable on flattened motion
//! fields at video frame rate.
//!
//! The directions are stored unnormalized: their length doubles as the
//! eigenvalue estimate, and the amnesic recursion only stays consistent if
//! the working copies are never rescaled. [`EigenEstimator::finalize`]
//! produces a normalized, ranked snapshot without touching that state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Norms below this are treated as a zero vector.
const NORM_EPSILON: f64 = 1e-12;

/// Default amnesic constant.
pub const DEFAULT_AMNESIC: f64 = 2.0;

/// Errors raised by the estimator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("at least 2 components are required, got {0}")]
    TooFewComponents(usize),

    #[error("amnesic constant must be finite and non-negative, got {0}")]
    InvalidAmnesic(f64),

    #[error("sample has no features")]
    EmptySample,

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Normalized, ranked view of the basis at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenSnapshot {
    /// Unit-length directions, most significant first
    pub components: Vec<Vec<f64>>,
    /// Share of the summed component norms, same order as `components`
    pub explained_ratio: Vec<f64>,
    /// Running mean at snapshot time
    pub mean: Vec<f64>,
}

/// Online eigenbasis estimator with amnesic weighting.
#[derive(Debug, Clone)]
pub struct EigenEstimator {
    n_components: usize,
    amnesic: f64,
    iteration: u64,
    n_features: Option<usize>,
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
}

impl EigenEstimator {
    /// Create an estimator tracking `n_components` directions.
    pub fn new(n_components: usize, amnesic: f64) -> Result<Self, EstimatorError> {
        if n_components < 2 {
            return Err(EstimatorError::TooFewComponents(n_components));
        }
        if !amnesic.is_finite() || amnesic < 0.0 {
            return Err(EstimatorError::InvalidAmnesic(amnesic));
        }

        Ok(Self {
            n_components,
            amnesic,
            iteration: 0,
            n_features: None,
            mean: Vec::new(),
            components: vec![Vec::new(); n_components],
        })
    }

    /// Number of vectors absorbed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of tracked directions.
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Feature dimension, fixed by the first absorbed vector.
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Amnesic constant of the weighting schedule.
    pub fn amnesic(&self) -> f64 {
        self.amnesic
    }

    /// Running mean; empty until the first absorb.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Live, unnormalized working directions in update order.
    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    /// Blend weights `(w1, w2)` for the next update.
    ///
    /// Up to `floor(amnesic)` samples this is a plain running average; after
    /// that the newest sample keeps a fixed extra share of `amnesic`.
    fn weights(&self) -> (f64, f64) {
        let n = self.iteration as f64;
        if self.iteration <= self.amnesic.floor() as u64 {
            ((n + 1.0) / (n + 2.0), 1.0 / (n + 2.0))
        } else {
            (
                (n + 2.0 - self.amnesic) / (n + 2.0),
                (1.0 + self.amnesic) / (n + 2.0),
            )
        }
    }

    fn check_len(&self, len: usize) -> Result<(), EstimatorError> {
        if len == 0 {
            return Err(EstimatorError::EmptySample);
        }
        match self.n_features {
            Some(expected) if expected != len => Err(EstimatorError::DimensionMismatch {
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }

    /// Absorb one feature vector into the mean and the basis.
    pub fn absorb(&mut self, sample: &[f64]) -> Result<(), EstimatorError> {
        self.check_len(sample.len())?;
        if self.n_features.is_none() {
            self.n_features = Some(sample.len());
            self.mean = vec![0.0; sample.len()];
            self.components = vec![vec![0.0; sample.len()]; self.n_components];
        }

        let n = self.iteration;
        let (w1, w2) = self.weights();

        for (m, &x) in self.mean.iter_mut().zip(sample) {
            *m = w1 * *m + w2 * x;
        }

        // Centered against the freshly updated mean.
        let mut u: Vec<f64> = sample.iter().zip(&self.mean).map(|(x, m)| x - m).collect();

        for (j, v) in self.components.iter_mut().enumerate() {
            let j = j as u64;
            if j > n {
                break;
            }
            if j == n {
                v.copy_from_slice(&u);
                continue;
            }

            let norm = l2_norm(v);
            if norm < NORM_EPSILON {
                // Collapsed direction: start over from the residual.
                v.copy_from_slice(&u);
                continue;
            }

            let gain = w2 * dot(&u, v) / norm;
            for (vi, ui) in v.iter_mut().zip(&u) {
                *vi = w1 * *vi + gain * ui;
            }

            let updated = l2_norm(v);
            if updated < NORM_EPSILON {
                continue;
            }

            // Residual handed to the next component is orthogonal to this one.
            let coeff = dot(&u, v) / (updated * updated);
            for (ui, vi) in u.iter_mut().zip(v.iter()) {
                *ui -= coeff * vi;
            }
        }

        self.iteration += 1;
        Ok(())
    }

    /// Absorb rows in order. Later rows weigh more under the amnesic schedule.
    ///
    /// Every row is validated first; a bad batch leaves the estimator untouched.
    pub fn absorb_batch(&mut self, samples: &[Vec<f64>]) -> Result<(), EstimatorError> {
        let Some(first) = samples.first() else {
            return Ok(());
        };

        let expected = self.n_features.unwrap_or(first.len());
        for row in samples {
            if row.is_empty() {
                return Err(EstimatorError::EmptySample);
            }
            if row.len() != expected {
                return Err(EstimatorError::DimensionMismatch {
                    expected,
                    actual: row.len(),
                });
            }
        }

        for row in samples {
            self.absorb(row)?;
        }
        Ok(())
    }

    /// Project onto the current (unranked) basis directions.
    ///
    /// Before anything has been absorbed there is no basis and every
    /// coordinate is 0. A collapsed direction also yields 0.
    pub fn project(&self, sample: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        self.check_len(sample.len())?;
        if self.n_features.is_none() {
            return Ok(vec![0.0; self.n_components]);
        }

        let centered: Vec<f64> = sample.iter().zip(&self.mean).map(|(x, m)| x - m).collect();

        Ok(self
            .components
            .iter()
            .map(|v| {
                let norm = l2_norm(v);
                if norm < NORM_EPSILON {
                    0.0
                } else {
                    dot(&centered, v) / norm
                }
            })
            .collect())
    }

    /// Project every row; one output row of length `k` per input row.
    pub fn project_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EstimatorError> {
        samples.iter().map(|row| self.project(row)).collect()
    }

    /// Map projected coordinates back into feature space.
    pub fn inverse_transform(&self, projected: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        if projected.len() != self.n_components {
            return Err(EstimatorError::DimensionMismatch {
                expected: self.n_components,
                actual: projected.len(),
            });
        }

        let mut out = self.mean.clone();
        for (p, v) in projected.iter().zip(&self.components) {
            let norm = l2_norm(v);
            if norm < NORM_EPSILON {
                continue;
            }
            for (o, vi) in out.iter_mut().zip(v) {
                *o += p * vi / norm;
            }
        }
        Ok(out)
    }

    /// Normalized components ranked by explained share.
    pub fn finalize(&self) -> EigenSnapshot {
        let norms: Vec<f64> = self.components.iter().map(|v| l2_norm(v)).collect();
        let total: f64 = norms.iter().sum();

        let mut order: Vec<usize> = (0..self.n_components).collect();
        order.sort_by(|&a, &b| norms[b].total_cmp(&norms[a]));

        let components = order
            .iter()
            .map(|&j| {
                let norm = norms[j];
                if norm < NORM_EPSILON {
                    self.components[j].clone()
                } else {
                    self.components[j].iter().map(|x| x / norm).collect()
                }
            })
            .collect();

        let explained_ratio = order
            .iter()
            .map(|&j| if total < NORM_EPSILON { 0.0 } else { norms[j] / total })
            .collect();

        EigenSnapshot {
            components,
            explained_ratio,
            mean: self.mean.clone(),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
