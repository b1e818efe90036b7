//! Bayesian ability estimation (EAP and MAP) under a standard normal prior.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::EstimationMethod;
use crate::error::EstimationError;
use crate::item_bank::ItemBank;
use crate::model::{category_probabilities, log_likelihood_derivatives};
use crate::utils::{
    clip, compute_eap_with_se, linspace, log_normal_pdf, normalize_log_posterior, EPSILON,
    THETA_MAX, THETA_MIN,
};

pub const DEFAULT_QUAD_POINTS: usize = 49;
pub const DEFAULT_MAX_NEWTON_ITER: usize = 50;
pub const DEFAULT_NEWTON_TOL: f64 = 1e-6;
const MAX_STEP_HALVINGS: usize = 30;

/// One scored response, addressed by bank position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub position: usize,
    pub category: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub sem: f64,
    /// Set when MAP failed and the value is the EAP fallback.
    pub degraded: bool,
}

impl AbilityEstimate {
    /// Prior-only estimate: mean 0, standard deviation 1.
    pub const PRIOR: Self = Self {
        theta: 0.0,
        sem: 1.0,
        degraded: false,
    };
}

/// Precomputed quadrature grid and per-item log category probabilities.
///
/// Built once per item bank and shared read-only by every session.
#[derive(Debug, Clone)]
pub struct AbilityEstimator {
    method: EstimationMethod,
    nodes: Vec<f64>,
    log_prior: Vec<f64>,
    /// `log_probs[position][[q, category - 1]]`
    log_probs: Vec<Array2<f64>>,
    max_iter: usize,
    tol: f64,
}

impl AbilityEstimator {
    pub fn new(bank: &ItemBank, method: EstimationMethod) -> Self {
        Self::with_quadrature(bank, method, DEFAULT_QUAD_POINTS)
    }

    pub fn with_quadrature(bank: &ItemBank, method: EstimationMethod, n_quad: usize) -> Self {
        let nodes = linspace(THETA_MIN, THETA_MAX, n_quad.max(2));
        let log_prior: Vec<f64> = nodes.iter().map(|&t| log_normal_pdf(t)).collect();

        let log_probs = bank
            .items()
            .iter()
            .map(|item| {
                let k = item.category_count();
                let mut table = Array2::zeros((nodes.len(), k));
                for (q, &theta) in nodes.iter().enumerate() {
                    let probs = category_probabilities(item, theta);
                    for (c, &p) in probs.iter().enumerate() {
                        table[[q, c]] = p.max(EPSILON).ln();
                    }
                }
                table
            })
            .collect();

        Self {
            method,
            nodes,
            log_prior,
            log_probs,
            max_iter: DEFAULT_MAX_NEWTON_ITER,
            tol: DEFAULT_NEWTON_TOL,
        }
    }

    /// Override the Newton iteration budget and step tolerance used by MAP.
    pub fn with_newton_limits(mut self, max_iter: usize, tol: f64) -> Self {
        self.max_iter = max_iter;
        self.tol = tol;
        self
    }

    pub fn method(&self) -> EstimationMethod {
        self.method
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Number of items the log-probability tables were built for.
    pub fn item_count(&self) -> usize {
        self.log_probs.len()
    }

    pub fn newton_limits(&self) -> (usize, f64) {
        (self.max_iter, self.tol)
    }

    /// Estimate with the configured method over the full response history.
    pub fn estimate(&self, bank: &ItemBank, responses: &[Observation]) -> AbilityEstimate {
        match self.method {
            EstimationMethod::Eap => self.eap(responses),
            EstimationMethod::Map => match self.map(bank, responses) {
                Ok(estimate) => estimate,
                Err(err) => {
                    let fallback = self.eap(responses);
                    tracing::warn!(
                        error = %err,
                        theta = fallback.theta,
                        "MAP estimation failed, using EAP fallback"
                    );
                    AbilityEstimate {
                        degraded: true,
                        ..fallback
                    }
                }
            },
        }
    }

    /// Posterior mean and standard deviation.
    pub fn eap(&self, responses: &[Observation]) -> AbilityEstimate {
        if responses.is_empty() {
            return AbilityEstimate::PRIOR;
        }

        let log_posterior: Vec<f64> = (0..self.nodes.len())
            .map(|q| {
                let ll: f64 = responses
                    .iter()
                    .map(|obs| self.log_probs[obs.position][[q, (obs.category - 1) as usize]])
                    .sum();
                ll + self.log_prior[q]
            })
            .collect();

        let posterior = normalize_log_posterior(&log_posterior);
        let (theta, sem) = compute_eap_with_se(&posterior, &self.nodes);

        AbilityEstimate {
            theta,
            sem,
            degraded: false,
        }
    }

    /// Posterior mode by damped Newton iterations.
    pub fn map(
        &self,
        bank: &ItemBank,
        responses: &[Observation],
    ) -> Result<AbilityEstimate, EstimationError> {
        if responses.is_empty() {
            return Ok(AbilityEstimate::PRIOR);
        }

        let log_posterior = |theta: f64| -> f64 {
            let ll: f64 = responses
                .iter()
                .map(|obs| {
                    let item = bank.item(obs.position);
                    category_probabilities(item, theta)[(obs.category - 1) as usize]
                        .max(EPSILON)
                        .ln()
                })
                .sum();
            ll + log_normal_pdf(theta)
        };

        let derivatives = |theta: f64| -> (f64, f64) {
            responses.iter().fold((-theta, -1.0), |(g, h), obs| {
                let item = bank.item(obs.position);
                let (dg, dh) = log_likelihood_derivatives(item, theta, obs.category);
                (g + dg, h + dh)
            })
        };

        let mut theta = 0.0;
        for _ in 0..self.max_iter {
            let (gradient, curvature) = derivatives(theta);
            if !curvature.is_finite() || curvature >= 0.0 {
                return Err(EstimationError::NonConcave { theta });
            }

            let step = -gradient / curvature;
            let current = log_posterior(theta);
            let mut scale = 1.0;
            let mut next = None;
            for _ in 0..MAX_STEP_HALVINGS {
                let candidate = clip(theta + scale * step, THETA_MIN, THETA_MAX);
                if log_posterior(candidate) >= current - 1e-12 {
                    next = Some(candidate);
                    break;
                }
                scale *= 0.5;
            }
            let next = next.ok_or(EstimationError::LineSearch { theta })?;

            let delta = next - theta;
            theta = next;
            if delta.abs() < self.tol {
                let (_, curvature) = derivatives(theta);
                if !curvature.is_finite() || curvature >= 0.0 {
                    return Err(EstimationError::NonConcave { theta });
                }
                return Ok(AbilityEstimate {
                    theta,
                    sem: 1.0 / (-curvature).sqrt(),
                    degraded: false,
                });
            }
        }

        Err(EstimationError::IterationLimit {
            iterations: self.max_iter,
        })
    }
}
