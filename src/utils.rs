//! Shared numeric helpers.

pub const LOG_2_PI: f64 = 1.8378770664093453;
pub const EPSILON: f64 = 1e-10;

/// Lower and upper bound of the ability scale used for quadrature and MAP search.
pub const THETA_MIN: f64 = -6.0;
pub const THETA_MAX: f64 = 6.0;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

#[inline]
pub fn logsumexp(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = arr.iter().map(|x| (x - max_val).exp()).sum();
    max_val + sum.ln()
}

#[inline]
pub fn clip(x: f64, min: f64, max: f64) -> f64 {
    x.max(min).min(max)
}

/// Standard normal log density.
#[inline]
pub fn log_normal_pdf(x: f64) -> f64 {
    -0.5 * x * x - 0.5 * LOG_2_PI
}

/// Turn an unnormalised log posterior into normalised weights.
pub fn normalize_log_posterior(log_posterior: &[f64]) -> Vec<f64> {
    let log_norm = logsumexp(log_posterior);
    log_posterior
        .iter()
        .map(|&lp| (lp - log_norm).exp())
        .collect()
}

/// Posterior mean and standard deviation over quadrature nodes.
pub fn compute_eap_with_se(posterior: &[f64], nodes: &[f64]) -> (f64, f64) {
    let eap: f64 = posterior
        .iter()
        .zip(nodes.iter())
        .map(|(&p, &theta)| p * theta)
        .sum();

    let psd: f64 = posterior
        .iter()
        .zip(nodes.iter())
        .map(|(&p, &theta)| p * (theta - eap).powi(2))
        .sum::<f64>()
        .sqrt();

    (eap, psd)
}

/// Equally spaced nodes on `[min, max]`.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![0.5 * (min + max); n];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + i as f64 * step).collect()
}
