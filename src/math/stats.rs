//! Goodness-of-fit statistics.

/// Minimal guard for `ln(SSE)` when the fit is exact.
const SSE_FLOOR: f64 = 1e-300;

/// Coefficient of determination `R² = 1 - SSres/SStot`.
///
/// Returns `None` for fewer than two points, mismatched lengths or constant
/// observations (`SStot = 0`).
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> Option<f64> {
    if observed.len() < 2 || observed.len() != fitted.len() {
        return None;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    if !(ss_tot > 0.0) {
        return None;
    }
    let ss_res: f64 = observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    let r2 = 1.0 - ss_res / ss_tot;
    r2.is_finite().then_some(r2)
}

/// Bayesian Information Criterion for Gaussian residuals:
/// `BIC = n ln(SSE/n) + k ln(n)`.
pub fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse = sse.max(SSE_FLOOR);
    n_f * (sse / n_f).ln() + (k as f64) * n_f.ln()
}
