//! Starting-point grids for the nonlinear parameters.
//!
//! Every model is fitted by a deterministic grid search over its nonlinear
//! parameters (exponent `n` or retardation times `tau_i`) with the linear ones
//! solved exactly by OLS at each node. The best node seeds the
//! Levenberg-Marquardt refinement, which keeps the refinement away from the
//! poor local minima of multi-exponential fits.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::input(format!(
            "Invalid tau range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::input("Tau steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::input(format!(
            "Invalid exponent range: min={min}, max={max} (must be finite and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::input("Exponent steps must be >= 2."));
    }
    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Exponent grid for the power and Nutting laws: `[n]`.
pub fn exponent_grid(min: f64, max: f64, steps: usize) -> Result<Vec<Vec<f64>>, AppError> {
    Ok(lin_space(min, max, steps)?.into_iter().map(|n| vec![n]).collect())
}

/// Retardation time grid for `k` Kelvin-Voigt elements: `[tau1, .., tauk]`
/// with `tau_{i+1} >= tau_i * min_ratio`.
pub fn rtime_grid(
    k: usize,
    min: f64,
    max: f64,
    steps: usize,
    min_ratio: f64,
) -> Result<Vec<Vec<f64>>, AppError> {
    let values = log_space(min, max, steps)?;
    let min_ratio = min_ratio.max(1.0);

    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    push_ordered(&values, k, 0, min_ratio, &mut current, &mut out);
    Ok(out)
}

fn push_ordered(
    values: &[f64],
    k: usize,
    from: usize,
    min_ratio: f64,
    current: &mut Vec<f64>,
    out: &mut Vec<Vec<f64>>,
) {
    if current.len() == k {
        out.push(current.clone());
        return;
    }
    for i in from..values.len() {
        if let Some(&last) = current.last() {
            if values[i] < last * min_ratio {
                continue;
            }
        }
        current.push(values[i]);
        push_ordered(values, k, i + 1, min_ratio, current, out);
        current.pop();
    }
}

/// Default retardation time bounds for a record spanning `[t_lo, t_hi]`.
pub fn default_rtime_bounds(t_lo: f64, t_hi: f64) -> (f64, f64) {
    let mut span = t_hi - t_lo;
    if !(span.is_finite() && span > 0.0) {
        span = t_hi.abs().max(1.0);
    }
    (span / 500.0, 2.0 * span)
}
