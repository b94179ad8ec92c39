//! Conversion between measured deformation and the fitted quantity.
//!
//! Indentation depth `h` is converted to `D = h^m / K` so that all models are
//! fitted to a quantity comparable with tensile strain; tensile data pass
//! through unchanged (`K = m = 1`).

use crate::domain::Experiment;

/// Measured deformation -> fitted quantity (`h^m / K`).
///
/// Negative depths keep their sign so that noisy points near zero stay finite.
pub fn recalculate_deformation(deformation: f64, experiment: &Experiment) -> f64 {
    signed_pow(deformation, experiment.m) / experiment.k
}

/// Fitted quantity -> deformation (`(D K)^(1/m)`).
pub fn recalculate_fitted(value: f64, experiment: &Experiment) -> f64 {
    signed_pow(value * experiment.k, 1.0 / experiment.m)
}

pub fn recalculate_all(deformation: &[f64], experiment: &Experiment) -> Vec<f64> {
    deformation
        .iter()
        .map(|&d| recalculate_deformation(d, experiment))
        .collect()
}

fn signed_pow(x: f64, p: f64) -> f64 {
    if p == 1.0 {
        x
    } else {
        x.signum() * x.abs().powf(p)
    }
}
