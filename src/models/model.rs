//! Model evaluation for the power law, Nutting's law and the EVP models.
//!
//! All models act on the transformed deformation `D(t)`:
//!
//! ```text
//! power law:   D = C t^n
//! Nutting:     D = e0 + C t^n
//! EVP (k KV):  D = c (B0 + Cv t - Σ D_i exp(-t/tau_i))
//! ```
//!
//! where `c` is the experiment constant (`sigma` or `F`).
//!
//! The fitter relies on three primitive operations:
//! - build a design row for fixed nonlinear parameters (for OLS)
//! - evaluate `D(t)` from the full free parameter vector (residuals/plots)
//! - fill a Jacobian row (Levenberg-Marquardt refinement)
//!
//! Free parameter layout follows [`ModelKind::free_param_names`]:
//! `[C, n]`, `[e0, C, n]`, `[B0, Cv, D1.., tau1..]` (no taus when fixed).

use crate::domain::{CreepModel, ModelKind};
use crate::math::{decay, power, power_dn};

/// Fill a design row for the linear parameters given the nonlinear ones
/// (`[n]` for the empirical laws, the retardation times for EVP).
///
/// # Panics
/// Panics if `out` does not have length `kind.linear_len()` or `nonlinear` does not
/// have length `kind.nonlinear_len()`. Callers should size these arrays correctly.
pub fn fill_design_row(kind: ModelKind, t: f64, nonlinear: &[f64], constant: f64, out: &mut [f64]) {
    match kind {
        ModelKind::PowerLaw => {
            out[0] = power(t, nonlinear[0]);
        }
        ModelKind::NuttingLaw => {
            out[0] = 1.0;
            out[1] = power(t, nonlinear[0]);
        }
        _ => {
            out[0] = constant;
            out[1] = constant * t;
            for (i, &tau) in nonlinear.iter().enumerate() {
                out[2 + i] = -constant * decay(t, tau);
            }
        }
    }
}

/// Join linear and nonlinear parameters into the free parameter vector.
pub fn assemble_params(kind: ModelKind, linear: &[f64], nonlinear: &[f64], fixed_rtimes: bool) -> Vec<f64> {
    let mut out = linear.to_vec();
    if !(kind.is_evp() && fixed_rtimes) {
        out.extend_from_slice(nonlinear);
    }
    out
}

fn rtimes<'a>(kind: ModelKind, params: &'a [f64], fixed: Option<&'a [f64]>) -> &'a [f64] {
    let k = kind.kv_count();
    match fixed {
        Some(f) => f,
        None => &params[2 + k..2 + 2 * k],
    }
}

/// Evaluate `D(t)` for a free parameter vector.
pub fn evaluate(kind: ModelKind, t: f64, params: &[f64], fixed: Option<&[f64]>, constant: f64) -> f64 {
    match kind {
        ModelKind::PowerLaw => params[0] * power(t, params[1]),
        ModelKind::NuttingLaw => params[0] + params[1] * power(t, params[2]),
        _ => {
            let k = kind.kv_count();
            let taus = rtimes(kind, params, fixed);
            let kv: f64 = params[2..2 + k]
                .iter()
                .zip(taus)
                .map(|(d, &tau)| d * decay(t, tau))
                .sum();
            constant * (params[0] + params[1] * t - kv)
        }
    }
}

/// Fill the Jacobian row `∂D(t)/∂p_j` for a free parameter vector.
pub fn fill_jacobian_row(
    kind: ModelKind,
    t: f64,
    params: &[f64],
    fixed: Option<&[f64]>,
    constant: f64,
    out: &mut [f64],
) {
    match kind {
        ModelKind::PowerLaw => {
            out[0] = power(t, params[1]);
            out[1] = params[0] * power_dn(t, params[1]);
        }
        ModelKind::NuttingLaw => {
            out[0] = 1.0;
            out[1] = power(t, params[2]);
            out[2] = params[1] * power_dn(t, params[2]);
        }
        _ => {
            let k = kind.kv_count();
            let taus = rtimes(kind, params, fixed);
            out[0] = constant;
            out[1] = constant * t;
            for i in 0..k {
                let e = decay(t, taus[i]);
                out[2 + i] = -constant * e;
                if fixed.is_none() {
                    let tau = taus[i];
                    out[2 + k + i] = -constant * params[2 + i] * e * t / (tau * tau);
                }
            }
        }
    }
}

/// Predict `D(t)` for a fitted model.
pub fn predict(model: &CreepModel, t: f64) -> f64 {
    evaluate(
        model.kind,
        t,
        &model.params,
        model.fixed_rtimes.as_deref(),
        model.constant,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_gradient(kind: ModelKind, t: f64, p: &[f64], fixed: Option<&[f64]>, c: f64) -> Vec<f64> {
        (0..p.len())
            .map(|j| {
                let h = 1e-6 * p[j].abs().max(1e-3);
                let mut up = p.to_vec();
                let mut dn = p.to_vec();
                up[j] += h;
                dn[j] -= h;
                (evaluate(kind, t, &up, fixed, c) - evaluate(kind, t, &dn, fixed, c)) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn design_row_reproduces_evaluation() {
        let taus = [3.0, 40.0];
        let linear = [0.5, 0.001, 0.1, 0.2];
        let mut row = [0.0; 4];
        fill_design_row(ModelKind::Evp2, 7.0, &taus, 2.0, &mut row);
        let via_row: f64 = row.iter().zip(&linear).map(|(x, b)| x * b).sum();

        let params = assemble_params(ModelKind::Evp2, &linear, &taus, false);
        let direct = evaluate(ModelKind::Evp2, 7.0, &params, None, 2.0);
        assert!((via_row - direct).abs() < 1e-12);
    }

    #[test]
    fn fixed_rtimes_are_not_part_of_params() {
        let params = assemble_params(ModelKind::Evp1, &[1.0, 0.1, 0.3], &[5.0], true);
        assert_eq!(params, vec![1.0, 0.1, 0.3]);
        let y = evaluate(ModelKind::Evp1, 5.0, &params, Some(&[5.0]), 1.0);
        let expected = 1.0 + 0.5 - 0.3 * (-1.0_f64).exp();
        assert!((y - expected).abs() < 1e-12);
    }

    #[test]
    fn nutting_law_smoke() {
        let y = evaluate(ModelKind::NuttingLaw, 4.0, &[1.0, 2.0, 0.5], None, 1.0);
        assert!((y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let cases: Vec<(ModelKind, Vec<f64>)> = vec![
            (ModelKind::PowerLaw, vec![0.8, 0.3]),
            (ModelKind::NuttingLaw, vec![0.2, 0.8, 0.3]),
            (ModelKind::Evp2, vec![1.0, 0.01, 0.2, 0.3, 2.0, 30.0]),
            (ModelKind::Evp3, vec![1.0, 0.01, 0.2, 0.3, 0.1, 2.0, 15.0, 80.0]),
        ];
        for (kind, p) in cases {
            for &t in &[0.5, 3.0, 25.0] {
                let mut row = vec![0.0; p.len()];
                fill_jacobian_row(kind, t, &p, None, 1.5, &mut row);
                let num = numeric_gradient(kind, t, &p, None, 1.5);
                for (a, b) in row.iter().zip(&num) {
                    assert!((a - b).abs() < 1e-5 * (1.0 + b.abs()), "{kind:?} t={t}: {a} vs {b}");
                }
            }
        }
    }
}
