//! Stable elementary functions of the creep models.
//!
//! - `t^n` for the power and Nutting laws (with `t = 0` handled explicitly)
//! - `exp(-t/tau)` for Kelvin-Voigt elements
//! - the ramp correction `rho(tau) = (tau/t_R) (exp(t_R/tau) - 1)`
//!
//! Numerical notes:
//! - For small `x = t_R/tau`, `exp(x) - 1` suffers from catastrophic
//!   cancellation. We use `expm1` (and a series fallback) to keep precision.
//! - For `x → 0` the analytic limit is `rho → 1`.

/// Threshold below which we switch to a small-x series approximation.
const SMALL_X: f64 = 1e-6;

/// `t^n`, defined as 0 at `t <= 0` unless `n == 0`.
pub fn power(t: f64, n: f64) -> f64 {
    if t > 0.0 {
        t.powf(n)
    } else if n == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// `∂(t^n)/∂n = t^n ln t`, 0 at `t <= 0`.
pub fn power_dn(t: f64, n: f64) -> f64 {
    if t > 0.0 { t.powf(n) * t.ln() } else { 0.0 }
}

/// Decay of a Kelvin-Voigt element, `exp(-t/tau)`.
pub fn decay(t: f64, tau: f64) -> f64 {
    (-t / tau).exp()
}

/// Ramp correction factor `rho(tau) = (tau/t_R) (exp(t_R/tau) - 1)`.
///
/// Converts Kelvin-Voigt amplitudes fitted after a linear loading ramp of
/// duration `t_R` into compliances. Returns 1 for `t_R <= 0`.
pub fn ramp_correction(tau: f64, t_ramp: f64) -> f64 {
    if t_ramp <= 0.0 {
        return 1.0;
    }
    let x = t_ramp / tau;

    if x.abs() < SMALL_X {
        // Series: (e^x - 1) / x ≈ 1 + x/2 + x^2/6
        return 1.0 + x / 2.0 + (x * x) / 6.0;
    }

    x.exp_m1() / x
}
