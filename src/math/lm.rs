//! Levenberg-Marquardt refinement for small nonlinear least squares problems.
//!
//! Each step solves the damped Gauss-Newton system as an augmented linear
//! least squares problem:
//!
//! ```text
//! [ J             ]       [ r ]
//! [ sqrt(λ) D^1/2 ] δ  ≈  [ 0 ]
//! ```
//!
//! where `J` is the Jacobian of the model values, `r` the residuals and `D`
//! the diagonal of `JᵀJ` (Marquardt scaling). The system goes through the same
//! SVD solver as the grid search, which keeps steps finite when columns are
//! nearly collinear.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::AppError;
use crate::math::ols::solve_least_squares;

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e12;

/// A nonlinear least squares problem `minimize Σ (y_i - f(t_i; p))^2`.
pub trait LeastSquaresProblem {
    fn observations(&self) -> usize;

    /// Residuals `y_i - f(t_i; p)`.
    fn residuals(&self, params: &[f64], out: &mut DVector<f64>);

    /// Jacobian of the model values, `∂f(t_i; p)/∂p_j`.
    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);

    /// Whether the model is defined at `params` (e.g. positive time constants).
    fn admissible(&self, params: &[f64]) -> bool {
        params.iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub lambda0: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            lambda0: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Jacobian at the returned parameters.
    pub jacobian: DMatrix<f64>,
}

pub fn levenberg_marquardt<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    start: &[f64],
    opts: &LmOptions,
) -> Result<LmOutcome, AppError> {
    let n = problem.observations();
    let m = start.len();
    if m == 0 {
        return Err(AppError::runtime("Nothing to refine: empty parameter vector."));
    }
    if !problem.admissible(start) {
        return Err(AppError::runtime(format!(
            "Initial parameters are outside the model domain: {start:?}"
        )));
    }

    let mut p = start.to_vec();
    let mut r = DVector::<f64>::zeros(n);
    problem.residuals(&p, &mut r);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return Err(AppError::runtime("Model is not finite at the initial parameters."));
    }

    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut r_trial = DVector::<f64>::zeros(n);
    let mut lambda = opts.lambda0;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iter {
        iterations += 1;
        problem.jacobian(&p, &mut jac);

        let scale: Vec<f64> = (0..m)
            .map(|j| jac.column(j).norm_squared().max(1e-12))
            .collect();

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut a = DMatrix::<f64>::zeros(n + m, m);
            a.rows_mut(0, n).copy_from(&jac);
            for j in 0..m {
                a[(n + j, j)] = (lambda * scale[j]).sqrt();
            }
            let mut b = DVector::<f64>::zeros(n + m);
            b.rows_mut(0, n).copy_from(&r);

            let Some(delta) = solve_least_squares(&a, &b) else {
                lambda *= 10.0;
                continue;
            };

            let trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(x, d)| x + d).collect();
            if !problem.admissible(&trial) {
                lambda *= 10.0;
                continue;
            }

            problem.residuals(&trial, &mut r_trial);
            let sse_trial = r_trial.norm_squared();
            if !(sse_trial.is_finite() && sse_trial <= sse) {
                lambda *= 10.0;
                continue;
            }

            let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
            let step = delta.norm();
            let rel_decrease = if sse > 0.0 { (sse - sse_trial) / sse } else { 0.0 };

            p = trial;
            std::mem::swap(&mut r, &mut r_trial);
            sse = sse_trial;
            lambda = (lambda / 10.0).max(LAMBDA_MIN);
            accepted = true;

            if rel_decrease <= opts.ftol || step <= opts.xtol * (p_norm + opts.xtol) {
                converged = true;
            }
            break;
        }

        if !accepted {
            // No damped step decreases the SSE: stationary point.
            converged = true;
            break;
        }
        if converged {
            break;
        }
    }

    if !converged {
        debug!(iterations, sse, "Levenberg-Marquardt stopped at max_iter");
    }

    problem.jacobian(&p, &mut jac);
    Ok(LmOutcome {
        params: p,
        sse,
        iterations,
        converged,
        jacobian: jac,
    })
}

/// Parameter covariance `pinv(JᵀJ) · SSE/(n - p)`.
///
/// Returns `None` when there are no residual degrees of freedom or the result
/// is not finite.
pub fn covariance(jacobian: &DMatrix<f64>, sse: f64) -> Option<DMatrix<f64>> {
    let (n, p) = jacobian.shape();
    if n <= p || p == 0 {
        return None;
    }
    let s2 = sse / (n - p) as f64;

    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t?;
    let s = &svd.singular_values;
    let s_max = s.iter().cloned().fold(0.0_f64, f64::max);
    if s_max <= 0.0 {
        return None;
    }
    let cutoff = f64::EPSILON * n.max(p) as f64 * s_max;

    let mut cov = DMatrix::<f64>::zeros(p, p);
    for (i, &si) in s.iter().enumerate() {
        if si <= cutoff {
            continue;
        }
        let v = v_t.row(i).transpose();
        cov += (&v * v.transpose()) / (si * si);
    }
    cov *= s2;

    if cov.iter().all(|v| v.is_finite()) { Some(cov) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a * exp(-t / b)
    struct ExpDecay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn observations(&self) -> usize {
            self.t.len()
        }

        fn residuals(&self, p: &[f64], out: &mut DVector<f64>) {
            for (i, (&t, &y)) in self.t.iter().zip(&self.y).enumerate() {
                out[i] = y - p[0] * (-t / p[1]).exp();
            }
        }

        fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
            for (i, &t) in self.t.iter().enumerate() {
                let e = (-t / p[1]).exp();
                out[(i, 0)] = e;
                out[(i, 1)] = p[0] * e * t / (p[1] * p[1]);
            }
        }

        fn admissible(&self, p: &[f64]) -> bool {
            p.iter().all(|v| v.is_finite()) && p[1] > 0.0
        }
    }

    fn decay_problem() -> ExpDecay {
        let t: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let y = t.iter().map(|t| 3.0 * (-t / 2.5_f64).exp()).collect();
        ExpDecay { t, y }
    }

    #[test]
    fn recovers_exponential_decay() {
        let problem = decay_problem();
        let out = levenberg_marquardt(&problem, &[1.0, 1.0], &LmOptions::default()).unwrap();

        assert!(out.converged);
        assert!((out.params[0] - 3.0).abs() < 1e-6, "a = {}", out.params[0]);
        assert!((out.params[1] - 2.5).abs() < 1e-6, "b = {}", out.params[1]);
        assert!(out.sse < 1e-12);
    }

    #[test]
    fn rejects_start_outside_domain() {
        let problem = decay_problem();
        let err = levenberg_marquardt(&problem, &[1.0, -1.0], &LmOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn covariance_of_straight_line() {
        // y = a + b x with known residuals; compare with the closed form.
        let x = [0.0, 1.0, 2.0, 3.0];
        let jac = DMatrix::from_fn(4, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
        let sse = 0.5;
        let cov = covariance(&jac, sse).unwrap();

        let jtj = jac.transpose() * &jac;
        let expected = jtj.try_inverse().unwrap() * (sse / 2.0);
        for (a, b) in cov.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn covariance_needs_residual_dof() {
        let jac = DMatrix::from_element(2, 2, 1.0);
        assert!(covariance(&jac, 1.0).is_none());
    }
}
