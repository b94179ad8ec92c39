//! Low-level fitting routine for a single model kind.
//!
//! Given:
//! - times `t_i` (seconds, inside the fit window)
//! - transformed deformation `D_i`
//! - a grid of candidate nonlinear parameters (exponent or retardation times)
//!
//! we:
//! - solve, for each candidate, an OLS problem for the linear parameters
//! - keep the candidate with the lowest SSE
//! - refine all free parameters jointly with Levenberg-Marquardt
//! - estimate the parameter covariance from the final Jacobian

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{CreepModel, FitQuality, FitResult, ModelKind, SearchOptions};
use crate::error::AppError;
use crate::fit::grid::{default_rtime_bounds, exponent_grid, rtime_grid};
use crate::math::lm::{LeastSquaresProblem, LmOptions, covariance, levenberg_marquardt};
use crate::math::solve_least_squares;
use crate::math::stats::bic;
use crate::models::{assemble_params, evaluate, fill_design_row, fill_jacobian_row};

/// Fitting options that affect how each model is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub search: SearchOptions,
    /// Retardation times held fixed (EVP only); the model becomes linear.
    pub fixed_rtimes: Option<Vec<f64>>,
    /// Explicit starting point for the free parameters; skips the grid search.
    pub iguess: Option<Vec<f64>>,
    /// EVP multiplicative constant (`sigma` or `F`).
    pub constant: f64,
    /// Label stored with the fitted model.
    pub name: String,
}

impl FitOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            search: SearchOptions::default(),
            fixed_rtimes: None,
            iguess: None,
            constant: 1.0,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: Vec<f64>,
    sse: f64,
}

/// Least squares problem over the free parameters of one model kind.
struct CreepProblem<'a> {
    kind: ModelKind,
    time: &'a [f64],
    y: &'a [f64],
    fixed: Option<&'a [f64]>,
    constant: f64,
}

impl LeastSquaresProblem for CreepProblem<'_> {
    fn observations(&self) -> usize {
        self.time.len()
    }

    fn residuals(&self, params: &[f64], out: &mut DVector<f64>) {
        for (i, (&t, &y)) in self.time.iter().zip(self.y).enumerate() {
            out[i] = y - evaluate(self.kind, t, params, self.fixed, self.constant);
        }
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        let mut row = vec![0.0; params.len()];
        for (i, &t) in self.time.iter().enumerate() {
            fill_jacobian_row(self.kind, t, params, self.fixed, self.constant, &mut row);
            for (j, v) in row.iter().enumerate() {
                out[(i, j)] = *v;
            }
        }
    }

    fn admissible(&self, params: &[f64]) -> bool {
        if !params.iter().all(|v| v.is_finite()) {
            return false;
        }
        let k = self.kind.kv_count();
        if k > 0 && self.fixed.is_none() {
            return params[2 + k..2 + 2 * k].iter().all(|&tau| tau > 0.0);
        }
        true
    }
}

/// Fit a single model kind to `(time, y)`.
pub fn fit_model(kind: ModelKind, time: &[f64], y: &[f64], opts: &FitOptions) -> Result<FitResult, AppError> {
    if time.len() != y.len() {
        return Err(AppError::runtime("Time and deformation arrays differ in length."));
    }
    if time.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(AppError::input("Non-finite values in the data to fit."));
    }

    let fixed = if kind.is_evp() {
        opts.fixed_rtimes.as_deref()
    } else {
        None
    };
    if let Some(rtimes) = fixed {
        validate_rtimes(kind, rtimes)?;
    }

    let n = time.len();
    let k_free = kind.free_param_count(fixed.is_some());
    if n < k_free {
        return Err(AppError::data(format!(
            "Insufficient data for {}: n={n} points < {k_free} parameters.",
            kind.display_name()
        )));
    }

    let start = match &opts.iguess {
        Some(guess) => {
            validate_iguess(kind, guess, k_free, fixed.is_some())?;
            guess.clone()
        }
        None => grid_start(kind, time, y, fixed, opts)?.params,
    };

    let problem = CreepProblem {
        kind,
        time,
        y,
        fixed,
        constant: opts.constant,
    };
    let lm_opts = LmOptions {
        max_iter: opts.search.max_iter,
        ftol: opts.search.ftol,
        xtol: opts.search.xtol,
        ..LmOptions::default()
    };
    let outcome = levenberg_marquardt(&problem, &start, &lm_opts)?;
    if !outcome.converged {
        warn!(
            model = kind.display_name(),
            iterations = outcome.iterations,
            "Fit did not converge; reporting the last iterate."
        );
    }
    debug!(
        model = kind.display_name(),
        iterations = outcome.iterations,
        sse = outcome.sse,
        "Refinement finished"
    );

    let mut params = outcome.params;
    let mut jac = outcome.jacobian;
    if kind.is_evp() && fixed.is_none() && sort_kv_elements(kind, &mut params) {
        problem.jacobian(&params, &mut jac);
    }

    let sse = outcome.sse;
    if !sse.is_finite() {
        return Err(AppError::runtime(format!(
            "Fit of {} produced a non-finite SSE.",
            kind.display_name()
        )));
    }

    let covariance = covariance(&jac, sse).map(|c| {
        (0..c.nrows())
            .map(|i| c.row(i).iter().copied().collect())
            .collect()
    });

    Ok(FitResult {
        model: CreepModel {
            kind,
            name: opts.name.clone(),
            params,
            fixed_rtimes: fixed.map(|f| f.to_vec()),
            constant: opts.constant,
        },
        quality: FitQuality {
            sse,
            rmse: (sse / n as f64).sqrt(),
            bic: bic(n, sse, k_free),
            n,
        },
        covariance,
        iterations: outcome.iterations,
        converged: outcome.converged,
    })
}

fn validate_rtimes(kind: ModelKind, rtimes: &[f64]) -> Result<(), AppError> {
    if rtimes.len() != kind.kv_count() {
        return Err(AppError::input(format!(
            "{} needs {} retardation time(s), got {}.",
            kind.display_name(),
            kind.kv_count(),
            rtimes.len()
        )));
    }
    if rtimes.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
        return Err(AppError::input(format!(
            "Retardation times must be finite and > 0: {rtimes:?}"
        )));
    }
    Ok(())
}

fn validate_iguess(kind: ModelKind, guess: &[f64], k_free: usize, fixed: bool) -> Result<(), AppError> {
    if guess.len() != k_free {
        return Err(AppError::input(format!(
            "Initial guess for {} needs {k_free} values ({}), got {}.",
            kind.display_name(),
            kind.free_param_names(fixed).join(", "),
            guess.len()
        )));
    }
    if guess.iter().any(|v| !v.is_finite()) {
        return Err(AppError::input("Initial guess contains non-finite values."));
    }
    let k = kind.kv_count();
    if k > 0 && !fixed && guess[2 + k..].iter().any(|&tau| tau <= 0.0) {
        return Err(AppError::input("Initial retardation times must be > 0."));
    }
    Ok(())
}

fn nonlinear_grid(
    kind: ModelKind,
    time: &[f64],
    fixed: Option<&[f64]>,
    search: &SearchOptions,
) -> Result<Vec<Vec<f64>>, AppError> {
    if let Some(rtimes) = fixed {
        return Ok(vec![rtimes.to_vec()]);
    }
    let k = kind.kv_count();
    if k == 0 {
        return exponent_grid(search.exponent_min, search.exponent_max, search.exponent_steps);
    }

    if !(search.tau_min_ratio.is_finite() && search.tau_min_ratio > 0.0) {
        return Err(AppError::input("Invalid tau_min_ratio setting."));
    }
    let t_lo = time.iter().copied().fold(f64::INFINITY, f64::min);
    let t_hi = time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = default_rtime_bounds(t_lo, t_hi);
    let steps = match k {
        1 => search.tau_steps_1kv,
        2 => search.tau_steps_2kv,
        _ => search.tau_steps_3kv,
    };
    rtime_grid(
        k,
        search.tau_min.unwrap_or(lo),
        search.tau_max.unwrap_or(hi),
        steps,
        search.tau_min_ratio,
    )
}

fn grid_start(
    kind: ModelKind,
    time: &[f64],
    y: &[f64],
    fixed: Option<&[f64]>,
    opts: &FitOptions,
) -> Result<Candidate, AppError> {
    let grid = nonlinear_grid(kind, time, fixed, &opts.search)?;
    if grid.is_empty() {
        return Err(AppError::input(format!(
            "Starting grid for {} is empty (check tau range and tau_min_ratio).",
            kind.display_name()
        )));
    }

    // Evaluate each grid node independently (parallel).
    let candidates: Vec<Candidate> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, nonlinear)| {
            evaluate_candidate(kind, nonlinear, time, y, opts.constant).map(|(linear, sse)| Candidate {
                idx,
                params: assemble_params(kind, &linear, nonlinear, fixed.is_some()),
                sse,
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(AppError::runtime(format!(
            "No valid fit candidates for model {}.",
            kind.display_name()
        )));
    }

    // Deterministic selection: pick the minimum SSE; break ties by grid index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
            best = c;
        }
    }
    debug!(
        model = kind.display_name(),
        nodes = grid.len(),
        sse = best.sse,
        "Grid search finished"
    );

    Ok(best.clone())
}

fn evaluate_candidate(
    kind: ModelKind,
    nonlinear: &[f64],
    time: &[f64],
    y: &[f64],
    constant: f64,
) -> Option<(Vec<f64>, f64)> {
    let n = time.len();
    let p = kind.linear_len();

    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut row = vec![0.0; p];
    for (i, &t) in time.iter().enumerate() {
        fill_design_row(kind, t, nonlinear, constant, &mut row);
        for j in 0..p {
            x[(i, j)] = row[j];
        }
    }
    let yv = DVector::from_column_slice(y);

    let beta = solve_least_squares(&x, &yv)?;
    let fitted = &x * &beta;
    let sse = (yv - fitted).norm_squared();
    if !sse.is_finite() {
        return None;
    }
    Some((beta.iter().copied().collect(), sse))
}

/// Order Kelvin-Voigt elements by increasing retardation time.
///
/// Returns `true` if the parameters were permuted.
fn sort_kv_elements(kind: ModelKind, params: &mut [f64]) -> bool {
    let k = kind.kv_count();
    let mut pairs: Vec<(f64, f64)> = (0..k).map(|i| (params[2 + i], params[2 + k + i])).collect();
    if pairs.windows(2).all(|w| w[0].1 <= w[1].1) {
        return false;
    }
    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (i, (d, tau)) in pairs.into_iter().enumerate() {
        params[2 + i] = d;
        params[2 + k + i] = tau;
    }
    true
}
