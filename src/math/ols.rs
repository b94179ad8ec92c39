//! Linear least squares solver.
//!
//! Every creep model is linear in part of its parameters once the others are
//! fixed (the exponent `n`, or the retardation times `tau_i`). The grid search
//! therefore solves many small problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! The same routine solves the damped Gauss-Newton step of the
//! Levenberg-Marquardt refinement (see [`crate::math::lm`]).
//!
//! SVD is used because the design matrix is tall and its columns can be nearly
//! collinear (e.g. `exp(-t/tau)` for `tau` much longer than the record).

use nalgebra::{DMatrix, DVector};

/// Singular value thresholds tried in turn (on unit-norm columns).
const SVD_TOLERANCES: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Solve `min ||x β - y||²` by SVD of the column-equilibrated design.
///
/// Columns are scaled to unit norm first, so the singular value threshold
/// does not depend on parameter units (`B0` vs `Cv·t`). Returns `None` if
/// no tolerance gives a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let norms: Vec<f64> = x
        .column_iter()
        .map(|c| match c.norm() {
            n if n > 0.0 && n.is_finite() => n,
            _ => 1.0,
        })
        .collect();

    let mut scaled = x.clone();
    for (mut col, n) in scaled.column_iter_mut().zip(&norms) {
        col /= *n;
    }
    let svd = scaled.svd(true, true);

    SVD_TOLERANCES.iter().find_map(|&tol| {
        let z = svd.solve(y, tol).ok()?;
        let beta = DVector::from_iterator(z.len(), z.iter().zip(&norms).map(|(v, n)| v / n));
        beta.iter().all(|v| v.is_finite()).then_some(beta)
    })
}
