//! Reporting utilities: residuals, fitted grids and formatted output.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{CreepData, CreepModel, Experiment, FittedGrid};
use crate::error::AppError;
use crate::fit::transform::recalculate_fitted;
use crate::models::predict;

/// Observed vs fitted deformation at one measured time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualRow {
    #[serde(rename = "t_s")]
    pub time: f64,
    pub deformation: f64,
    pub fitted: f64,
    pub residual: f64,
}

/// Compute back-transformed fitted values and residuals for each point.
pub fn compute_residuals(
    data: &CreepData,
    model: &CreepModel,
    experiment: &Experiment,
) -> Result<Vec<ResidualRow>, AppError> {
    let mut out = Vec::with_capacity(data.len());
    for (&t, &d) in data.time.iter().zip(&data.deformation) {
        let fitted = recalculate_fitted(predict(model, t), experiment);
        if !fitted.is_finite() {
            return Err(AppError::runtime(
                "Non-finite model prediction during residual computation.",
            ));
        }
        out.push(ResidualRow {
            time: t,
            deformation: d,
            fitted,
            residual: d - fitted,
        });
    }
    Ok(out)
}

/// Sample the fitted curve (in deformation units) on `n` evenly spaced times.
pub fn fitted_grid(model: &CreepModel, experiment: &Experiment, t0: f64, t1: f64, n: usize) -> FittedGrid {
    let n = n.max(2);
    let (t0, t1) = if t1 > t0 { (t0, t1) } else { (t0, t0 + 1.0) };

    let mut time = Vec::with_capacity(n);
    let mut deformation = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let t = t0 + u * (t1 - t0);
        time.push(t);
        deformation.push(recalculate_fitted(predict(model, t), experiment));
    }
    FittedGrid { time, deformation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExperimentKind, ModelKind};

    fn power_law() -> CreepModel {
        CreepModel {
            kind: ModelKind::PowerLaw,
            name: "Power law".into(),
            params: vec![1.0, 0.5],
            fixed_rtimes: None,
            constant: 1.0,
        }
    }

    #[test]
    fn compute_residuals_back_transforms() {
        // D = t^0.5 in transformed space; h = sqrt(D K) for Vickers.
        let e = Experiment::new(ExperimentKind::Vickers, Some(10.0), None, None).unwrap();
        let data = CreepData {
            time: vec![4.0, 9.0],
            deformation: vec![(2.0 * e.k).sqrt(), 2.0],
        };
        let rows = compute_residuals(&data, &power_law(), &e).unwrap();
        assert!(rows[0].residual.abs() < 1e-12);
        assert!((rows[1].fitted - (3.0 * e.k).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn fitted_grid_spans_interval() {
        let e = Experiment::new(ExperimentKind::Tensile, None, None, None).unwrap();
        let g = fitted_grid(&power_law(), &e, 1.0, 9.0, 5);
        assert_eq!(g.time, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!((g.deformation[4] - 3.0).abs() < 1e-12);
    }
}
