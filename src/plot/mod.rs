//! Plot data preparation and renderers.
//!
//! - `ascii`: fixed-size terminal plot
//! - `svg`: per-datafile figure rendered with Plotters
//!
//! Both renderers consume a [`PlotSeries`] built here, so unit conversion
//! (back-transformation, percent strain, log axes) happens in one place.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

use crate::domain::{CreepData, CreepModel, Experiment, ExperimentKind, FitRecord, PlotOptions};
use crate::report::fitted_grid;

/// Number of samples of the fitted curve.
const CURVE_POINTS: usize = 200;

/// Observed points and fitted curve in plot coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub title: String,
    pub fit_label: String,
    pub x_label: String,
    pub y_label: String,
    pub observed: Vec<(f64, f64)>,
    pub fitted: Vec<(f64, f64)>,
}

impl PlotSeries {
    /// Bounds over both series, `None` if there is nothing finite to plot.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut x = [f64::INFINITY, f64::NEG_INFINITY];
        let mut y = [f64::INFINITY, f64::NEG_INFINITY];
        for &(px, py) in self.observed.iter().chain(&self.fitted) {
            x = [x[0].min(px), x[1].max(px)];
            y = [y[0].min(py), y[1].max(py)];
        }
        if x.iter().chain(&y).all(|v| v.is_finite()) {
            Some((x, y))
        } else {
            None
        }
    }
}

/// Build the series of one fitted datafile.
pub fn build_series(
    datafile: &str,
    data: &CreepData,
    model: &CreepModel,
    experiment: &Experiment,
    opts: &PlotOptions,
) -> PlotSeries {
    let observed: Vec<(f64, f64)> = data.time.iter().copied().zip(data.deformation.iter().copied()).collect();
    let (t0, t1) = data.time_range().unwrap_or((0.0, 1.0));
    let grid = fitted_grid(model, experiment, t0, t1, CURVE_POINTS);
    let fitted: Vec<(f64, f64)> = grid.time.into_iter().zip(grid.deformation).collect();

    finish_series(datafile, &model.name, experiment.kind, observed, fitted, opts)
}

/// Build the series of a saved fit record (fitted curve only).
pub fn series_from_record(record: &FitRecord, opts: &PlotOptions) -> PlotSeries {
    let fitted: Vec<(f64, f64)> = record
        .grid
        .time
        .iter()
        .copied()
        .zip(record.grid.deformation.iter().copied())
        .collect();
    finish_series(
        &record.datafile,
        &record.model.name,
        record.experiment.kind,
        Vec::new(),
        fitted,
        opts,
    )
}

fn finish_series(
    datafile: &str,
    fit_label: &str,
    kind: ExperimentKind,
    observed: Vec<(f64, f64)>,
    fitted: Vec<(f64, f64)>,
    opts: &PlotOptions,
) -> PlotSeries {
    let percent = opts.e_to_percent && kind == ExperimentKind::Tensile;
    let y_scale = if percent { 100.0 } else { 1.0 };

    let x_label = opts.xlabel.clone().unwrap_or_else(|| "t [s]".to_string());
    let y_label = opts.ylabel.clone().unwrap_or_else(|| default_y_label(kind, percent));

    let convert = |pts: Vec<(f64, f64)>| -> Vec<(f64, f64)> {
        pts.into_iter()
            .map(|(x, y)| (x, y * y_scale))
            .filter_map(|(x, y)| {
                if opts.logscale {
                    (x > 0.0 && y > 0.0).then(|| (x.log10(), y.log10()))
                } else {
                    Some((x, y))
                }
            })
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect()
    };

    let (x_label, y_label) = if opts.logscale {
        (log_label(&x_label), log_label(&y_label))
    } else {
        (x_label, y_label)
    };

    PlotSeries {
        title: datafile.to_string(),
        fit_label: fit_label.to_string(),
        x_label,
        y_label,
        observed: convert(observed),
        fitted: convert(fitted),
    }
}

fn default_y_label(kind: ExperimentKind, percent: bool) -> String {
    match (kind, percent) {
        (ExperimentKind::Tensile, true) => "strain [%]".to_string(),
        (ExperimentKind::Tensile, false) => "strain [-]".to_string(),
        _ => "h [um]".to_string(),
    }
}

fn log_label(label: &str) -> String {
    if label.starts_with("log(") {
        label.to_string()
    } else {
        format!("log({label})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    fn linear_tensile() -> (CreepData, CreepModel, Experiment) {
        let data = CreepData {
            time: vec![1.0, 10.0, 100.0],
            deformation: vec![0.01, 0.02, 0.03],
        };
        let model = CreepModel {
            kind: ModelKind::PowerLaw,
            name: "Power law".into(),
            params: vec![0.01, 0.2],
            fixed_rtimes: None,
            constant: 1.0,
        };
        let e = Experiment::new(ExperimentKind::Tensile, None, None, None).unwrap();
        (data, model, e)
    }

    #[test]
    fn tensile_strain_is_shown_in_percent() {
        let (data, model, e) = linear_tensile();
        let s = build_series("t.txt", &data, &model, &e, &PlotOptions::default());
        assert_eq!(s.y_label, "strain [%]");
        assert!((s.observed[2].1 - 3.0).abs() < 1e-12);
        assert_eq!(s.fitted.len(), 200);
        assert_eq!(s.fit_label, "Power law");
    }

    #[test]
    fn logscale_transforms_axes_and_labels_once() {
        let (data, model, e) = linear_tensile();
        let opts = PlotOptions {
            logscale: true,
            xlabel: Some("log(t [s])".into()),
            ..PlotOptions::default()
        };
        let s = build_series("t.txt", &data, &model, &e, &opts);
        assert_eq!(s.x_label, "log(t [s])");
        assert_eq!(s.y_label, "log(strain [%])");
        assert!((s.observed[1].0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn logscale_drops_non_positive_points() {
        let (mut data, model, e) = linear_tensile();
        data.time[0] = 0.0;
        let opts = PlotOptions { logscale: true, ..PlotOptions::default() };
        let s = build_series("t.txt", &data, &model, &e, &opts);
        assert_eq!(s.observed.len(), 2);
    }
}
