//! Shared fit pipeline used by the CLI and the TUI.
//!
//! read window -> fit window -> transform -> fit/select -> R² -> compliances
//!
//! The front-ends only deal with presentation (printing vs widgets).

use std::path::Path;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{CreepData, FileResult, FitConfig, ModelSpec};
use crate::error::AppError;
use crate::fit::selection::{FitSelection, SelectionRequest, fit_and_select};
use crate::fit::transform::recalculate_all;
use crate::io::read_datafile;
use crate::math::stats::r_squared;
use crate::models::predict;

/// Everything computed for one datafile.
#[derive(Debug, Clone)]
pub struct FileRun {
    pub result: FileResult,
    /// Data of the read window (deformation units, not transformed).
    pub data: CreepData,
    pub selection: FitSelection,
}

/// Fit one datafile with the configured model(s).
pub fn run_file(path: &Path, config: &FitConfig) -> Result<FileRun, AppError> {
    run_file_with_spec(path, config, config.model_spec)
}

/// Fit one datafile, overriding the configured model choice.
pub fn run_file_with_spec(path: &Path, config: &FitConfig, spec: ModelSpec) -> Result<FileRun, AppError> {
    let datafile = datafile_name(path);
    let window = &config.window;

    let data = read_datafile(path, &config.data, window)?;
    let fit_data = data.within(window.fit_start(), window.fit_end());
    if fit_data.is_empty() {
        return Err(AppError::data(format!(
            "{datafile}: no data in the fit window [{}, {}].",
            window.fit_start(),
            window.fit_end()
        )));
    }

    let experiment = &config.experiment;
    let y_fit = recalculate_all(&fit_data.deformation, experiment);

    let evp_constant = experiment.evp_constant().ok();
    let name = spec.to_kind().map(|kind| config.label_for(kind));
    let req = SelectionRequest {
        spec,
        search: &config.search,
        rtimes: config.rtimes.as_deref(),
        iguess: config.iguess.as_deref(),
        evp_constant,
        name: name.as_deref(),
    };
    let selection = fit_and_select(&fit_data.time, &y_fit, &req).map_err(|e| {
        AppError::new(e.exit_code(), format!("{datafile}: {}", e.message()))
    })?;

    let model = &selection.best.model;
    if !selection.best.converged {
        warn!(datafile = %datafile, model = %model.name, "Fit did not converge; keeping the last iterate");
    }

    let r2_fit = r_squared_on(&fit_data.time, &y_fit, model);
    let y_all = recalculate_all(&data.deformation, experiment);
    let r2_all = r_squared_on(&data.time, &y_all, model);

    let compliances = crate::fit::evp::compliances(model, experiment.kind, window.t_start);

    info!(
        datafile = %datafile,
        model = %model.name,
        n = selection.best.quality.n,
        sse = selection.best.quality.sse,
        "Fitted"
    );

    Ok(FileRun {
        result: FileResult {
            datafile,
            fit: selection.best.clone(),
            r2_fit,
            r2_all,
            compliances,
        },
        data,
        selection,
    })
}

/// Fit several datafiles in parallel; results keep the input order.
///
/// The first failing file (in input order) aborts the run.
pub fn run_files(paths: &[impl AsRef<Path> + Sync], config: &FitConfig) -> Result<Vec<FileRun>, AppError> {
    let runs: Vec<Result<FileRun, AppError>> = paths
        .par_iter()
        .map(|p| run_file(p.as_ref(), config))
        .collect();
    runs.into_iter().collect()
}

/// File name used as the table index and in output names.
pub fn datafile_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn r_squared_on(time: &[f64], y: &[f64], model: &crate::domain::CreepModel) -> Option<f64> {
    let fitted: Vec<f64> = time.iter().map(|&t| predict(model, t)).collect();
    r_squared(y, &fitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleSpec, default_params, generate_sample, write_datafile};
    use crate::domain::{
        DataParameters, Experiment, ExperimentKind, FitWindow, ModelKind, OutputOptions, PlotOptions,
        SearchOptions,
    };

    fn config(spec: ModelSpec, window: FitWindow) -> FitConfig {
        FitConfig {
            experiment: Experiment::new(ExperimentKind::Vickers, Some(100.0), None, None).unwrap(),
            data: DataParameters::default(),
            model_spec: spec,
            model_name: None,
            rtimes: None,
            iguess: None,
            window,
            search: SearchOptions::default(),
            plot: PlotOptions::default(),
            output: OutputOptions::default(),
        }
    }

    fn write_sample(dir: &Path, name: &str, kind: ModelKind) -> std::path::PathBuf {
        let spec = SampleSpec {
            experiment: Experiment::new(ExperimentKind::Vickers, Some(100.0), None, None).unwrap(),
            kind,
            params: default_params(kind),
            t_start: 1.0,
            t_hold: 100.0,
            count: 101,
            ramp_points: 5,
            noise: 0.0,
            seed: 1,
        };
        let data = generate_sample(&spec).unwrap();
        let path = dir.join(name);
        write_datafile(&path, &data, &[]).unwrap();
        path
    }

    fn window() -> FitWindow {
        FitWindow { t_start: 1.0, t_hold: 100.0, t_fstart: None, t_fend: None }
    }

    #[test]
    fn fits_evp1_curve_with_compliances() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "h.txt", ModelKind::Evp1);

        let run = run_file(&path, &config(ModelSpec::Evp1, window())).unwrap();
        assert_eq!(run.result.datafile, "h.txt");
        // Ramp points before t_start are excluded.
        assert_eq!(run.data.len(), 101);
        assert!(run.result.r2_fit.unwrap() > 0.999_999);
        assert!(run.result.r2_all.unwrap() > 0.999_999);

        let c = run.result.compliances.as_ref().unwrap();
        assert!((c.taus[0] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn empty_fit_window_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "h.txt", ModelKind::PowerLaw);
        let w = FitWindow { t_fstart: Some(500.0), t_fend: Some(600.0), ..window() };
        let err = run_file(&path, &config(ModelSpec::PowerLaw, w)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn run_files_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_sample(dir.path(), "b.txt", ModelKind::PowerLaw);
        let b = write_sample(dir.path(), "a.txt", ModelKind::NuttingLaw);

        let runs = run_files(&[a, b], &config(ModelSpec::NuttingLaw, window())).unwrap();
        let names: Vec<&str> = runs.iter().map(|r| r.result.datafile.as_str()).collect();
        assert_eq!(names, ["b.txt", "a.txt"]);
        assert!(runs.iter().all(|r| r.result.compliances.is_none()));
    }
}
