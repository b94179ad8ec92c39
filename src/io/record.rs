//! Read/write fit record JSON files.
//!
//! A fit record is the portable representation of one fitted datafile:
//! - experiment, windows and model (kind, parameters, fixed retardation times)
//! - covariance, SSE/RMSE/BIC and both R² values
//! - EVP compliances when applicable
//! - a precomputed fitted grid (deformation units) for quick plotting
//!
//! The schema is defined by `domain::FitRecord`.

use std::fs::File;
use std::path::Path;

use crate::domain::{Experiment, FileResult, FitRecord, FitWindow};
use crate::error::AppError;
use crate::report::fitted_grid;

/// Number of points of the fitted grid stored in a record.
const GRID_POINTS: usize = 201;

/// Build the record of one fitted datafile.
pub fn build_fit_record(result: &FileResult, experiment: &Experiment, window: &FitWindow) -> FitRecord {
    let fit = &result.fit;
    let grid = fitted_grid(
        &fit.model,
        experiment,
        window.t_start,
        window.read_end(),
        GRID_POINTS,
    );
    FitRecord {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        datafile: result.datafile.clone(),
        experiment: *experiment,
        window: *window,
        model: fit.model.clone(),
        param_names: fit.model.kind.free_param_names(fit.model.fixed_rtimes.is_some()),
        covariance: fit.covariance.clone(),
        quality: fit.quality.clone(),
        r2_fit: result.r2_fit,
        r2_all: result.r2_all,
        compliances: result.compliances.clone(),
        grid,
    }
}

/// Write a fit record JSON file.
pub fn write_fit_record(path: &Path, record: &FitRecord) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::runtime(format!("Failed to create fit record '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, record)
        .map_err(|e| AppError::runtime(format!("Failed to write fit record: {e}")))?;
    Ok(())
}

/// Read a fit record JSON file.
pub fn read_fit_record(path: &Path) -> Result<FitRecord, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open fit record '{}': {e}", path.display())))?;
    let record: FitRecord =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid fit record JSON: {e}")))?;
    Ok(record)
}
