//! Datafile ingest.
//!
//! Creep datafiles are plain text tables (as written by indentation and
//! tensile testers): optional header lines, comments, and at least two numeric
//! columns holding time and deformation.
//!
//! Design goals:
//! - **Strict rows**: a malformed row is an error naming the file and line
//!   (exit code 2); we never silently drop measured points
//! - **Unit scaling at the boundary**: everything downstream sees seconds and um
//! - **Separation of concerns**: no fitting logic here

use std::path::Path;

use tracing::debug;

use crate::domain::{CreepData, DataParameters, FitWindow};
use crate::error::AppError;

/// Read a datafile and keep the rows inside the read window
/// `[t_start, t_start + t_hold]`.
pub fn read_datafile(path: &Path, params: &DataParameters, window: &FitWindow) -> Result<CreepData, AppError> {
    let all = load_datafile(path, params)?;
    let data = all.within(window.t_start, window.read_end());
    debug!(
        file = %path.display(),
        rows = all.len(),
        kept = data.len(),
        "Datafile loaded"
    );
    if data.is_empty() {
        return Err(AppError::data(format!(
            "No data points of '{}' in the read window [{}, {}] s.",
            path.display(),
            window.t_start,
            window.read_end()
        )));
    }
    Ok(data)
}

/// Read every data row of a datafile (unit-scaled, no windowing).
pub fn load_datafile(path: &Path, params: &DataParameters) -> Result<CreepData, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read datafile '{}': {e}", path.display())))?;
    parse_datafile(&text, params, &path.display().to_string())
}

/// Parse datafile text. `source` names the file in error messages.
pub fn parse_datafile(text: &str, params: &DataParameters, source: &str) -> Result<CreepData, AppError> {
    validate_params(params)?;
    let [col_t, col_d] = params.usecols;
    let needed = col_t.max(col_d) + 1;

    let mut data = CreepData::default();
    for (idx, raw) in text.lines().enumerate().skip(params.skiprows) {
        let line_no = idx + 1;
        let line = strip_comment(raw, &params.comments).trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = match params.delimiter {
            Some(d) => line.split(d).map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        };
        if fields.len() < needed {
            return Err(AppError::input(format!(
                "{source}:{line_no}: expected at least {needed} columns, found {}.",
                fields.len()
            )));
        }

        let t = parse_field(fields[col_t], source, line_no)? * params.time_to_seconds;
        let d = parse_field(fields[col_d], source, line_no)? * params.deformation_to_um;
        data.time.push(t);
        data.deformation.push(d);
    }

    if data.is_empty() {
        return Err(AppError::input(format!("{source}: no data rows found.")));
    }
    Ok(data)
}

fn validate_params(params: &DataParameters) -> Result<(), AppError> {
    if params.usecols[0] == params.usecols[1] {
        return Err(AppError::input("usecols must name two different columns."));
    }
    for (name, v) in [
        ("time_to_seconds", params.time_to_seconds),
        ("deformation_to_um", params.deformation_to_um),
    ] {
        if !(v.is_finite() && v > 0.0) {
            return Err(AppError::input(format!("Invalid {name}={v} (must be finite and > 0).")));
        }
    }
    Ok(())
}

fn strip_comment<'a>(line: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        return line;
    }
    match line.find(marker) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_field(field: &str, source: &str, line_no: usize) -> Result<f64, AppError> {
    let v: f64 = field
        .parse()
        .map_err(|_| AppError::input(format!("{source}:{line_no}: invalid number '{field}'.")))?;
    if !v.is_finite() {
        return Err(AppError::input(format!("{source}:{line_no}: non-finite value '{field}'.")));
    }
    Ok(v)
}
