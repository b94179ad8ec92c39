//! TOML run files.
//!
//! A run file stores everything needed to repeat a fitting session:
//!
//! ```toml
//! datafiles = ["h1.txt", "h2.txt"]
//!
//! [experiment]
//! kind = "vickers"
//! force = 100.0
//!
//! [data]
//! usecols = [0, 1]
//! time_to_seconds = 1.0
//!
//! [model]
//! spec = "evp2"
//! rtimes = [5.0, 50.0]
//!
//! [window]
//! t_start = 2.0
//! t_hold = 200.0
//! ```
//!
//! Every key is optional; command-line flags take precedence over the file and
//! the file over built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DataParameters, ExperimentKind, ModelSpec, PlotOptions, SearchOptions};
use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    /// Datafiles to fit when none are given on the command line.
    /// Relative paths are resolved against the run file's directory.
    #[serde(default)]
    pub datafiles: Vec<PathBuf>,
    #[serde(default)]
    pub experiment: ExperimentSection,
    pub data: Option<DataParameters>,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub window: WindowSection,
    pub search: Option<SearchOptions>,
    pub plot: Option<PlotOptions>,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentSection {
    pub kind: Option<ExperimentKind>,
    pub force: Option<f64>,
    pub radius: Option<f64>,
    pub sigma: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    pub spec: Option<ModelSpec>,
    pub name: Option<String>,
    pub rtimes: Option<Vec<f64>>,
    pub iguess: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub t_start: Option<f64>,
    pub t_hold: Option<f64>,
    pub t_fstart: Option<f64>,
    pub t_fend: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub print_covariances: Option<bool>,
    pub export_json: Option<bool>,
    pub export_csv: Option<bool>,
}

impl RunFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::input(format!("Failed to read run file '{}': {e}", path.display()))
        })?;
        let mut run = Self::from_toml_str(&content).map_err(|e| {
            AppError::input(format!("Invalid run file '{}': {}", path.display(), e.message()))
        })?;

        if let Some(base) = path.parent() {
            for f in &mut run.datafiles {
                if f.is_relative() {
                    *f = base.join(&*f);
                }
            }
        }
        Ok(run)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::input(format!("TOML parsing error: {e}")))
    }
}
