//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - read from TOML run files
//! - exported to JSON fit records and reloaded later for plotting

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Equivalent cone semi-angle of Vickers and Berkovich tips (degrees).
pub const PYRAMIDAL_TIP_ANGLE_DEG: f64 = 70.3;

/// Type of creep experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentKind {
    /// Macroscale tensile creep; deformation is strain.
    Tensile,
    /// Indentation creep with a Vickers tip; deformation is depth.
    Vickers,
    /// Indentation creep with a Berkovich tip.
    Berkovich,
    /// Indentation creep with a spherical tip (requires the tip radius).
    Spherical,
}

impl ExperimentKind {
    pub fn is_indentation(self) -> bool {
        !matches!(self, ExperimentKind::Tensile)
    }

    /// One-line description used in reports.
    pub fn description(self) -> &'static str {
        match self {
            ExperimentKind::Tensile => "Tensile creep experiment.",
            ExperimentKind::Vickers => "Indentation creep with Vickers tip.",
            ExperimentKind::Berkovich => "Indentation creep with Berkovich tip.",
            ExperimentKind::Spherical => "Indentation creep with Spherical tip.",
        }
    }
}

/// A creep experiment together with the constants derived from it.
///
/// `k` and `m` convert indentation depth into a quantity comparable with
/// tensile strain (`D = h^m / K`, Mencik 2011); both are 1 for tensile tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub kind: ExperimentKind,
    /// Loading force in mN (indentation).
    pub force: Option<f64>,
    /// Tip radius in um (spherical indentation).
    pub radius: Option<f64>,
    /// Applied stress in GPa (tensile).
    pub sigma: Option<f64>,
    pub k: f64,
    pub m: f64,
}

impl Experiment {
    pub fn new(
        kind: ExperimentKind,
        force: Option<f64>,
        radius: Option<f64>,
        sigma: Option<f64>,
    ) -> Result<Self, AppError> {
        for (name, value) in [("force", force), ("radius", radius), ("sigma", sigma)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(AppError::input(format!(
                        "Invalid experiment {name}={v} (must be finite and > 0)."
                    )));
                }
            }
        }

        let (k, m) = match kind {
            ExperimentKind::Tensile => (1.0, 1.0),
            ExperimentKind::Vickers | ExperimentKind::Berkovich => {
                let alpha = PYRAMIDAL_TIP_ANGLE_DEG.to_radians();
                (std::f64::consts::PI / (2.0 * alpha.tan()), 2.0)
            }
            ExperimentKind::Spherical => {
                let Some(r) = radius else {
                    return Err(AppError::input(
                        "Spherical indentation requires the tip radius (`--radius`, um).",
                    ));
                };
                (3.0 / (4.0 * r.sqrt()), 1.5)
            }
        };

        Ok(Self {
            kind,
            force,
            radius,
            sigma,
            k,
            m,
        })
    }

    /// Multiplicative constant of the EVP models: `sigma` for tensile tests,
    /// `F` for indentation.
    pub fn evp_constant(&self) -> Result<f64, AppError> {
        match self.kind {
            ExperimentKind::Tensile => self.sigma.ok_or_else(|| {
                AppError::input("EVP models of tensile creep require the applied stress (`--sigma`, GPa).")
            }),
            _ => self.force.ok_or_else(|| {
                AppError::input("EVP models of indentation creep require the loading force (`--force`, mN).")
            }),
        }
    }
}

/// Format of a creep datafile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataParameters {
    /// Zero-based columns holding time and deformation.
    pub usecols: [usize; 2],
    /// Marker starting a comment (rest of the line is ignored).
    pub comments: String,
    /// Number of leading lines to skip.
    pub skiprows: usize,
    /// Column separator; `None` splits on any whitespace.
    pub delimiter: Option<char>,
    /// Multiplier converting file time units to seconds.
    pub time_to_seconds: f64,
    /// Multiplier converting file deformation units to um.
    pub deformation_to_um: f64,
}

impl Default for DataParameters {
    fn default() -> Self {
        Self {
            usecols: [0, 1],
            comments: "#".to_string(),
            skiprows: 0,
            delimiter: None,
            time_to_seconds: 1.0,
            deformation_to_um: 1.0,
        }
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSpec {
    PowerLaw,
    NuttingLaw,
    Evp1,
    Evp2,
    Evp3,
    /// Fit every model and choose by BIC.
    All,
}

impl ModelSpec {
    pub fn to_kind(self) -> Option<ModelKind> {
        match self {
            ModelSpec::PowerLaw => Some(ModelKind::PowerLaw),
            ModelSpec::NuttingLaw => Some(ModelKind::NuttingLaw),
            ModelSpec::Evp1 => Some(ModelKind::Evp1),
            ModelSpec::Evp2 => Some(ModelKind::Evp2),
            ModelSpec::Evp3 => Some(ModelKind::Evp3),
            ModelSpec::All => None,
        }
    }
}

/// Concrete fitted model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `D(t) = C t^n`
    PowerLaw,
    /// `D(t) = e0 + C t^n`
    NuttingLaw,
    /// Spring + dashpot + one Kelvin-Voigt element.
    Evp1,
    /// Spring + dashpot + two Kelvin-Voigt elements.
    Evp2,
    /// Spring + dashpot + three Kelvin-Voigt elements.
    Evp3,
}

impl ModelKind {
    /// All kinds in order of increasing complexity.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::PowerLaw,
        ModelKind::NuttingLaw,
        ModelKind::Evp1,
        ModelKind::Evp2,
        ModelKind::Evp3,
    ];

    /// Human-readable label for terminal output and plot legends.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::PowerLaw => "Power law",
            ModelKind::NuttingLaw => "Nutting's law",
            ModelKind::Evp1 => "S+D+1KV",
            ModelKind::Evp2 => "S+D+2KV",
            ModelKind::Evp3 => "S+D+3KV",
        }
    }

    pub fn is_evp(self) -> bool {
        self.kv_count() > 0
    }

    /// Number of Kelvin-Voigt elements (0 for the empirical laws).
    pub fn kv_count(self) -> usize {
        match self {
            ModelKind::PowerLaw | ModelKind::NuttingLaw => 0,
            ModelKind::Evp1 => 1,
            ModelKind::Evp2 => 2,
            ModelKind::Evp3 => 3,
        }
    }

    /// Number of parameters the model is linear in.
    pub fn linear_len(self) -> usize {
        match self {
            ModelKind::PowerLaw => 1,
            ModelKind::NuttingLaw => 2,
            _ => 2 + self.kv_count(),
        }
    }

    /// Number of nonlinear parameters (exponent or retardation times).
    pub fn nonlinear_len(self) -> usize {
        match self {
            ModelKind::PowerLaw | ModelKind::NuttingLaw => 1,
            _ => self.kv_count(),
        }
    }

    /// Number of parameters actually fitted.
    pub fn free_param_count(self, fixed_rtimes: bool) -> usize {
        if self.is_evp() && fixed_rtimes {
            self.linear_len()
        } else {
            self.linear_len() + self.nonlinear_len()
        }
    }

    /// Names of the fitted parameters in fitting order.
    pub fn free_param_names(self, fixed_rtimes: bool) -> Vec<String> {
        match self {
            ModelKind::PowerLaw => vec!["C".into(), "n".into()],
            ModelKind::NuttingLaw => vec!["e0".into(), "C".into(), "n".into()],
            _ => {
                let k = self.kv_count();
                let mut names = vec!["B0".to_string(), "Cv".to_string()];
                names.extend((1..=k).map(|i| format!("D{i}")));
                if !fixed_rtimes {
                    names.extend((1..=k).map(|i| format!("tau{i}")));
                }
                names
            }
        }
    }

    /// Column names of the results table (without `R2fit`/`R2all`).
    pub fn table_columns(self) -> Vec<String> {
        match self {
            ModelKind::PowerLaw | ModelKind::NuttingLaw => self.free_param_names(false),
            _ => {
                let mut cols = vec!["const".to_string()];
                cols.extend(self.free_param_names(false));
                cols
            }
        }
    }

    /// Column names of the EVP compliance table.
    pub fn compliance_columns(self) -> Vec<String> {
        let k = self.kv_count();
        let mut cols = vec!["C0".to_string(), "Cv".to_string()];
        cols.extend((1..=k).map(|i| format!("C{i}")));
        cols.extend((1..=k).map(|i| format!("tau{i}")));
        cols
    }

    /// Report lines describing the model function.
    pub fn description(self) -> [&'static str; 2] {
        match self {
            ModelKind::PowerLaw => [
                "Model function: Power Law => deformation(t) = C * t**n",
                "Units are relative; n = creep constant ~ creep rate.",
            ],
            ModelKind::NuttingLaw => [
                "Model function: Nutting's Law => def(t) = e0 + C * t**n",
                "Units are relative; n = creep constant ~ creep rate.",
            ],
            _ => [
                "Model function: EVP with S,D and KV components.",
                "Compliances B,C,D in [GPa], retardation times tau in [s].",
            ],
        }
    }
}

/// Time windows of a run (all in seconds).
///
/// Data are read in `[t_start, t_start + t_hold]` (the holding segment) and the
/// model is fitted in `[t_fstart, t_fend]`, which defaults to the read window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    pub t_start: f64,
    pub t_hold: f64,
    pub t_fstart: Option<f64>,
    pub t_fend: Option<f64>,
}

impl FitWindow {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.t_start.is_finite() && self.t_start >= 0.0) {
            return Err(AppError::input(format!(
                "Invalid t_start={} (must be finite and >= 0).",
                self.t_start
            )));
        }
        if !(self.t_hold.is_finite() && self.t_hold > 0.0) {
            return Err(AppError::input(format!(
                "Invalid t_hold={} (must be finite and > 0).",
                self.t_hold
            )));
        }
        let (f0, f1) = (self.fit_start(), self.fit_end());
        if !(f0.is_finite() && f1.is_finite() && f0 <= f1) {
            return Err(AppError::input(format!(
                "Invalid fit window [{f0}, {f1}] (must be finite with t_fstart <= t_fend)."
            )));
        }
        Ok(())
    }

    pub fn read_end(&self) -> f64 {
        self.t_start + self.t_hold
    }

    pub fn fit_start(&self) -> f64 {
        self.t_fstart.unwrap_or(self.t_start)
    }

    pub fn fit_end(&self) -> f64 {
        self.t_fend.unwrap_or_else(|| self.read_end())
    }
}

/// Creep curve after unit conversion: time in seconds, deformation in um
/// (indentation) or strain (tensile).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreepData {
    pub time: Vec<f64>,
    pub deformation: Vec<f64>,
}

impl CreepData {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Points with `t0 <= t <= t1` (inclusive at both ends).
    pub fn within(&self, t0: f64, t1: f64) -> CreepData {
        let mut out = CreepData::default();
        for (&t, &d) in self.time.iter().zip(&self.deformation) {
            if t >= t0 && t <= t1 {
                out.time.push(t);
                out.deformation.push(d);
            }
        }
        out
    }

    pub fn time_range(&self) -> Option<(f64, f64)> {
        range_of(&self.time)
    }
}

fn range_of(values: &[f64]) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_finite() && hi.is_finite() {
        Some((lo, hi))
    } else {
        None
    }
}

/// Tuning of the initial grid search and the Levenberg-Marquardt refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Exponent grid for the power and Nutting laws.
    pub exponent_min: f64,
    pub exponent_max: f64,
    pub exponent_steps: usize,

    /// Retardation time grid bounds (s); derived from the fit window when unset.
    pub tau_min: Option<f64>,
    pub tau_max: Option<f64>,
    /// Grid steps per dimension for 1/2/3 Kelvin-Voigt elements.
    pub tau_steps_1kv: usize,
    pub tau_steps_2kv: usize,
    pub tau_steps_3kv: usize,
    /// Minimum ratio between neighbouring retardation times.
    pub tau_min_ratio: f64,

    pub max_iter: usize,
    /// Relative SSE decrease below which refinement stops.
    pub ftol: f64,
    /// Relative step size below which refinement stops.
    pub xtol: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            exponent_min: 0.001,
            exponent_max: 1.5,
            exponent_steps: 150,
            tau_min: None,
            tau_max: None,
            tau_steps_1kv: 60,
            tau_steps_2kv: 25,
            tau_steps_3kv: 15,
            tau_min_ratio: 1.5,
            max_iter: 200,
            ftol: 1e-12,
            xtol: 1e-12,
        }
    }
}

/// A fully specified creep model: kind, fitted parameters and fixed constants.
///
/// `params` are the free parameters in fitting order (see
/// [`ModelKind::free_param_names`]); fixed retardation times are kept apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreepModel {
    pub kind: ModelKind,
    pub name: String,
    pub params: Vec<f64>,
    pub fixed_rtimes: Option<Vec<f64>>,
    /// EVP multiplicative constant (`sigma` or `F`); 1 for the empirical laws.
    pub constant: f64,
}

impl CreepModel {
    /// Retardation times, either fitted or fixed (empty for the empirical laws).
    pub fn rtimes(&self) -> Vec<f64> {
        let k = self.kind.kv_count();
        if k == 0 {
            return Vec::new();
        }
        match &self.fixed_rtimes {
            Some(fixed) => fixed.clone(),
            None => self.params[2 + k..2 + 2 * k].to_vec(),
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub bic: f64,
    pub n: usize,
}

/// Result of fitting one model to one window of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: CreepModel,
    pub quality: FitQuality,
    /// Covariance of the free parameters, in fitting order.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub iterations: usize,
    pub converged: bool,
}

/// Outcome for one datafile.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    /// File name used as the table index and in output file names.
    pub datafile: String,
    pub fit: FitResult,
    /// R² on the fit window (transformed data).
    pub r2_fit: Option<f64>,
    /// R² on the whole read window.
    pub r2_all: Option<f64>,
    pub compliances: Option<EvpCompliances>,
}

/// Final compliances and retardation times of an EVP model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvpCompliances {
    pub c0: f64,
    pub cv: f64,
    pub c: Vec<f64>,
    pub taus: Vec<f64>,
}

impl EvpCompliances {
    /// Values in the order of [`ModelKind::compliance_columns`].
    pub fn values(&self) -> Vec<f64> {
        let mut out = vec![self.c0, self.cv];
        out.extend(&self.c);
        out.extend(&self.taus);
        out
    }
}

/// Plot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotOptions {
    /// Axis labels; derived from the experiment when unset.
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    /// Both axes in log10.
    pub logscale: bool,
    /// Tensile only: show strain in percent.
    pub e_to_percent: bool,
    /// Print an ASCII plot per datafile.
    pub ascii: bool,
    /// Save an SVG figure per datafile.
    pub svg: bool,
    pub width: usize,
    pub height: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            xlabel: None,
            ylabel: None,
            logscale: false,
            e_to_percent: true,
            ascii: true,
            svg: true,
            width: 100,
            height: 25,
        }
    }
}

/// Output destinations.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub dir: PathBuf,
    /// Final report file; defaults to `<dir>/mcreep_results.txt`.
    pub report: Option<PathBuf>,
    pub print_covariances: bool,
    pub export_json: bool,
    pub export_csv: bool,
}

impl OutputOptions {
    pub fn report_path(&self) -> PathBuf {
        self.report
            .clone()
            .unwrap_or_else(|| self.dir.join("mcreep_results.txt"))
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            report: None,
            print_covariances: false,
            export_json: false,
            export_csv: false,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, an optional TOML run file and defaults.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub experiment: Experiment,
    pub data: DataParameters,
    pub model_spec: ModelSpec,
    /// Label used in legends and reports; defaults to the model display name.
    pub model_name: Option<String>,
    pub rtimes: Option<Vec<f64>>,
    pub iguess: Option<Vec<f64>>,
    pub window: FitWindow,
    pub search: SearchOptions,
    pub plot: PlotOptions,
    pub output: OutputOptions,
}

impl FitConfig {
    /// Legend/report label for a fitted kind.
    pub fn label_for(&self, kind: ModelKind) -> String {
        match (&self.model_name, self.model_spec.to_kind()) {
            (Some(name), Some(k)) if k == kind => name.clone(),
            _ => kind.display_name().to_string(),
        }
    }
}

/// A saved fit record (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitRecord {
    pub tool: String,
    pub version: String,
    pub datafile: String,
    pub experiment: Experiment,
    pub window: FitWindow,
    pub model: CreepModel,
    pub param_names: Vec<String>,
    pub covariance: Option<Vec<Vec<f64>>>,
    pub quality: FitQuality,
    pub r2_fit: Option<f64>,
    pub r2_all: Option<f64>,
    pub compliances: Option<EvpCompliances>,
    pub grid: FittedGrid,
}

/// Fitted curve sampled in deformation units (after back-transformation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedGrid {
    pub time: Vec<f64>,
    pub deformation: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vickers_constants_follow_pyramidal_angle() {
        let e = Experiment::new(ExperimentKind::Vickers, Some(100.0), None, None).unwrap();
        let expected = std::f64::consts::PI / (2.0 * 70.3_f64.to_radians().tan());
        assert!((e.k - expected).abs() < 1e-12);
        assert_eq!(e.m, 2.0);
        assert_eq!(e.evp_constant().unwrap(), 100.0);
    }

    #[test]
    fn spherical_requires_radius() {
        let err = Experiment::new(ExperimentKind::Spherical, Some(10.0), None, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let e = Experiment::new(ExperimentKind::Spherical, Some(10.0), Some(4.0), None).unwrap();
        assert!((e.k - 3.0 / 8.0).abs() < 1e-12);
        assert_eq!(e.m, 1.5);
    }

    #[test]
    fn tensile_evp_constant_is_sigma() {
        let e = Experiment::new(ExperimentKind::Tensile, None, None, None).unwrap();
        assert_eq!((e.k, e.m), (1.0, 1.0));
        assert!(e.evp_constant().is_err());

        let e = Experiment::new(ExperimentKind::Tensile, None, None, Some(0.012)).unwrap();
        assert_eq!(e.evp_constant().unwrap(), 0.012);
    }

    #[test]
    fn rejects_non_positive_force() {
        assert!(Experiment::new(ExperimentKind::Vickers, Some(0.0), None, None).is_err());
    }

    #[test]
    fn parameter_names_drop_fixed_rtimes() {
        assert_eq!(ModelKind::Evp2.free_param_names(false), ["B0", "Cv", "D1", "D2", "tau1", "tau2"]);
        assert_eq!(ModelKind::Evp2.free_param_names(true), ["B0", "Cv", "D1", "D2"]);
        assert_eq!(ModelKind::Evp1.table_columns(), ["const", "B0", "Cv", "D1", "tau1"]);
        assert_eq!(ModelKind::Evp3.free_param_count(true), 5);
        assert_eq!(ModelKind::NuttingLaw.free_param_count(false), 3);
    }

    #[test]
    fn window_selection_is_inclusive() {
        let data = CreepData {
            time: vec![0.0, 1.0, 2.0, 3.0],
            deformation: vec![0.0, 0.1, 0.2, 0.3],
        };
        let sub = data.within(1.0, 2.0);
        assert_eq!(sub.time, vec![1.0, 2.0]);
        assert_eq!(sub.deformation, vec![0.1, 0.2]);
    }

    #[test]
    fn fit_window_defaults_to_read_window() {
        let w = FitWindow {
            t_start: 2.0,
            t_hold: 10.0,
            t_fstart: None,
            t_fend: None,
        };
        w.validate().unwrap();
        assert_eq!((w.fit_start(), w.fit_end()), (2.0, 12.0));

        let bad = FitWindow { t_fstart: Some(5.0), t_fend: Some(4.0), ..w };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rtimes_come_from_params_or_fixed() {
        let free = CreepModel {
            kind: ModelKind::Evp1,
            name: "S+D+1KV".into(),
            params: vec![1.0, 0.01, 0.2, 7.0],
            fixed_rtimes: None,
            constant: 1.0,
        };
        assert_eq!(free.rtimes(), vec![7.0]);

        let fixed = CreepModel {
            params: vec![1.0, 0.01, 0.2],
            fixed_rtimes: Some(vec![5.0]),
            ..free
        };
        assert_eq!(fixed.rtimes(), vec![5.0]);
    }
}
