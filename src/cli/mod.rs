//! Command-line parsing for the creep curve fitter.
//!
//! Argument parsing and command dispatch stay separate from the fitting code.
//! Most fitting flags are optional so they can be merged with a TOML run file
//! (see [`crate::config`]).

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{ExperimentKind, ModelSpec};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mcreep",
    version,
    about = "Fit creep models (power law, Nutting's law, EVP with 1-3 KV elements) to tensile or indentation creep data"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit datafiles, print results and plots, and save the final report.
    Fit(FitArgs),
    /// Write a synthetic creep curve generated from a model.
    Generate(GenerateArgs),
    /// Plot a previously saved fit record (`fit --export-json`).
    Plot(PlotArgs),
    /// Browse datafiles and models in an interactive terminal UI.
    Tui(FitArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone, Default)]
pub struct FitArgs {
    /// Datafiles with time and deformation columns. Without any (and without a
    /// run file listing them), an interactive picker is shown.
    pub files: Vec<PathBuf>,

    /// TOML run file with experiment, data, model and window settings.
    #[arg(short, long, env = "MCREEP_CONFIG", value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Type of experiment.
    #[arg(short, long, value_enum)]
    pub experiment: Option<ExperimentKind>,

    /// Loading force in mN (indentation; required for EVP models).
    #[arg(short = 'F', long)]
    pub force: Option<f64>,

    /// Tip radius in um (spherical indentation).
    #[arg(short = 'R', long)]
    pub radius: Option<f64>,

    /// Applied stress in GPa (tensile; required for EVP models).
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Model to fit, or `all` to select by BIC.
    #[arg(short, long, value_enum)]
    pub model: Option<ModelSpec>,

    /// Label of the model in legends and reports.
    #[arg(long)]
    pub model_name: Option<String>,

    /// Fixed retardation times for EVP models (comma separated, s).
    #[arg(long, value_delimiter = ',')]
    pub rtimes: Option<Vec<f64>>,

    /// Initial guess of the free parameters (comma separated, fitting order).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub iguess: Option<Vec<f64>>,

    /// Start of the holding segment (s).
    #[arg(long)]
    pub t_start: Option<f64>,

    /// Duration of the holding segment (s).
    #[arg(long)]
    pub t_hold: Option<f64>,

    /// Start of the fit window (s); defaults to `t_start`.
    #[arg(long)]
    pub t_fstart: Option<f64>,

    /// End of the fit window (s); defaults to `t_start + t_hold`.
    #[arg(long)]
    pub t_fend: Option<f64>,

    /// Factor converting the time column to seconds.
    #[arg(long)]
    pub time_to_seconds: Option<f64>,

    /// Factor converting the deformation column to um (or strain).
    #[arg(long)]
    pub deformation_to_um: Option<f64>,

    /// Lines to skip at the top of each datafile.
    #[arg(long)]
    pub skiprows: Option<usize>,

    /// Zero-based time and deformation columns (e.g. `0,1`).
    #[arg(long, value_delimiter = ',')]
    pub usecols: Option<Vec<usize>>,

    /// Column delimiter; whitespace when unset.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Directory for the report, figures and exports.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Final report file; defaults to `<output-dir>/mcreep_results.txt`.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the covariance matrix of each fit.
    #[arg(long)]
    pub print_covariances: bool,

    /// Plot both axes in log10.
    #[arg(long)]
    pub logscale: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Do not save SVG figures.
    #[arg(long)]
    pub no_svg: bool,

    /// Save a JSON fit record per datafile.
    #[arg(long)]
    pub export_json: bool,

    /// Save observed/fitted/residual CSV per datafile.
    #[arg(long)]
    pub export_csv: bool,

    /// Plot width (columns).
    #[arg(long)]
    pub width: Option<usize>,

    /// Plot height (rows).
    #[arg(long)]
    pub height: Option<usize>,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser, Clone)]
pub struct GenerateArgs {
    /// Output datafile.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = ExperimentKind::Vickers)]
    pub experiment: ExperimentKind,

    /// Loading force in mN.
    #[arg(short = 'F', long, default_value_t = 100.0)]
    pub force: f64,

    /// Tip radius in um (spherical indentation).
    #[arg(short = 'R', long)]
    pub radius: Option<f64>,

    /// Applied stress in GPa (tensile EVP models).
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Model generating the curve (`all` is not allowed).
    #[arg(short, long, value_enum, default_value_t = ModelSpec::Evp2)]
    pub model: ModelSpec,

    /// True free parameters (comma separated, fitting order); demo values
    /// when unset.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub params: Option<Vec<f64>>,

    /// End of the loading ramp (s).
    #[arg(long, default_value_t = 1.0)]
    pub t_start: f64,

    /// Duration of the holding segment (s).
    #[arg(long, default_value_t = 100.0)]
    pub t_hold: f64,

    /// Points in the holding segment.
    #[arg(short = 'n', long, default_value_t = 200)]
    pub count: usize,

    /// Points on the loading ramp.
    #[arg(long, default_value_t = 10)]
    pub ramp_points: usize,

    /// Relative noise level.
    #[arg(long, default_value_t = 0.002)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for plotting a saved fit record.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit record JSON produced by `mcreep fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub record: PathBuf,

    /// Plot both axes in log10.
    #[arg(long)]
    pub logscale: bool,

    /// Also save an SVG figure.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
