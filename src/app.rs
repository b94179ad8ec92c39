//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module:
//! - parses CLI arguments and merges them with an optional TOML run file
//! - runs the fit pipeline over the datafiles
//! - prints per-file results, plots and summary tables
//! - writes figures, exports and the final report

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Cli, Command, FitArgs, GenerateArgs, PlotArgs};
use crate::config::RunFile;
use crate::domain::{
    DataParameters, Experiment, FileResult, FitConfig, FitWindow, ModelSpec, OutputOptions, PlotOptions,
};
use crate::error::AppError;

pub mod pipeline;

/// Pixel size of saved SVG figures.
const SVG_SIZE: (u32, u32) = (800, 600);

/// Entry point for the `mcreep` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may carry RUST_LOG / MCREEP_CONFIG; a missing file is fine.
    let _ = dotenvy::dotenv();

    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    crate::logging::init_cli_logger(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Generate(args) => handle_generate(&args),
        Command::Plot(args) => handle_plot(&args),
        Command::Tui(args) => handle_tui(&args),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let run_file = load_run_file(args)?;
    let config = fit_config_from_args(args, &run_file)?;
    let files = resolve_datafiles(args, &run_file, true)?;

    create_dir(&config.output.dir)?;
    let runs = pipeline::run_files(&files, &config)?;

    for run in &runs {
        let result = &run.result;
        println!("{}", crate::report::format_fit_line(&result.datafile, &result.fit));
        if config.output.print_covariances {
            println!(
                "{}",
                crate::report::format_covariance(result.fit.covariance.as_deref())
            );
        }
        if config.model_spec == ModelSpec::All {
            print!(
                "{}",
                crate::report::format_model_comparison(&result.datafile, &run.selection)
            );
        }
        write_file_outputs(run, &config)?;
    }

    let results: Vec<FileResult> = runs.into_iter().map(|r| r.result).collect();
    println!("{}", crate::report::format_results(&results));

    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let report = crate::report::final_report(config.experiment.kind, &results, &generated);
    let report_path = config.output.report_path();
    if let Some(parent) = report_path.parent() {
        create_dir(parent)?;
    }
    std::fs::write(&report_path, report).map_err(|e| {
        AppError::runtime(format!("Failed to write report '{}': {e}", report_path.display()))
    })?;
    println!("Results saved to: {}", report_path.display());
    Ok(())
}

/// Plot and export one fitted datafile.
fn write_file_outputs(run: &pipeline::FileRun, config: &FitConfig) -> Result<(), AppError> {
    let result = &run.result;
    let model = &result.fit.model;
    let dir = &config.output.dir;

    if config.plot.ascii || config.plot.svg {
        let series = crate::plot::build_series(&result.datafile, &run.data, model, &config.experiment, &config.plot);
        if config.plot.ascii {
            println!(
                "{}",
                crate::plot::render_ascii_plot(&series, config.plot.width, config.plot.height)
            );
        }
        if config.plot.svg {
            let path = dir.join(format!("{}.svg", result.datafile));
            crate::plot::write_svg(&path, &series, SVG_SIZE)?;
            debug!(path = %path.display(), "Saved figure");
        }
    }

    if config.output.export_json {
        let record = crate::io::build_fit_record(result, &config.experiment, &config.window);
        let path = dir.join(format!("{}.fit.json", result.datafile));
        crate::io::write_fit_record(&path, &record)?;
        info!(path = %path.display(), "Saved fit record");
    }
    if config.output.export_csv {
        let rows = crate::report::compute_residuals(&run.data, model, &config.experiment)?;
        let path = dir.join(format!("{}.fit.csv", result.datafile));
        crate::io::write_residuals_csv(&path, &rows)?;
        info!(path = %path.display(), "Saved residuals");
    }
    Ok(())
}

fn handle_generate(args: &GenerateArgs) -> Result<(), AppError> {
    let Some(kind) = args.model.to_kind() else {
        return Err(AppError::input("`generate` needs a single model, not `all`."));
    };
    let experiment = Experiment::new(args.experiment, Some(args.force), args.radius, args.sigma)?;
    let params = args
        .params
        .clone()
        .unwrap_or_else(|| crate::data::default_params(kind));

    let spec = crate::data::SampleSpec {
        experiment,
        kind,
        params,
        t_start: args.t_start,
        t_hold: args.t_hold,
        count: args.count,
        ramp_points: args.ramp_points,
        noise: args.noise,
        seed: args.seed,
    };
    let data = crate::data::generate_sample(&spec)?;

    let names = kind.free_param_names(false);
    let values: Vec<String> = names
        .iter()
        .zip(&spec.params)
        .map(|(n, v)| format!("{n}={v}"))
        .collect();
    let header = vec![
        format!("{} synthetic creep curve", env!("CARGO_PKG_NAME")),
        format!("{} | {}", args.experiment.description(), kind.display_name()),
        format!("{} | noise={} seed={}", values.join(" "), args.noise, args.seed),
        "time[s] deformation".to_string(),
    ];
    crate::data::write_datafile(&args.output, &data, &header)?;
    println!("Wrote {} points to {}", data.len(), args.output.display());
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let record = crate::io::read_fit_record(&args.record)?;
    let opts = PlotOptions {
        logscale: args.logscale,
        ..PlotOptions::default()
    };
    let series = crate::plot::series_from_record(&record, &opts);
    println!("{}", crate::plot::render_ascii_plot(&series, args.width, args.height));
    if let Some(path) = &args.svg {
        crate::plot::write_svg(path, &series, SVG_SIZE)?;
    }
    Ok(())
}

fn handle_tui(args: &FitArgs) -> Result<(), AppError> {
    let run_file = load_run_file(args)?;
    let config = fit_config_from_args(args, &run_file)?;
    let files = resolve_datafiles(args, &run_file, false)?;
    crate::tui::run(config, files)
}

fn load_run_file(args: &FitArgs) -> Result<RunFile, AppError> {
    match &args.config {
        Some(path) => {
            debug!(path = %path.display(), "Loading run file");
            RunFile::from_file(path)
        }
        None => Ok(RunFile::default()),
    }
}

/// Merge CLI flags over the run file over built-in defaults.
pub fn fit_config_from_args(args: &FitArgs, run: &RunFile) -> Result<FitConfig, AppError> {
    let exp = &run.experiment;
    let kind = args
        .experiment
        .or(exp.kind)
        .ok_or_else(|| AppError::input("Experiment type is required (`--experiment`)."))?;
    let experiment = Experiment::new(
        kind,
        args.force.or(exp.force),
        args.radius.or(exp.radius),
        args.sigma.or(exp.sigma),
    )?;

    let data = merge_data_parameters(args, run.data.clone().unwrap_or_default())?;

    let win = &run.window;
    let window = FitWindow {
        t_start: args
            .t_start
            .or(win.t_start)
            .ok_or_else(|| AppError::input("Start of the holding segment is required (`--t-start`)."))?,
        t_hold: args
            .t_hold
            .or(win.t_hold)
            .ok_or_else(|| AppError::input("Holding time is required (`--t-hold`)."))?,
        t_fstart: args.t_fstart.or(win.t_fstart),
        t_fend: args.t_fend.or(win.t_fend),
    };
    window.validate()?;

    let mut plot = run.plot.clone().unwrap_or_default();
    plot.logscale |= args.logscale;
    if args.no_plot {
        plot.ascii = false;
    }
    if args.no_svg {
        plot.svg = false;
    }
    if let Some(w) = args.width {
        plot.width = w;
    }
    if let Some(h) = args.height {
        plot.height = h;
    }

    let out = &run.output;
    let defaults = OutputOptions::default();
    let output = OutputOptions {
        dir: args
            .output_dir
            .clone()
            .or_else(|| out.dir.clone())
            .unwrap_or(defaults.dir),
        report: args.report.clone().or_else(|| out.report.clone()),
        print_covariances: args.print_covariances || out.print_covariances.unwrap_or(false),
        export_json: args.export_json || out.export_json.unwrap_or(false),
        export_csv: args.export_csv || out.export_csv.unwrap_or(false),
    };

    let model = &run.model;
    Ok(FitConfig {
        experiment,
        data,
        model_spec: args.model.or(model.spec).unwrap_or(ModelSpec::All),
        model_name: args.model_name.clone().or_else(|| model.name.clone()),
        rtimes: args.rtimes.clone().or_else(|| model.rtimes.clone()),
        iguess: args.iguess.clone().or_else(|| model.iguess.clone()),
        window,
        search: run.search.clone().unwrap_or_default(),
        plot,
        output,
    })
}

fn merge_data_parameters(args: &FitArgs, mut data: DataParameters) -> Result<DataParameters, AppError> {
    if let Some(cols) = &args.usecols {
        let [t, d] = cols.as_slice() else {
            return Err(AppError::input(format!(
                "`--usecols` needs exactly two columns, got {}.",
                cols.len()
            )));
        };
        data.usecols = [*t, *d];
    }
    if let Some(n) = args.skiprows {
        data.skiprows = n;
    }
    if args.delimiter.is_some() {
        data.delimiter = args.delimiter;
    }
    if let Some(f) = args.time_to_seconds {
        data.time_to_seconds = f;
    }
    if let Some(f) = args.deformation_to_um {
        data.deformation_to_um = f;
    }
    Ok(data)
}

/// Datafiles from the command line, else the run file, else the picker.
fn resolve_datafiles(args: &FitArgs, run: &RunFile, interactive: bool) -> Result<Vec<PathBuf>, AppError> {
    let listed = if !args.files.is_empty() {
        args.files.clone()
    } else {
        run.datafiles.clone()
    };
    if listed.is_empty() {
        return if interactive {
            crate::cli::picker::prompt_for_datafiles()
        } else {
            let found = crate::cli::picker::discover_datafiles();
            if found.is_empty() {
                Err(AppError::input("No .txt datafiles found."))
            } else {
                Ok(found)
            }
        };
    }
    listed
        .iter()
        .map(|p| crate::cli::picker::validate_datafile_path(p))
        .collect()
}

fn create_dir(dir: &Path) -> Result<(), AppError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::runtime(format!("Failed to create directory '{}': {e}", dir.display())))
}

/// Rewrite argv so `mcreep` defaults to `mcreep fit`.
///
/// - `mcreep`                     -> `mcreep fit`
/// - `mcreep h1.txt -e vickers`   -> `mcreep fit h1.txt -e vickers`
/// - `mcreep --help/--version/-h` -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    let is_subcommand = matches!(arg1.as_str(), "fit" | "generate" | "plot" | "tui");
    if is_top_level_help_or_version || is_subcommand {
        return argv;
    }

    argv.insert(1, "fit".to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExperimentKind;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["mcreep", "fit"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fit(a) => a,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rewrite_defaults_to_fit() {
        assert_eq!(rewrite_args(args(&["mcreep"])), args(&["mcreep", "fit"]));
        assert_eq!(
            rewrite_args(args(&["mcreep", "h.txt", "-e", "tensile"])),
            args(&["mcreep", "fit", "h.txt", "-e", "tensile"])
        );
        assert_eq!(rewrite_args(args(&["mcreep", "--help"])), args(&["mcreep", "--help"]));
        assert_eq!(
            rewrite_args(args(&["mcreep", "generate", "-o", "x"])),
            args(&["mcreep", "generate", "-o", "x"])
        );
    }

    #[test]
    fn cli_flags_override_run_file() {
        let run = RunFile::from_toml_str(
            r#"
[experiment]
kind = "berkovich"
force = 50.0

[model]
spec = "evp1"
rtimes = [4.0]

[window]
t_start = 1.0
t_hold = 60.0

[output]
dir = "out"
export_csv = true
"#,
        )
        .unwrap();

        let a = fit_args(&["-F", "80", "--t-hold", "100", "--no-svg"]);
        let cfg = fit_config_from_args(&a, &run).unwrap();
        assert_eq!(cfg.experiment.kind, ExperimentKind::Berkovich);
        assert_eq!(cfg.experiment.force, Some(80.0));
        assert_eq!(cfg.model_spec, ModelSpec::Evp1);
        assert_eq!(cfg.rtimes, Some(vec![4.0]));
        assert_eq!(cfg.window.t_start, 1.0);
        assert_eq!(cfg.window.t_hold, 100.0);
        assert_eq!(cfg.output.dir, PathBuf::from("out"));
        assert!(cfg.output.export_csv);
        assert!(!cfg.plot.svg);
        assert!(cfg.plot.ascii);
    }

    #[test]
    fn defaults_apply_without_run_file() {
        let a = fit_args(&["-e", "tensile", "--t-start", "0", "--t-hold", "10"]);
        let cfg = fit_config_from_args(&a, &RunFile::default()).unwrap();
        assert_eq!(cfg.model_spec, ModelSpec::All);
        assert_eq!(cfg.data, DataParameters::default());
        assert_eq!(cfg.output.report_path(), PathBuf::from("./mcreep_results.txt"));
    }

    #[test]
    fn missing_experiment_or_window_is_input_error() {
        let a = fit_args(&["--t-start", "0", "--t-hold", "10"]);
        assert_eq!(fit_config_from_args(&a, &RunFile::default()).unwrap_err().exit_code(), 2);

        let a = fit_args(&["-e", "vickers", "--t-start", "0"]);
        assert_eq!(fit_config_from_args(&a, &RunFile::default()).unwrap_err().exit_code(), 2);

        let a = fit_args(&["-e", "spherical", "--t-start", "0", "--t-hold", "10"]);
        assert_eq!(fit_config_from_args(&a, &RunFile::default()).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn usecols_needs_two_columns() {
        let a = fit_args(&["-e", "tensile", "--t-start", "0", "--t-hold", "10", "--usecols", "0,1,2"]);
        assert!(fit_config_from_args(&a, &RunFile::default()).is_err());

        let a = fit_args(&["-e", "tensile", "--t-start", "0", "--t-hold", "10", "--usecols", "2,3"]);
        assert_eq!(fit_config_from_args(&a, &RunFile::default()).unwrap().data.usecols, [2, 3]);
    }
}
