use std::path::{Path, PathBuf};

use mcreep::app::fit_config_from_args;
use mcreep::app::pipeline::{run_file, run_files};
use mcreep::cli::FitArgs;
use mcreep::config::RunFile;
use mcreep::data::{SampleSpec, default_params, generate_sample, write_datafile};
use mcreep::domain::{Experiment, ExperimentKind, FileResult, ModelKind, ModelSpec, PlotOptions};
use mcreep::io::{build_fit_record, read_fit_record, write_fit_record, write_residuals_csv};
use mcreep::report::{compute_residuals, final_report, format_results};

fn write_sample(dir: &Path, name: &str, experiment: Experiment, kind: ModelKind, params: Vec<f64>) -> PathBuf {
    let spec = SampleSpec {
        experiment,
        kind,
        params,
        t_start: 1.0,
        t_hold: 200.0,
        count: 201,
        ramp_points: 10,
        noise: 0.0,
        seed: 3,
    };
    let data = generate_sample(&spec).unwrap();
    let path = dir.join(name);
    write_datafile(&path, &data, &["time[s] deformation".to_string()]).unwrap();
    path
}

fn vickers() -> Experiment {
    Experiment::new(ExperimentKind::Vickers, Some(100.0), None, None).unwrap()
}

fn fit_args(files: &[PathBuf], model: ModelSpec, out: &Path) -> FitArgs {
    FitArgs {
        files: files.to_vec(),
        experiment: Some(ExperimentKind::Vickers),
        force: Some(100.0),
        model: Some(model),
        t_start: Some(1.0),
        t_hold: Some(200.0),
        output_dir: Some(out.to_path_buf()),
        ..FitArgs::default()
    }
}

#[test]
fn evp2_indentation_curve_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "h.txt", vickers(), ModelKind::Evp2, default_params(ModelKind::Evp2));

    let args = fit_args(&[path.clone()], ModelSpec::Evp2, dir.path());
    let config = fit_config_from_args(&args, &RunFile::default()).unwrap();
    let run = run_file(&path, &config).unwrap();

    let model = &run.result.fit.model;
    assert_eq!(model.kind, ModelKind::Evp2);
    let taus = model.rtimes();
    assert!((taus[0] - 3.0).abs() / 3.0 < 1e-3, "tau1={}", taus[0]);
    assert!((taus[1] - 30.0).abs() / 30.0 < 1e-3, "tau2={}", taus[1]);
    assert!(run.result.r2_fit.unwrap() > 0.999_999);

    let c = run.result.compliances.as_ref().unwrap();
    assert_eq!(c.c.len(), 2);
    assert_eq!(c.taus, taus);
}

#[test]
fn evp3_indentation_curve_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "h3.txt", vickers(), ModelKind::Evp3, default_params(ModelKind::Evp3));

    let args = fit_args(&[path.clone()], ModelSpec::Evp3, dir.path());
    let config = fit_config_from_args(&args, &RunFile::default()).unwrap();
    let run = run_file(&path, &config).unwrap();

    let model = &run.result.fit.model;
    assert_eq!(model.kind, ModelKind::Evp3);
    let taus = model.rtimes();
    for (got, want) in taus.iter().zip([2.0, 15.0, 80.0]) {
        assert!((got - want).abs() / want < 1e-3, "taus={taus:?}");
    }
    assert!(run.result.r2_fit.unwrap() > 0.999_999);
    assert_eq!(run.result.compliances.as_ref().unwrap().c.len(), 3);
}

#[test]
fn all_mode_prefers_the_generating_law() {
    let dir = tempfile::tempdir().unwrap();
    let tensile = Experiment::new(ExperimentKind::Tensile, None, None, Some(0.5)).unwrap();
    let path = write_sample(dir.path(), "e.txt", tensile, ModelKind::NuttingLaw, vec![0.02, 0.004, 0.3]);

    let mut args = fit_args(&[path.clone()], ModelSpec::All, dir.path());
    args.experiment = Some(ExperimentKind::Tensile);
    args.force = None;
    args.sigma = Some(0.5);
    let config = fit_config_from_args(&args, &RunFile::default()).unwrap();
    let run = run_file(&path, &config).unwrap();

    assert_eq!(run.selection.best.model.kind, ModelKind::NuttingLaw);
    assert!(run.selection.fits.len() >= 2);
}

#[test]
fn record_and_residual_exports_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), "h.txt", vickers(), ModelKind::PowerLaw, default_params(ModelKind::PowerLaw));
    let args = fit_args(&[path.clone()], ModelSpec::PowerLaw, dir.path());
    let config = fit_config_from_args(&args, &RunFile::default()).unwrap();
    let run = run_file(&path, &config).unwrap();

    let record = build_fit_record(&run.result, &config.experiment, &config.window);
    let json = dir.path().join("h.txt.fit.json");
    write_fit_record(&json, &record).unwrap();
    let back = read_fit_record(&json).unwrap();
    assert_eq!(back.model.kind, ModelKind::PowerLaw);
    for (a, b) in back.model.params.iter().zip(&run.result.fit.model.params) {
        assert!((a - b).abs() <= 1e-12 * b.abs());
    }
    assert_eq!(back.param_names, ["C", "n"]);
    assert_eq!(back.grid.time.len(), 201);

    let series = mcreep::plot::series_from_record(&back, &PlotOptions::default());
    assert!(series.observed.is_empty());
    assert_eq!(series.y_label, "h [um]");

    let rows = compute_residuals(&run.data, &run.result.fit.model, &config.experiment).unwrap();
    assert!(rows.iter().all(|r| r.residual.abs() < 1e-6));
    let csv = dir.path().join("h.txt.fit.csv");
    write_residuals_csv(&csv, &rows).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("t_s,deformation,fitted,residual\n"));
    assert_eq!(text.lines().count(), rows.len() + 1);
}

#[test]
fn run_file_drives_a_batch_and_report() {
    let dir = tempfile::tempdir().unwrap();
    write_sample(dir.path(), "h1.txt", vickers(), ModelKind::Evp1, default_params(ModelKind::Evp1));
    write_sample(dir.path(), "h2.txt", vickers(), ModelKind::Evp1, vec![0.02, 2e-5, 0.003, 20.0]);

    let toml = r#"
datafiles = ["h1.txt", "h2.txt"]

[experiment]
kind = "vickers"
force = 100.0

[model]
spec = "evp1"

[window]
t_start = 1.0
t_hold = 200.0
"#;
    let run_path = dir.path().join("run.toml");
    std::fs::write(&run_path, toml).unwrap();
    let run = RunFile::from_file(&run_path).unwrap();
    assert!(run.datafiles.iter().all(|p| p.starts_with(dir.path())));

    let config = fit_config_from_args(&FitArgs::default(), &run).unwrap();
    let runs = run_files(&run.datafiles, &config).unwrap();
    let results: Vec<FileResult> = runs.into_iter().map(|r| r.result).collect();
    assert_eq!(results[0].datafile, "h1.txt");
    assert!((results[1].fit.model.rtimes()[0] - 20.0).abs() < 1e-2);

    let printed = format_results(&results);
    assert!(printed.contains("Fitting results and statistics:"));
    assert!(printed.contains("h2.txt"));

    let report = final_report(ExperimentKind::Vickers, &results, "2026-01-01 00:00:00");
    assert!(report.starts_with(&format!("# mcreep {} | 2026-01-01 00:00:00", env!("CARGO_PKG_VERSION"))));
    assert!(report.contains("Indentation creep with Vickers tip."));
    assert!(report.contains("EVP with S,D and KV components"));
}

#[test]
fn malformed_datafile_reports_line_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.txt");
    std::fs::write(&path, "# t h\n1.0 0.5\n2.0 oops\n").unwrap();

    let args = fit_args(&[path.clone()], ModelSpec::PowerLaw, dir.path());
    let config = fit_config_from_args(&args, &RunFile::default()).unwrap();
    let err = run_file(&path, &config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.message().contains(":3:"), "{}", err.message());
}
