//! Synthetic creep curves for demos and tests.
//!
//! Curves are generated from a model with known parameters (in the fitted,
//! transformed space), optionally preceded by a linear loading ramp, perturbed
//! by relative Gaussian noise and back-transformed to deformation.

use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CreepData, Experiment, ModelKind};
use crate::error::AppError;
use crate::fit::transform::recalculate_fitted;
use crate::models::evaluate;

#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub experiment: Experiment,
    pub kind: ModelKind,
    /// True free parameters in fitting order (retardation times included).
    pub params: Vec<f64>,
    /// End of the loading ramp = start of the holding segment (s).
    pub t_start: f64,
    pub t_hold: f64,
    /// Points in the holding segment.
    pub count: usize,
    /// Points on the loading ramp `[0, t_start)`; 0 for none.
    pub ramp_points: usize,
    /// Relative standard deviation of the noise.
    pub noise: f64,
    pub seed: u64,
}

/// Demo parameters giving depths around 1-2 um for indentation.
pub fn default_params(kind: ModelKind) -> Vec<f64> {
    match kind {
        ModelKind::PowerLaw => vec![1.5, 0.05],
        ModelKind::NuttingLaw => vec![1.2, 0.3, 0.2],
        ModelKind::Evp1 => vec![0.018, 1e-5, 0.002, 10.0],
        ModelKind::Evp2 => vec![0.018, 1e-5, 0.0015, 0.001, 3.0, 30.0],
        ModelKind::Evp3 => vec![0.018, 1e-5, 0.001, 0.001, 0.0008, 2.0, 15.0, 80.0],
    }
}

pub fn generate_sample(spec: &SampleSpec) -> Result<CreepData, AppError> {
    if spec.count < 2 {
        return Err(AppError::input("Sample count must be >= 2."));
    }
    if !(spec.t_start.is_finite() && spec.t_start >= 0.0 && spec.t_hold.is_finite() && spec.t_hold > 0.0) {
        return Err(AppError::input("Invalid sample window (t_start >= 0, t_hold > 0)."));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::input("Noise level must be finite and >= 0."));
    }
    let expected = spec.kind.free_param_count(false);
    if spec.params.len() != expected {
        return Err(AppError::input(format!(
            "{} needs {expected} parameters ({}), got {}.",
            spec.kind.display_name(),
            spec.kind.free_param_names(false).join(", "),
            spec.params.len()
        )));
    }

    let constant = if spec.kind.is_evp() {
        spec.experiment.evp_constant()?
    } else {
        1.0
    };
    let model_at = |t: f64| evaluate(spec.kind, t, &spec.params, None, constant);

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise.max(0.0))
        .map_err(|e| AppError::runtime(format!("Noise distribution error: {e}")))?;

    let mut data = CreepData::default();

    if spec.ramp_points > 0 && spec.t_start > 0.0 {
        let top = model_at(spec.t_start);
        for i in 0..spec.ramp_points {
            let t = spec.t_start * i as f64 / spec.ramp_points as f64;
            let value = top * t / spec.t_start;
            data.time.push(t);
            data.deformation.push(recalculate_fitted(value, &spec.experiment));
        }
    }

    let step = spec.t_hold / (spec.count as f64 - 1.0);
    for i in 0..spec.count {
        let t = spec.t_start + step * i as f64;
        let value = model_at(t) * (1.0 + normal.sample(&mut rng));
        data.time.push(t);
        data.deformation.push(recalculate_fitted(value, &spec.experiment));
    }

    if data.deformation.iter().any(|v| !v.is_finite()) {
        return Err(AppError::runtime("Synthetic curve contains non-finite values."));
    }
    Ok(data)
}

/// Write a two-column datafile with a `#` header.
pub fn write_datafile(path: &Path, data: &CreepData, header: &[String]) -> Result<(), AppError> {
    let mut text = String::new();
    for line in header {
        text.push_str(&format!("# {line}\n"));
    }
    for (t, d) in data.time.iter().zip(&data.deformation) {
        text.push_str(&format!("{t:.6}\t{d:.10}\n"));
    }
    std::fs::write(path, text)
        .map_err(|e| AppError::runtime(format!("Failed to write datafile '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExperimentKind;

    fn spec(kind: ModelKind, noise: f64) -> SampleSpec {
        SampleSpec {
            experiment: Experiment::new(ExperimentKind::Vickers, Some(100.0), None, None).unwrap(),
            kind,
            params: default_params(kind),
            t_start: 2.0,
            t_hold: 100.0,
            count: 51,
            ramp_points: 4,
            noise,
            seed: 7,
        }
    }

    #[test]
    fn noiseless_sample_follows_model() {
        let s = spec(ModelKind::PowerLaw, 0.0);
        let data = generate_sample(&s).unwrap();
        assert_eq!(data.len(), 55);
        assert_eq!(data.time[4], 2.0);
        assert!((data.time[54] - 102.0).abs() < 1e-9);

        let e = s.experiment;
        let h = recalculate_fitted(1.5 * 2.0_f64.powf(0.05), &e);
        assert!((data.deformation[4] - h).abs() < 1e-12);
        // Ramp starts from zero.
        assert_eq!(data.deformation[0], 0.0);
    }

    #[test]
    fn same_seed_same_curve() {
        let a = generate_sample(&spec(ModelKind::Evp2, 0.01)).unwrap();
        let b = generate_sample(&spec(ModelKind::Evp2, 0.01)).unwrap();
        assert_eq!(a, b);

        let mut other = spec(ModelKind::Evp2, 0.01);
        other.seed = 8;
        assert_ne!(a, generate_sample(&other).unwrap());
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let mut s = spec(ModelKind::Evp1, 0.0);
        s.params.pop();
        assert_eq!(generate_sample(&s).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn written_file_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.txt");
        let data = generate_sample(&spec(ModelKind::NuttingLaw, 0.0)).unwrap();
        write_datafile(&path, &data, &["synthetic".to_string()]).unwrap();

        let back = crate::io::load_datafile(&path, &Default::default()).unwrap();
        assert_eq!(back.len(), data.len());
        assert!((back.deformation[10] - data.deformation[10]).abs() < 1e-9);
    }
}
