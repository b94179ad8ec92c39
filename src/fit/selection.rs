//! Model selection across the creep models using BIC with guardrails.
//!
//! For a single requested model the fit is returned as-is. With `--model all`
//! every model is fitted and:
//!
//! 1. underdetermined models are skipped: require `n >= k + 5`
//! 2. the model with minimum BIC wins
//! 3. if a simpler model is within ΔBIC ≤ 2 of the best, the simpler one is chosen

use tracing::{debug, warn};

use crate::domain::{FitResult, ModelKind, ModelSpec, SearchOptions};
use crate::error::AppError;
use crate::fit::fitter::{FitOptions, fit_model};

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Fits for all attempted models (after guardrails).
    pub fits: Vec<FitResult>,
    /// Any models that were skipped and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// Everything needed to fit the requested model(s) to one window of data.
#[derive(Debug, Clone)]
pub struct SelectionRequest<'a> {
    pub spec: ModelSpec,
    pub search: &'a SearchOptions,
    pub rtimes: Option<&'a [f64]>,
    pub iguess: Option<&'a [f64]>,
    /// EVP constant, `None` when `sigma`/`F` is unknown.
    pub evp_constant: Option<f64>,
    /// Optional label for the single requested model.
    pub name: Option<&'a str>,
}

/// Fit the requested model(s) and select the best one.
pub fn fit_and_select(time: &[f64], y: &[f64], req: &SelectionRequest<'_>) -> Result<FitSelection, AppError> {
    if let Some(kind) = req.spec.to_kind() {
        let opts = single_options(kind, req)?;
        let fit = fit_model(kind, time, y, &opts)?;
        return Ok(FitSelection {
            best: fit.clone(),
            fits: vec![fit],
            skipped: Vec::new(),
        });
    }

    if let Some(rtimes) = req.rtimes {
        check_all_mode_rtimes(rtimes)?;
    }

    let n = time.len();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for kind in ModelKind::ALL {
        let fixed = req.rtimes.filter(|r| kind.is_evp() && r.len() == kind.kv_count());
        let k = kind.free_param_count(fixed.is_some());
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }

        let constant = if kind.is_evp() {
            match req.evp_constant {
                Some(c) => c,
                None => {
                    skipped.push((kind, "EVP constant (sigma or F) not given".to_string()));
                    continue;
                }
            }
        } else {
            1.0
        };

        let opts = FitOptions {
            search: req.search.clone(),
            fixed_rtimes: fixed.map(|r| r.to_vec()),
            iguess: None,
            constant,
            name: kind.display_name().to_string(),
        };
        match fit_model(kind, time, y, &opts) {
            Ok(fit) => fits.push(fit),
            Err(err) => {
                warn!(model = kind.display_name(), "Skipping model: {err}");
                skipped.push((kind, err.message().to_string()));
            }
        }
    }

    if fits.is_empty() {
        return Err(AppError::data(
            "Insufficient data to fit any model after guardrails.",
        ));
    }

    let best = select_by_bic(&fits);
    debug!(model = best.model.kind.display_name(), bic = best.quality.bic, "Selected model");
    Ok(FitSelection {
        best,
        fits,
        skipped,
    })
}

/// Fixed retardation times must be positive and fit one of the EVP models.
fn check_all_mode_rtimes(rtimes: &[f64]) -> Result<(), AppError> {
    if rtimes.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
        return Err(AppError::input(format!(
            "Retardation times must be finite and > 0: {rtimes:?}"
        )));
    }
    if !ModelKind::ALL.iter().any(|k| k.is_evp() && k.kv_count() == rtimes.len()) {
        return Err(AppError::input(format!(
            "{} retardation time(s) match no EVP model (1 to 3 KV elements).",
            rtimes.len()
        )));
    }
    Ok(())
}

fn single_options(kind: ModelKind, req: &SelectionRequest<'_>) -> Result<FitOptions, AppError> {
    let constant = if kind.is_evp() {
        req.evp_constant.ok_or_else(|| {
            AppError::input(format!(
                "{} needs the experiment constant (`--sigma` for tensile, `--force` for indentation).",
                kind.display_name()
            ))
        })?
    } else {
        1.0
    };
    Ok(FitOptions {
        search: req.search.clone(),
        fixed_rtimes: if kind.is_evp() { req.rtimes.map(|r| r.to_vec()) } else { None },
        iguess: req.iguess.map(|g| g.to_vec()),
        constant,
        name: req
            .name
            .map(str::to_string)
            .unwrap_or_else(|| kind.display_name().to_string()),
    })
}

fn select_by_bic(fits: &[FitResult]) -> FitResult {
    // Find minimum BIC.
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.quality.bic < best.quality.bic {
            best = f;
        }
    }

    let best_bic = best.quality.bic;

    // Iterate in order of increasing complexity and pick the first fit that
    // is close enough to the best.
    for kind in ModelKind::ALL {
        if let Some(f) = fits.iter().find(|f| f.model.kind == kind) {
            if f.quality.bic <= best_bic + 2.0 {
                return f.clone();
            }
        }
    }

    best.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreepModel, FitQuality};

    fn result(kind: ModelKind, bic: f64) -> FitResult {
        FitResult {
            model: CreepModel {
                kind,
                name: kind.display_name().to_string(),
                params: vec![],
                fixed_rtimes: None,
                constant: 1.0,
            },
            quality: FitQuality {
                sse: 1.0,
                rmse: 0.0,
                bic,
                n: 100,
            },
            covariance: None,
            iterations: 1,
            converged: true,
        }
    }

    #[test]
    fn bic_prefers_simpler_when_close() {
        let fits = vec![
            result(ModelKind::PowerLaw, 10.0),
            result(ModelKind::NuttingLaw, 9.0),
            result(ModelKind::Evp1, 0.0),
        ];
        assert_eq!(select_by_bic(&fits).model.kind, ModelKind::Evp1);

        let fits = vec![
            result(ModelKind::PowerLaw, 1.5),
            result(ModelKind::Evp1, 0.0),
        ];
        assert_eq!(select_by_bic(&fits).model.kind, ModelKind::PowerLaw);
    }

    #[test]
    fn all_models_choose_nutting_for_nutting_data() {
        let t: Vec<f64> = (0..200).map(|i| 1.0 + i as f64).collect();
        let y: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, t)| 0.5 + 0.2 * t.powf(0.4) + 1e-4 * ((i * 7919 % 13) as f64 - 6.0))
            .collect();
        let search = SearchOptions {
            tau_steps_2kv: 10,
            tau_steps_3kv: 8,
            ..SearchOptions::default()
        };
        let req = SelectionRequest {
            spec: ModelSpec::All,
            search: &search,
            rtimes: None,
            iguess: None,
            evp_constant: None,
            name: None,
        };
        let sel = fit_and_select(&t, &y, &req).unwrap();
        assert_eq!(sel.fits.len(), 2);
        assert_eq!(sel.skipped.len(), 3);
        assert_eq!(sel.best.model.kind, ModelKind::NuttingLaw);
    }

    #[test]
    fn all_mode_rejects_bad_rtimes() {
        let t: Vec<f64> = (1..60).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|t| 1.0 + 0.1 * t.powf(0.3)).collect();
        let search = SearchOptions::default();
        for rtimes in [vec![-5.0], vec![f64::NAN], vec![1.0, 2.0, 3.0, 4.0]] {
            let req = SelectionRequest {
                spec: ModelSpec::All,
                search: &search,
                rtimes: Some(&rtimes),
                iguess: None,
                evp_constant: Some(1.0),
                name: None,
            };
            let err = fit_and_select(&t, &y, &req).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{rtimes:?}");
        }
    }

    #[test]
    fn single_evp_without_constant_is_input_error() {
        let t: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let search = SearchOptions::default();
        let req = SelectionRequest {
            spec: ModelSpec::Evp1,
            search: &search,
            rtimes: None,
            iguess: None,
            evp_constant: None,
            name: None,
        };
        let err = fit_and_select(&t, &t, &req).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn single_model_uses_custom_name() {
        let t: Vec<f64> = (1..30).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|t| t.powf(0.5)).collect();
        let search = SearchOptions::default();
        let req = SelectionRequest {
            spec: ModelSpec::PowerLaw,
            search: &search,
            rtimes: None,
            iguess: None,
            evp_constant: None,
            name: Some("PL fit"),
        };
        let sel = fit_and_select(&t, &y, &req).unwrap();
        assert_eq!(sel.best.model.name, "PL fit");
        assert_eq!(sel.fits.len(), 1);
    }
}
