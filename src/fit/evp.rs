//! Final compliances of the elasto-visco-plastic models.
//!
//! The fitted EVP parameters `B0, Cv, D_i, tau_i` describe the holding segment
//! only. Compliances are recovered from them:
//!
//! ```text
//! tensile:      C_i = D_i                C0 = B0 - Σ D_i
//! indentation:  C_i = D_i / rho(tau_i)   C0 = B0 - Cv t_R / 2 - Σ C_i
//! ```
//!
//! where `t_R` is the loading ramp duration (the start of the read window) and
//! `rho` the ramp correction factor.

use crate::domain::{CreepModel, EvpCompliances, ExperimentKind};
use crate::math::ramp_correction;

/// Compliances of an EVP model; `None` for the empirical laws.
pub fn compliances(model: &CreepModel, experiment: ExperimentKind, t_ramp: f64) -> Option<EvpCompliances> {
    let k = model.kind.kv_count();
    if k == 0 {
        return None;
    }
    let b0 = model.params[0];
    let cv = model.params[1];
    let d = &model.params[2..2 + k];
    let taus = model.rtimes();

    let (c0, c) = if experiment.is_indentation() {
        let c: Vec<f64> = d
            .iter()
            .zip(&taus)
            .map(|(di, &tau)| di / ramp_correction(tau, t_ramp))
            .collect();
        (b0 - cv * t_ramp / 2.0 - c.iter().sum::<f64>(), c)
    } else {
        (b0 - d.iter().sum::<f64>(), d.to_vec())
    };

    Some(EvpCompliances { c0, cv, c, taus })
}
