//! Creep curve fitting.
//!
//! Responsibilities:
//!
//! - convert indentation depth into the fitted quantity and back
//! - generate starting grids (exponent / retardation times)
//! - grid search + OLS, then Levenberg-Marquardt refinement (parallel grid)
//! - goodness of fit, EVP compliances and BIC model selection

pub mod evp;
pub mod fitter;
pub mod grid;
pub mod selection;
pub mod transform;

pub use evp::*;
pub use fitter::*;
pub use grid::*;
pub use selection::*;
pub use transform::*;
