//! Mathematical utilities: model basis functions, linear least squares,
//! Levenberg-Marquardt refinement and goodness-of-fit statistics.

pub mod basis;
pub mod lm;
pub mod ols;
pub mod stats;

pub use basis::*;
pub use ols::*;
