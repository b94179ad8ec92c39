//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - experiment description and derived constants (`Experiment`)
//! - datafile format (`DataParameters`) and time windows (`FitWindow`)
//! - model kinds and fitted models (`ModelKind`, `CreepModel`)
//! - run configuration and saved records (`FitConfig`, `FitRecord`)

pub mod types;

pub use types::*;
