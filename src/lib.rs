//! `mcreep` library crate.
//!
//! The binary (`mcreep`) is a thin wrapper around this library so that:
//!
//! - fitting and reporting are testable without spawning processes
//! - the same pipeline drives the batch CLI and the interactive TUI

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
