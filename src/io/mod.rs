//! Input/output helpers.
//!
//! - datafile ingest + validation (`ingest`)
//! - residual exports (CSV) (`export`)
//! - fit record JSON read/write (`record`)

pub mod export;
pub mod ingest;
pub mod record;

pub use export::*;
pub use ingest::*;
pub use record::*;
