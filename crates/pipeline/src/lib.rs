//! End-to-end pipeline for the reserve-market system.
//!
//! This crate provides:
//! - The user-facing entry points over a raw source
//! - Date-range validation before any fetch
//! - Run summaries and CSV output of the priced table

pub mod output;
pub mod pipeline;
pub mod summary;

pub use output::write_csv;
pub use pipeline::ReservePipeline;
pub use summary::{DirectionSummary, RunSummary};
