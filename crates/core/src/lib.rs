//! Core types and configuration for the reserve-market system.
//!
//! This crate provides shared types used across all other crates:
//! - Canonical balancing-market tables (needs, calls, auction bids)
//! - Derived analytics records (aligned windows, minute calls, marginal prices)
//! - Local-time and tariff-period rules
//! - Configuration structures
//! - Common error types and the pipeline event sink

pub mod config;
pub mod error;
pub mod events;
pub mod tariff;
pub mod time;
pub mod types;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use events::{EventSink, NullSink, PipelineEvent, Table, TracingSink};
pub use tariff::TariffCalendar;
pub use time::{DateRange, LocalTimeRule};
pub use types::*;
