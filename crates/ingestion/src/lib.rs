//! Data ingestion and normalization for the reserve-market system.
//!
//! This crate handles:
//! - Raw source rows and the `RawSource` collaborator interface
//! - In-memory and CSV-export sources
//! - Locale-aware numeric parsing and local timestamp construction
//! - Deduplication of overlapping week-boundary auction rows

pub mod csv_source;
pub mod preprocess;
pub mod raw;

pub use csv_source::CsvSource;
pub use preprocess::{parse_decimal, AuctionTable, Preprocessor};
pub use raw::{MemorySource, RawAuctionRow, RawCallRow, RawNeedsRow, RawSource};
