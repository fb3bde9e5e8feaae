//! Source-native rows and the raw fetcher interface.
//!
//! Rows keep every field as the text the portal delivered; conversion to
//! canonical records happens in [`crate::preprocess`].

use chrono::NaiveDate;
use reserve_core::{ReserveType, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashMap;

/// One 4-second needs row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNeedsRow {
    #[serde(alias = "Datum")]
    pub date: String,
    #[serde(alias = "Uhrzeit")]
    pub time: String,
    #[serde(alias = "Wert")]
    pub value: String,
}

/// One 15-minute call row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCallRow {
    #[serde(alias = "Datum")]
    pub date: String,
    #[serde(alias = "von")]
    pub time_from: String,
    #[serde(alias = "NEG")]
    pub neg: String,
    #[serde(alias = "POS")]
    pub pos: String,
}

/// One auction result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAuctionRow {
    #[serde(alias = "DATE_FROM")]
    pub date_from: String,
    #[serde(alias = "DATE_TO")]
    pub date_to: String,
    #[serde(alias = "PRODUCT")]
    pub product: String,
    #[serde(alias = "POWER_PRICE")]
    pub power_price: String,
    #[serde(alias = "ENERGY_PRICE")]
    pub work_price: String,
    #[serde(alias = "OFFERED_CAPACITY")]
    pub offered_mw: String,
}

/// Retrieves raw tables for a date range.
///
/// Dates are inclusive calendar days. `fetch_auctions` is called with
/// Monday/Sunday bounds of a single auction week.
pub trait RawSource {
    fn fetch_needs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawNeedsRow>>;

    fn fetch_calls(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawCallRow>>;

    fn fetch_auctions(
        &self,
        week_start: NaiveDate,
        week_end: NaiveDate,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawAuctionRow>>;
}

/// Lenient date recognition used for range filtering only.
pub(crate) fn row_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// Keep rows whose date falls in range; unrecognized dates pass through so
/// the preprocessor can report them.
pub(crate) fn in_range(raw: &str, start: NaiveDate, end: NaiveDate) -> bool {
    row_date(raw).map_or(true, |d| start <= d && d <= end)
}

/// Keep auction rows whose delivery period overlaps the queried week.
pub(crate) fn overlaps_week(row: &RawAuctionRow, week_start: NaiveDate, week_end: NaiveDate) -> bool {
    match (row_date(&row.date_from), row_date(&row.date_to)) {
        (Some(from), Some(to)) => from <= week_end && to >= week_start,
        _ => true,
    }
}

/// In-memory source over pre-loaded rows.
#[derive(Debug, Default)]
pub struct MemorySource {
    needs: Vec<RawNeedsRow>,
    calls: HashMap<(String, ReserveType), Vec<RawCallRow>>,
    auctions: HashMap<ReserveType, Vec<RawAuctionRow>>,
    auction_fetches: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_needs(mut self, rows: Vec<RawNeedsRow>) -> Self {
        self.needs = rows;
        self
    }

    pub fn with_calls(mut self, source_id: &str, reserve_type: ReserveType, rows: Vec<RawCallRow>) -> Self {
        self.calls.insert((source_id.to_ascii_lowercase(), reserve_type), rows);
        self
    }

    pub fn with_auctions(mut self, reserve_type: ReserveType, rows: Vec<RawAuctionRow>) -> Self {
        self.auctions.insert(reserve_type, rows);
        self
    }

    /// Number of `fetch_auctions` calls served so far.
    pub fn auction_fetches(&self) -> usize {
        self.auction_fetches.get()
    }
}

impl RawSource for MemorySource {
    fn fetch_needs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawNeedsRow>> {
        Ok(self
            .needs
            .iter()
            .filter(|r| in_range(&r.date, start, end))
            .cloned()
            .collect())
    }

    fn fetch_calls(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawCallRow>> {
        let key = (source_id.to_ascii_lowercase(), reserve_type);
        Ok(self
            .calls
            .get(&key)
            .map(|rows| {
                rows.iter()
                    .filter(|r| in_range(&r.date, start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_auctions(
        &self,
        week_start: NaiveDate,
        week_end: NaiveDate,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawAuctionRow>> {
        self.auction_fetches.set(self.auction_fetches.get() + 1);
        Ok(self
            .auctions
            .get(&reserve_type)
            .map(|rows| {
                rows.iter()
                    .filter(|r| overlaps_week(r, week_start, week_end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
