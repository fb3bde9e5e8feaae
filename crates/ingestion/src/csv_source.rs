//! Raw source over CSV exports downloaded from the portals.
//!
//! Expected layout of the export directory:
//! - `needs.csv`
//! - `calls_<source_id>_<reserve type>.csv` (e.g. `calls_tennet_srl.csv`)
//! - `auctions_<reserve type>.csv` (e.g. `auctions_srl.csv`)

use chrono::NaiveDate;
use reserve_core::{Error, ReserveType, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::raw::{in_range, overlaps_week, RawAuctionRow, RawCallRow, RawNeedsRow, RawSource};

/// Source reading semicolon-separated portal exports from a directory.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: b';',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn read_rows<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file_name);
        if !path.is_file() {
            return Err(Error::source_error(format!("export not found: {}", path.display())));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(&path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            rows.push(record?);
        }
        tracing::debug!(path = %path.display(), rows = rows.len(), "export read");
        Ok(rows)
    }
}

impl RawSource for CsvSource {
    fn fetch_needs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawNeedsRow>> {
        let rows: Vec<RawNeedsRow> = self.read_rows("needs.csv")?;
        Ok(rows
            .into_iter()
            .filter(|r| in_range(&r.date, start, end))
            .collect())
    }

    fn fetch_calls(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawCallRow>> {
        let file_name = format!(
            "calls_{}_{}.csv",
            source_id.to_ascii_lowercase(),
            reserve_type.code().to_ascii_lowercase()
        );
        let rows: Vec<RawCallRow> = self.read_rows(&file_name)?;
        Ok(rows
            .into_iter()
            .filter(|r| in_range(&r.date, start, end))
            .collect())
    }

    fn fetch_auctions(
        &self,
        week_start: NaiveDate,
        week_end: NaiveDate,
        reserve_type: ReserveType,
    ) -> Result<Vec<RawAuctionRow>> {
        let file_name = format!("auctions_{}.csv", reserve_type.code().to_ascii_lowercase());
        let rows: Vec<RawAuctionRow> = self.read_rows(&file_name)?;
        Ok(rows
            .into_iter()
            .filter(|r| overlaps_week(r, week_start, week_end))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reads_german_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("calls_tennet_srl.csv"),
            "Datum;von;NEG;POS\n06.05.2019;00:00;12,5;0\n07.05.2019;00:00;0;3,25\n",
        )
        .unwrap();
        let source = CsvSource::new(dir.path());
        let rows = source
            .fetch_calls(date(2019, 5, 6), date(2019, 5, 6), "TenneT", ReserveType::Srl)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].neg, "12,5");
        assert_eq!(rows[0].time_from, "00:00");
    }

    #[test]
    fn test_reads_auction_export() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("auctions_srl.csv"),
            "DATE_FROM;DATE_TO;PRODUCT;POWER_PRICE;ENERGY_PRICE;OFFERED_CAPACITY\n\
             06.05.2019;12.05.2019;POS_HT;120,5;45,2;5\n\
             13.05.2019;19.05.2019;POS_HT;110,0;44,0;5\n",
        )
        .unwrap();
        let rows = CsvSource::new(dir.path())
            .fetch_auctions(date(2019, 5, 6), date(2019, 5, 12), ReserveType::Srl)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].work_price, "45,2");
    }

    #[test]
    fn test_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("needs.csv"),
            "date,time,value\n2019-05-06,00:00:00,-12.5\n2019-05-07,00:00:00,3\n",
        )
        .unwrap();
        let rows = CsvSource::new(dir.path())
            .with_delimiter(b',')
            .fetch_needs(date(2019, 5, 6), date(2019, 5, 6))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "-12.5");
    }

    #[test]
    fn test_missing_export_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvSource::new(dir.path())
            .fetch_needs(date(2019, 5, 6), date(2019, 5, 6))
            .unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }
}
