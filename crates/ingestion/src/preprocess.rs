//! Conversion of raw rows into canonical time-indexed tables.

use chrono::{NaiveDate, NaiveTime};
use ordered_float::OrderedFloat;
use reserve_core::config::NumberConfig;
use reserve_core::{
    parse_product, AuctionBid, CallWindow, Direction, Error, LocalTimeRule, NeedsSample,
    NumberLocale, Result, TariffPeriod,
};
use std::collections::HashSet;

use crate::raw::{RawAuctionRow, RawCallRow, RawNeedsRow};

/// Parse a locale-formatted decimal number.
///
/// Returns the failure reason on error so callers can attach row context.
pub fn parse_decimal(raw: &str, locale: NumberLocale) -> std::result::Result<f64, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty value".to_string());
    }
    let (thousands, decimal) = match locale {
        NumberLocale::DecimalComma => ('.', ','),
        NumberLocale::DecimalPoint => (',', '.'),
    };
    let normalized: String = s
        .chars()
        .filter(|&c| c != thousands && c != ' ' && c != '\u{a0}')
        .map(|c| if c == decimal { '.' } else { c })
        .collect();
    let value: f64 = normalized
        .parse()
        .map_err(|_| format!("not a {locale:?} number"))?;
    if !value.is_finite() {
        return Err("not a finite number".to_string());
    }
    Ok(value)
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| "expected dd.mm.yyyy or yyyy-mm-dd".to_string())
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| "expected HH:MM[:SS]".to_string())
}

/// Auction bids after deduplication.
#[derive(Debug, Clone, Default)]
pub struct AuctionTable {
    pub bids: Vec<AuctionBid>,
    /// Rows dropped because an earlier chunk already delivered their key.
    pub duplicates_dropped: usize,
}

/// Converts raw rows using one local-time rule and per-table number formats.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    rule: LocalTimeRule,
    numbers: NumberConfig,
}

impl Preprocessor {
    pub fn new(rule: LocalTimeRule, numbers: NumberConfig) -> Self {
        Self { rule, numbers }
    }

    /// Needs rows to chronologically sorted samples.
    pub fn needs(&self, rows: &[RawNeedsRow]) -> Result<Vec<NeedsSample>> {
        const TABLE: &str = "needs";
        let mut samples = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let date = parse_date(&row.date).map_err(|e| Error::parse(TABLE, i, "date", &row.date, e))?;
            let time = parse_time(&row.time).map_err(|e| Error::parse(TABLE, i, "time", &row.time, e))?;
            let value_mw = parse_decimal(&row.value, self.numbers.needs)
                .map_err(|e| Error::parse(TABLE, i, "value", &row.value, e))?;
            samples.push(NeedsSample {
                ts: self.rule.to_utc(date.and_time(time)),
                value_mw,
            });
        }
        samples.sort_by_key(|s| s.ts);
        Ok(samples)
    }

    /// Call rows to chronologically sorted windows.
    ///
    /// Negative-direction values are stored as magnitudes.
    pub fn calls(&self, rows: &[RawCallRow]) -> Result<Vec<CallWindow>> {
        const TABLE: &str = "calls";
        let locale = self.numbers.calls;
        let mut windows = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let date = parse_date(&row.date).map_err(|e| Error::parse(TABLE, i, "date", &row.date, e))?;
            let time = parse_time(&row.time_from)
                .map_err(|e| Error::parse(TABLE, i, "time_from", &row.time_from, e))?;
            let neg = parse_decimal(&row.neg, locale).map_err(|e| Error::parse(TABLE, i, "neg", &row.neg, e))?;
            let pos = parse_decimal(&row.pos, locale).map_err(|e| Error::parse(TABLE, i, "pos", &row.pos, e))?;
            if pos < 0.0 {
                return Err(Error::parse(TABLE, i, "pos", &row.pos, "positive call must not be negative"));
            }
            windows.push(CallWindow {
                start: self.rule.to_utc(date.and_time(time)),
                neg_mw: neg.abs(),
                pos_mw: pos,
            });
        }
        windows.sort_by_key(|w| w.start);
        Ok(windows)
    }

    /// Auction rows, one chunk per fetch, to bids.
    ///
    /// A row is dropped when an earlier chunk already produced its
    /// (week start, direction, tariff, work price) key. Rows within one
    /// chunk are all kept so equal-priced bids survive.
    pub fn auctions(&self, chunks: &[Vec<RawAuctionRow>]) -> Result<AuctionTable> {
        const TABLE: &str = "auctions";
        let locale = self.numbers.auctions;
        let mut seen: HashSet<(NaiveDate, Direction, TariffPeriod, OrderedFloat<f64>)> = HashSet::new();
        let mut table = AuctionTable::default();
        let mut index = 0;

        for chunk in chunks {
            let mut chunk_keys = Vec::with_capacity(chunk.len());
            for row in chunk {
                let i = index;
                index += 1;
                let week_start = parse_date(&row.date_from)
                    .map_err(|e| Error::parse(TABLE, i, "date_from", &row.date_from, e))?;
                let week_end = parse_date(&row.date_to)
                    .map_err(|e| Error::parse(TABLE, i, "date_to", &row.date_to, e))?;
                if week_end < week_start {
                    return Err(Error::parse(TABLE, i, "date_to", &row.date_to, "delivery ends before it starts"));
                }
                let (direction, tariff) = parse_product(&row.product)
                    .ok_or_else(|| Error::parse(TABLE, i, "product", &row.product, "expected POS|NEG_HT|NT"))?;
                let power_price = parse_decimal(&row.power_price, locale)
                    .map_err(|e| Error::parse(TABLE, i, "power_price", &row.power_price, e))?;
                let work_price = parse_decimal(&row.work_price, locale)
                    .map_err(|e| Error::parse(TABLE, i, "work_price", &row.work_price, e))?;
                let offered_mw = parse_decimal(&row.offered_mw, locale)
                    .map_err(|e| Error::parse(TABLE, i, "offered_mw", &row.offered_mw, e))?;
                if offered_mw <= 0.0 {
                    return Err(Error::parse(TABLE, i, "offered_mw", &row.offered_mw, "capacity must be positive"));
                }

                let key = (week_start, direction, tariff, OrderedFloat(work_price));
                if seen.contains(&key) {
                    table.duplicates_dropped += 1;
                    continue;
                }
                chunk_keys.push(key);
                table.bids.push(AuctionBid {
                    week_start,
                    week_end,
                    direction,
                    tariff,
                    power_price,
                    work_price,
                    offered_mw,
                });
            }
            seen.extend(chunk_keys);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn cet() -> Preprocessor {
        Preprocessor::new(
            LocalTimeRule::fixed(FixedOffset::east_opt(3600).unwrap()),
            NumberConfig::default(),
        )
    }

    fn needs_row(date: &str, time: &str, value: &str) -> RawNeedsRow {
        RawNeedsRow {
            date: date.to_string(),
            time: time.to_string(),
            value: value.to_string(),
        }
    }

    fn call_row(time: &str, neg: &str, pos: &str) -> RawCallRow {
        RawCallRow {
            date: "07.01.2019".to_string(),
            time_from: time.to_string(),
            neg: neg.to_string(),
            pos: pos.to_string(),
        }
    }

    fn auction_row(from: &str, product: &str, work: &str, cap: &str) -> RawAuctionRow {
        RawAuctionRow {
            date_from: from.to_string(),
            date_to: "13.01.2019".to_string(),
            product: product.to_string(),
            power_price: "1.250,00".to_string(),
            work_price: work.to_string(),
            offered_mw: cap.to_string(),
        }
    }

    #[test]
    fn test_parse_decimal_comma() {
        assert_relative_eq!(parse_decimal("12,5", NumberLocale::DecimalComma).unwrap(), 12.5);
        assert_relative_eq!(parse_decimal("-1.234,75", NumberLocale::DecimalComma).unwrap(), -1234.75);
        assert_relative_eq!(parse_decimal(" 7 ", NumberLocale::DecimalComma).unwrap(), 7.0);
    }

    #[test]
    fn test_parse_decimal_point() {
        assert_relative_eq!(parse_decimal("1,234.75", NumberLocale::DecimalPoint).unwrap(), 1234.75);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("", NumberLocale::DecimalComma).is_err());
        assert!(parse_decimal("n/a", NumberLocale::DecimalComma).is_err());
        assert!(parse_decimal("NaN", NumberLocale::DecimalComma).is_err());
    }

    #[test]
    fn test_needs_timestamps_shifted_to_utc() {
        let samples = cet()
            .needs(&[
                needs_row("07.01.2019", "00:00:04", "-3,5"),
                needs_row("07.01.2019", "00:00:00", "10"),
            ])
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].ts, Utc.with_ymd_and_hms(2019, 1, 6, 23, 0, 0).unwrap());
        assert_relative_eq!(samples[0].value_mw, 10.0);
        assert_relative_eq!(samples[1].value_mw, -3.5);
    }

    #[test]
    fn test_needs_parse_error_has_row_context() {
        let err = cet()
            .needs(&[
                needs_row("07.01.2019", "00:00:00", "1"),
                needs_row("07.01.2019", "00:00:04", "x"),
            ])
            .unwrap_err();
        match err {
            Error::Parse { row, field, value, .. } => {
                assert_eq!(row, 1);
                assert_eq!(field, "value");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_calls_store_negative_as_magnitude() {
        let windows = cet()
            .calls(&[call_row("00:15", "-20,5", "0"), call_row("00:00", "0", "4,25")])
            .unwrap();
        assert_eq!(windows[0].start, Utc.with_ymd_and_hms(2019, 1, 6, 23, 0, 0).unwrap());
        assert_relative_eq!(windows[0].pos_mw, 4.25);
        assert_relative_eq!(windows[1].neg_mw, 20.5);
    }

    #[test]
    fn test_calls_bad_time() {
        let err = cet().calls(&[call_row("25:00", "0", "0")]).unwrap_err();
        assert!(matches!(err, Error::Parse { field: "time_from", .. }));
    }

    #[test]
    fn test_auctions_dedup_across_chunks_only() {
        let first = vec![
            auction_row("07.01.2019", "POS_HT", "50,0", "5"),
            auction_row("07.01.2019", "POS_HT", "50,0", "3"),
        ];
        let second = vec![
            auction_row("07.01.2019", "POS_HT", "50,0", "5"),
            auction_row("07.01.2019", "NEG_NT", "-10,0", "8"),
        ];
        let table = cet().auctions(&[first, second]).unwrap();
        assert_eq!(table.bids.len(), 3);
        assert_eq!(table.duplicates_dropped, 1);
        assert_eq!(table.bids[2].direction, Direction::Neg);
        assert_relative_eq!(table.bids[0].power_price, 1250.0);
    }

    #[test]
    fn test_auctions_reject_non_positive_capacity() {
        let err = cet()
            .auctions(&[vec![auction_row("07.01.2019", "POS_HT", "50", "0")]])
            .unwrap_err();
        assert!(matches!(err, Error::Parse { field: "offered_mw", .. }));
    }

    #[test]
    fn test_auctions_reject_unknown_product() {
        let err = cet()
            .auctions(&[vec![auction_row("07.01.2019", "POS", "50", "1")]])
            .unwrap_err();
        assert!(matches!(err, Error::Parse { field: "product", .. }));
    }
}
