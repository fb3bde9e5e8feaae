//! Core data types for the reserve-market system.

use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// UTC instant.
pub type Timestamp = DateTime<Utc>;

/// Spacing of the needs signal in seconds.
pub const NEEDS_INTERVAL_SECS: i64 = 4;

/// Length of a call settlement window in minutes.
pub const WINDOW_MINUTES: i64 = 15;

/// Number of one-minute slots in a settlement window.
pub const MINUTES_PER_WINDOW: usize = 15;

/// Truncate a timestamp to its 15-minute window boundary.
#[inline]
pub fn floor_to_window(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(Duration::minutes(WINDOW_MINUTES)).unwrap_or(ts)
}

/// Whether a timestamp sits exactly on the 15-minute grid.
#[inline]
pub fn is_window_aligned(ts: Timestamp) -> bool {
    floor_to_window(ts) == ts
}

/// Dispatch direction of operating reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Positive reserve (grid short, generation up).
    Pos,
    /// Negative reserve (grid long, generation down).
    Neg,
}

impl Direction {
    /// Source code as used in auction product names.
    pub fn code(self) -> &'static str {
        match self {
            Direction::Pos => "POS",
            Direction::Neg => "NEG",
        }
    }

    /// Sign of a call in this direction.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Pos => 1.0,
            Direction::Neg => -1.0,
        }
    }

    /// Direction matching the sign of a net call volume, if nonzero.
    pub fn from_volume(volume_mw: f64) -> Option<Self> {
        if volume_mw > 0.0 {
            Some(Direction::Pos)
        } else if volume_mw < 0.0 {
            Some(Direction::Neg)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Tariff period of an auction product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TariffPeriod {
    /// Peak ("Hochtarif").
    Ht,
    /// Off-peak ("Niedertarif").
    Nt,
}

impl TariffPeriod {
    pub fn code(self) -> &'static str {
        match self {
            TariffPeriod::Ht => "HT",
            TariffPeriod::Nt => "NT",
        }
    }
}

impl fmt::Display for TariffPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parse an auction product code such as `POS_HT` or `NEG_NT`.
pub fn parse_product(code: &str) -> Option<(Direction, TariffPeriod)> {
    let (dir, tariff) = code.trim().split_once('_')?;
    let direction = match dir.to_ascii_uppercase().as_str() {
        "POS" => Direction::Pos,
        "NEG" => Direction::Neg,
        _ => return None,
    };
    let tariff = match tariff.to_ascii_uppercase().as_str() {
        "HT" => TariffPeriod::Ht,
        "NT" => TariffPeriod::Nt,
        _ => return None,
    };
    Some((direction, tariff))
}

/// Reserve quality traded on the portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReserveType {
    /// Secondary control reserve (aFRR).
    Srl,
    /// Minute reserve (mFRR).
    Mrl,
}

impl ReserveType {
    /// Source code used in portal queries and file names.
    pub fn code(self) -> &'static str {
        match self {
            ReserveType::Srl => "SRL",
            ReserveType::Mrl => "MRL",
        }
    }
}

impl fmt::Display for ReserveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReserveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SRL" | "AFRR" => Ok(ReserveType::Srl),
            "MRL" | "MFRR" => Ok(ReserveType::Mrl),
            other => Err(Error::config(format!("unknown reserve type: {other}"))),
        }
    }
}

/// Decimal notation of a source's numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberLocale {
    /// `1.234,5` style.
    DecimalComma,
    /// `1,234.5` style.
    DecimalPoint,
}

/// One 4-second sample of the reserve needs signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedsSample {
    /// Sample instant (UTC).
    pub ts: Timestamp,
    /// Signed power deviation (MW).
    pub value_mw: f64,
}

/// One 15-minute call settlement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallWindow {
    /// Window start (UTC, 15-minute grid).
    pub start: Timestamp,
    /// Negative-direction call magnitude (MW).
    pub neg_mw: f64,
    /// Positive-direction call magnitude (MW).
    pub pos_mw: f64,
}

impl CallWindow {
    /// Call magnitude in one direction.
    #[inline]
    pub fn volume_mw(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Pos => self.pos_mw,
            Direction::Neg => self.neg_mw,
        }
    }

    /// Net signed call volume.
    #[inline]
    pub fn net_mw(&self) -> f64 {
        self.pos_mw - self.neg_mw
    }
}

/// One bid of a weekly reserve auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionBid {
    /// First delivery day (Monday).
    pub week_start: NaiveDate,
    /// Last delivery day (Sunday).
    pub week_end: NaiveDate,
    pub direction: Direction,
    pub tariff: TariffPeriod,
    /// Capacity price (EUR/MW).
    pub power_price: f64,
    /// Energy price (EUR/MWh).
    pub work_price: f64,
    /// Offered capacity (MW), strictly positive.
    pub offered_mw: f64,
}

/// A call window paired with the needs observed inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedWindow {
    /// Window start (UTC).
    pub start: Timestamp,
    /// Mean of all needs samples in `[start, start + 15min)`.
    pub needs_mean: f64,
    /// Per-minute needs means; empty minutes hold the window mean.
    pub minute_needs: [f64; MINUTES_PER_WINDOW],
    /// Number of needs samples in the window.
    pub sample_count: usize,
    pub neg_mw: f64,
    pub pos_mw: f64,
}

impl AlignedWindow {
    /// Original call window fields.
    pub fn call(&self) -> CallWindow {
        CallWindow {
            start: self.start,
            neg_mw: self.neg_mw,
            pos_mw: self.pos_mw,
        }
    }
}

/// Approximated call volume of one minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApproxMinuteCall {
    /// Minute start (UTC).
    pub minute: Timestamp,
    /// Positive-direction share.
    pub pos_mw: f64,
    /// Negative-direction share (magnitude).
    pub neg_mw: f64,
    /// Net signed volume, `pos_mw - neg_mw`.
    pub volume_mw: f64,
}

/// A minute with its approximated call and marginal work price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalPricedMinute {
    pub minute: Timestamp,
    /// Net signed call volume.
    pub volume_mw: f64,
    /// Dispatch direction, `None` when nothing was called.
    pub direction: Option<Direction>,
    pub tariff: Option<TariffPeriod>,
    /// Work price of the marginal bid, `None` when nothing was called.
    pub marginal_work_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_floor_to_window() {
        let ts = Utc.with_ymd_and_hms(2019, 5, 6, 10, 29, 56).unwrap();
        assert_eq!(floor_to_window(ts), Utc.with_ymd_and_hms(2019, 5, 6, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_window_alignment() {
        assert!(is_window_aligned(Utc.with_ymd_and_hms(2019, 5, 6, 10, 45, 0).unwrap()));
        assert!(!is_window_aligned(Utc.with_ymd_and_hms(2019, 5, 6, 10, 46, 0).unwrap()));
        assert!(!is_window_aligned(Utc.with_ymd_and_hms(2019, 5, 6, 10, 45, 4).unwrap()));
    }

    #[test]
    fn test_parse_product() {
        assert_eq!(parse_product("POS_HT"), Some((Direction::Pos, TariffPeriod::Ht)));
        assert_eq!(parse_product(" neg_nt "), Some((Direction::Neg, TariffPeriod::Nt)));
        assert_eq!(parse_product("POS"), None);
        assert_eq!(parse_product("UP_HT"), None);
    }

    #[test]
    fn test_direction_from_volume() {
        assert_eq!(Direction::from_volume(3.0), Some(Direction::Pos));
        assert_eq!(Direction::from_volume(-0.5), Some(Direction::Neg));
        assert_eq!(Direction::from_volume(0.0), None);
    }

    #[test]
    fn test_reserve_type_from_str() {
        assert_eq!("srl".parse::<ReserveType>().unwrap(), ReserveType::Srl);
        assert_eq!("mFRR".parse::<ReserveType>().unwrap(), ReserveType::Mrl);
        assert!("PRL".parse::<ReserveType>().is_err());
    }

    #[test]
    fn test_call_window_net() {
        let window = CallWindow {
            start: Utc.with_ymd_and_hms(2019, 5, 6, 0, 0, 0).unwrap(),
            neg_mw: 40.0,
            pos_mw: 10.0,
        };
        assert_eq!(window.net_mw(), -30.0);
        assert_eq!(window.volume_mw(Direction::Neg), 40.0);
    }
}
