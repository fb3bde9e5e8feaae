//! Date ranges and the single-offset local-time rule.
//!
//! The portals publish local wall-clock times. A requested range is converted
//! with one fixed UTC offset, so ranges crossing a DST transition or a year
//! boundary are rejected up front instead of producing shifted timestamps.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Timestamp;

/// Resolve an IANA time zone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::config(format!("unknown time zone: {name}")))
}

/// Validated inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting reversed and multi-year spans.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::validation(format!(
                "end date {end} is before start date {start}"
            )));
        }
        if start.year() != end.year() {
            return Err(Error::validation(format!(
                "range {start}..={end} spans more than one calendar year"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Derive the fixed local-time rule for this range.
    ///
    /// Fails when the zone's offset changes anywhere between the first and
    /// the last local instant of the range.
    pub fn local_rule(&self, tz: Tz) -> Result<LocalTimeRule> {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let expected = offset_at(tz, self.start.and_time(NaiveTime::MIN))?;
        for day in self.start.iter_days().take_while(|d| *d <= self.end) {
            for local in [day.and_time(NaiveTime::MIN), day.and_time(last_second)] {
                let offset = offset_at(tz, local)?;
                if offset != expected {
                    return Err(Error::validation(format!(
                        "range {}..={} crosses a DST transition in {} on {day} ({expected} -> {offset})",
                        self.start,
                        self.end,
                        tz.name(),
                    )));
                }
            }
        }
        Ok(LocalTimeRule::fixed(expected))
    }
}

fn offset_at(tz: Tz, local: NaiveDateTime) -> Result<FixedOffset> {
    tz.offset_from_local_datetime(&local)
        .earliest()
        .map(|offset| offset.fix())
        .ok_or_else(|| Error::validation(format!("local time {local} does not exist in {}", tz.name())))
}

/// Single fixed UTC offset applied to every local timestamp of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeRule {
    offset: FixedOffset,
}

impl LocalTimeRule {
    pub fn fixed(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Convert a local wall-clock time to UTC.
    pub fn to_utc(&self, local: NaiveDateTime) -> Timestamp {
        local.and_utc() - Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    /// Convert a UTC instant back to local wall-clock time.
    pub fn to_local(&self, ts: Timestamp) -> NaiveDateTime {
        ts.with_timezone(&self.offset).naive_local()
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sunday of the week containing `date`.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

/// Widen a range to whole auction weeks (Monday..=Sunday).
pub fn week_bounds(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    (week_start(start), week_end(end))
}

/// Mondays of all weeks touching `start..=end`.
pub fn weeks_in(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let (first, last) = week_bounds(start, end);
    let mut weeks = Vec::new();
    let mut monday = first;
    while monday <= last {
        weeks.push(monday);
        monday += Duration::days(7);
    }
    weeks
}
