//! Tariff period (HT/NT) classification.
//!
//! HT covers working days between the configured hours; weekends and
//! national public holidays are NT all day.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use std::collections::BTreeSet;

use crate::config::TariffConfig;
use crate::types::TariffPeriod;

/// Calendar deciding the tariff period of a local time.
#[derive(Debug, Clone)]
pub struct TariffCalendar {
    ht_start_hour: u32,
    ht_end_hour: u32,
    weekdays_only: bool,
    national_holidays: bool,
    extra_holidays: BTreeSet<NaiveDate>,
}

impl TariffCalendar {
    pub fn new(config: &TariffConfig) -> Self {
        Self {
            ht_start_hour: config.ht_start_hour,
            ht_end_hour: config.ht_end_hour,
            weekdays_only: config.ht_weekdays_only,
            national_holidays: config.national_holidays,
            extra_holidays: config.extra_holidays.iter().copied().collect(),
        }
    }

    /// Tariff period of a local wall-clock time.
    pub fn period(&self, local: NaiveDateTime) -> TariffPeriod {
        let date = local.date();
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        if (self.weekdays_only && weekend) || self.is_holiday(date) {
            return TariffPeriod::Nt;
        }
        let hour = local.hour();
        if hour >= self.ht_start_hour && hour < self.ht_end_hour {
            TariffPeriod::Ht
        } else {
            TariffPeriod::Nt
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.extra_holidays.contains(&date)
            || (self.national_holidays && is_national_holiday(date))
    }
}

/// Easter Sunday of a Gregorian year (anonymous computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn is_national_holiday(date: NaiveDate) -> bool {
    match (date.month(), date.day()) {
        (1, 1) | (5, 1) | (10, 3) | (12, 25) | (12, 26) => true,
        // Movable feasts fall between late March and mid June
        (3..=6, _) => easter_sunday(date.year()).is_some_and(|easter| {
            matches!((date - easter).num_days(), -2 | 1 | 39 | 50)
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_easter_dates() {
        assert_eq!(easter_sunday(2018), Some(date(2018, 4, 1)));
        assert_eq!(easter_sunday(2019), Some(date(2019, 4, 21)));
        assert_eq!(easter_sunday(2024), Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_national_holidays_2019() {
        let calendar = TariffCalendar::new(&TariffConfig::default());
        let days: Vec<NaiveDate> = date(2019, 1, 1)
            .iter_days()
            .take_while(|d| d.year() == 2019)
            .filter(|d| calendar.is_holiday(*d))
            .collect();
        assert_eq!(days.len(), 9);
        assert!(days.contains(&date(2019, 4, 19))); // Good Friday
        assert!(days.contains(&date(2019, 5, 30))); // Ascension
        assert!(days.contains(&date(2019, 6, 10))); // Whit Monday
    }

    #[test]
    fn test_weekday_ht_window() {
        let calendar = TariffCalendar::new(&TariffConfig::default());
        // 2019-05-08 is a Wednesday
        assert_eq!(calendar.period(at(2019, 5, 8, 7, 59)), TariffPeriod::Nt);
        assert_eq!(calendar.period(at(2019, 5, 8, 8, 0)), TariffPeriod::Ht);
        assert_eq!(calendar.period(at(2019, 5, 8, 19, 59)), TariffPeriod::Ht);
        assert_eq!(calendar.period(at(2019, 5, 8, 20, 0)), TariffPeriod::Nt);
    }

    #[test]
    fn test_weekend_and_holiday_are_nt() {
        let calendar = TariffCalendar::new(&TariffConfig::default());
        assert_eq!(calendar.period(at(2019, 5, 11, 12, 0)), TariffPeriod::Nt); // Saturday
        assert_eq!(calendar.period(at(2019, 5, 1, 12, 0)), TariffPeriod::Nt); // Labour Day
        assert_eq!(calendar.period(at(2019, 4, 22, 12, 0)), TariffPeriod::Nt); // Easter Monday
    }

    #[test]
    fn test_extra_holidays() {
        let mut config = TariffConfig::default();
        config.extra_holidays.push(date(2019, 10, 31));
        let calendar = TariffCalendar::new(&config);
        assert_eq!(calendar.period(at(2019, 10, 31, 12, 0)), TariffPeriod::Nt);
        assert!(!calendar.is_holiday(date(2019, 10, 30)));
    }
}
