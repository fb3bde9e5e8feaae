//! Run summary over a priced minute table.

use reserve_core::{Direction, MarginalPricedMinute};
use serde::Serialize;

/// Minutes per hour, for MW-minute to MWh conversion.
const MINUTES_PER_HOUR: f64 = 60.0;

/// Aggregates of one dispatch direction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectionSummary {
    /// Minutes called in this direction.
    pub minutes: usize,
    /// Called energy (MWh).
    pub energy_mwh: f64,
    /// Lowest marginal work price (EUR/MWh).
    pub min_price: Option<f64>,
    /// Highest marginal work price (EUR/MWh).
    pub max_price: Option<f64>,
    /// Volume-weighted mean marginal price (EUR/MWh).
    pub mean_price: Option<f64>,
    /// Energy times marginal price (EUR).
    pub work_cost_eur: f64,
}

impl DirectionSummary {
    fn add(&mut self, volume_mw: f64, price: f64) {
        let energy = volume_mw.abs() / MINUTES_PER_HOUR;
        self.minutes += 1;
        self.energy_mwh += energy;
        self.work_cost_eur += energy * price;
        self.min_price = Some(self.min_price.map_or(price, |p| p.min(price)));
        self.max_price = Some(self.max_price.map_or(price, |p| p.max(price)));
    }

    fn finish(&mut self) {
        self.mean_price = (self.energy_mwh > 0.0).then(|| self.work_cost_eur / self.energy_mwh);
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Minutes in the table.
    pub minutes: usize,
    /// Minutes with a marginal price.
    pub priced_minutes: usize,
    pub pos: DirectionSummary,
    pub neg: DirectionSummary,
}

impl RunSummary {
    /// Summarize a priced table.
    pub fn from_minutes(minutes: &[MarginalPricedMinute]) -> Self {
        let mut summary = RunSummary {
            minutes: minutes.len(),
            ..RunSummary::default()
        };

        for minute in minutes {
            let (Some(direction), Some(price)) = (minute.direction, minute.marginal_work_price) else {
                continue;
            };
            summary.priced_minutes += 1;
            match direction {
                Direction::Pos => summary.pos.add(minute.volume_mw, price),
                Direction::Neg => summary.neg.add(minute.volume_mw, price),
            }
        }

        summary.pos.finish();
        summary.neg.finish();
        summary
    }

    /// Log the summary as structured fields.
    pub fn log(&self) {
        tracing::info!(
            minutes = self.minutes,
            priced_minutes = self.priced_minutes,
            "run summary"
        );
        for (direction, side) in [(Direction::Pos, &self.pos), (Direction::Neg, &self.neg)] {
            tracing::info!(
                %direction,
                minutes = side.minutes,
                energy_mwh = side.energy_mwh,
                min_price = ?side.min_price,
                max_price = ?side.max_price,
                mean_price = ?side.mean_price,
                work_cost_eur = side.work_cost_eur,
                "direction summary"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use reserve_core::TariffPeriod;

    fn make_minute(offset: i64, volume_mw: f64, price: Option<f64>) -> MarginalPricedMinute {
        MarginalPricedMinute {
            minute: Utc.with_ymd_and_hms(2019, 5, 8, 8, 0, 0).unwrap() + Duration::minutes(offset),
            volume_mw,
            direction: Direction::from_volume(volume_mw),
            tariff: Some(TariffPeriod::Ht),
            marginal_work_price: price,
        }
    }

    #[test]
    fn test_empty_table() {
        let summary = RunSummary::from_minutes(&[]);
        assert_eq!(summary.minutes, 0);
        assert_eq!(summary.pos.mean_price, None);
    }

    #[test]
    fn test_volume_weighted_mean() {
        let minutes = vec![
            make_minute(0, 60.0, Some(10.0)),
            make_minute(1, 180.0, Some(30.0)),
            make_minute(2, 0.0, None),
            make_minute(3, -120.0, Some(-5.0)),
        ];
        let summary = RunSummary::from_minutes(&minutes);

        assert_eq!(summary.minutes, 4);
        assert_eq!(summary.priced_minutes, 3);
        assert_eq!(summary.pos.minutes, 2);
        assert_relative_eq!(summary.pos.energy_mwh, 4.0);
        // (1 MWh * 10 + 3 MWh * 30) / 4 MWh
        assert_relative_eq!(summary.pos.mean_price.unwrap(), 25.0);
        assert_eq!(summary.pos.min_price, Some(10.0));
        assert_eq!(summary.pos.max_price, Some(30.0));

        assert_relative_eq!(summary.neg.energy_mwh, 2.0);
        assert_relative_eq!(summary.neg.work_cost_eur, -10.0);
        assert_eq!(summary.neg.mean_price, Some(-5.0));
    }
}
