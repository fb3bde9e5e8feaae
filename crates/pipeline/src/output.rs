//! CSV output of the priced minute table.

use reserve_core::{MarginalPricedMinute, Result};
use serde::Serialize;
use std::io::Write;

/// One output line.
#[derive(Debug, Serialize)]
struct PricedMinuteRow {
    minute: String,
    volume_mw: f64,
    direction: Option<&'static str>,
    tariff: Option<&'static str>,
    marginal_work_price: Option<f64>,
}

impl From<&MarginalPricedMinute> for PricedMinuteRow {
    fn from(m: &MarginalPricedMinute) -> Self {
        Self {
            minute: m.minute.to_rfc3339(),
            volume_mw: m.volume_mw,
            direction: m.direction.map(|d| d.code()),
            tariff: m.tariff.map(|t| t.code()),
            marginal_work_price: m.marginal_work_price,
        }
    }
}

/// Write the table with a header line; unpriced minutes leave the price empty.
pub fn write_csv<W: Write>(minutes: &[MarginalPricedMinute], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for minute in minutes {
        csv.serialize(PricedMinuteRow::from(minute))?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reserve_core::{Direction, TariffPeriod};

    #[test]
    fn test_write_csv() {
        let minute = Utc.with_ymd_and_hms(2019, 5, 8, 8, 0, 0).unwrap();
        let minutes = vec![
            MarginalPricedMinute {
                minute,
                volume_mw: 7.0,
                direction: Some(Direction::Pos),
                tariff: Some(TariffPeriod::Ht),
                marginal_work_price: Some(20.0),
            },
            MarginalPricedMinute {
                minute,
                volume_mw: 0.0,
                direction: None,
                tariff: Some(TariffPeriod::Ht),
                marginal_work_price: None,
            },
        ];
        let mut buf = Vec::new();
        write_csv(&minutes, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "minute,volume_mw,direction,tariff,marginal_work_price");
        assert_eq!(lines[1], "2019-05-08T08:00:00+00:00,7.0,POS,HT,20.0");
        assert_eq!(lines[2], "2019-05-08T08:00:00+00:00,0.0,,HT,");
    }
}
