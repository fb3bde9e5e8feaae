//! Marginal work-price attribution from auction bid ladders.
//!
//! Bids of one (week, direction, tariff) group are dispatched in merit
//! order: ascending work price for positive reserve, descending for
//! negative reserve. Equal prices keep their original order. The marginal
//! price of a minute is the work price of the bid at which the cumulative
//! offered capacity first covers the called volume.

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use reserve_core::{
    ApproxMinuteCall, AuctionBid, Direction, Error, LocalTimeRule, MarginalPricedMinute, Result,
    TariffCalendar, TariffPeriod,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Capacity shortfall below this is treated as covered.
const CAPACITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct LadderStep {
    work_price: f64,
    cumulative_mw: f64,
}

/// Bids of one group in dispatch order.
#[derive(Debug, Clone)]
pub struct BidLadder {
    steps: Vec<LadderStep>,
}

impl BidLadder {
    /// Build a ladder from `(work_price, offered_mw)` pairs.
    pub fn new(direction: Direction, bids: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut bids: Vec<(f64, f64)> = bids.into_iter().collect();
        // sort_by_key is stable: equal prices keep list order
        match direction {
            Direction::Pos => bids.sort_by_key(|&(price, _)| OrderedFloat(price)),
            Direction::Neg => bids.sort_by_key(|&(price, _)| Reverse(OrderedFloat(price))),
        }
        let mut cumulative_mw = 0.0;
        let steps = bids
            .into_iter()
            .map(|(work_price, offered_mw)| {
                cumulative_mw += offered_mw;
                LadderStep {
                    work_price,
                    cumulative_mw,
                }
            })
            .collect();
        Self { steps }
    }

    /// Build a ladder from auction bids.
    pub fn from_bids<'a>(direction: Direction, bids: impl IntoIterator<Item = &'a AuctionBid>) -> Self {
        Self::new(direction, bids.into_iter().map(|b| (b.work_price, b.offered_mw)))
    }

    /// Work price of the bid that completes `volume_mw`, or `None` when the
    /// ladder cannot cover it.
    pub fn marginal_price(&self, volume_mw: f64) -> Option<f64> {
        let idx = self
            .steps
            .partition_point(|s| s.cumulative_mw + CAPACITY_EPSILON < volume_mw);
        self.steps.get(idx).map(|s| s.work_price)
    }

    /// Sum of all offered capacity.
    pub fn total_capacity(&self) -> f64 {
        self.steps.last().map_or(0.0, |s| s.cumulative_mw)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Ladder valid for one delivery week.
#[derive(Debug, Clone)]
struct WeekLadder {
    week_start: NaiveDate,
    week_end: NaiveDate,
    ladder: BidLadder,
}

/// Prices approximated minute calls against the auction results.
#[derive(Debug, Clone)]
pub struct MarginalPriceCalculator {
    ladders: HashMap<(Direction, TariffPeriod), Vec<WeekLadder>>,
    calendar: TariffCalendar,
    rule: LocalTimeRule,
    zero_volume_epsilon: f64,
}

impl MarginalPriceCalculator {
    /// Group bids by (direction, tariff, week) and build one ladder per group.
    pub fn new(bids: &[AuctionBid], calendar: TariffCalendar, rule: LocalTimeRule) -> Self {
        let mut groups: BTreeMap<(Direction, TariffPeriod, NaiveDate), (NaiveDate, Vec<&AuctionBid>)> =
            BTreeMap::new();
        for bid in bids {
            let entry = groups
                .entry((bid.direction, bid.tariff, bid.week_start))
                .or_insert_with(|| (bid.week_end, Vec::new()));
            entry.0 = entry.0.max(bid.week_end);
            entry.1.push(bid);
        }

        let mut ladders: HashMap<(Direction, TariffPeriod), Vec<WeekLadder>> = HashMap::new();
        // BTreeMap order keeps each group's weeks sorted by start
        for ((direction, tariff, week_start), (week_end, group)) in groups {
            ladders.entry((direction, tariff)).or_default().push(WeekLadder {
                week_start,
                week_end,
                ladder: BidLadder::from_bids(direction, group),
            });
        }

        Self {
            ladders,
            calendar,
            rule,
            zero_volume_epsilon: 1e-9,
        }
    }

    /// Volumes below this magnitude dispatch nothing.
    pub fn with_zero_volume_epsilon(mut self, epsilon: f64) -> Self {
        self.zero_volume_epsilon = epsilon;
        self
    }

    /// Ladder of the week containing `date`.
    pub fn ladder_for(&self, date: NaiveDate, direction: Direction, tariff: TariffPeriod) -> Option<&BidLadder> {
        let weeks = self.ladders.get(&(direction, tariff))?;
        let idx = weeks.partition_point(|w| w.week_start <= date);
        let week = weeks.get(idx.checked_sub(1)?)?;
        (date <= week.week_end).then_some(&week.ladder)
    }

    /// Price a single minute.
    pub fn price_minute(&self, call: &ApproxMinuteCall) -> Result<MarginalPricedMinute> {
        let local = self.rule.to_local(call.minute);
        let tariff = self.calendar.period(local);
        let volume = call.volume_mw;

        let direction = match Direction::from_volume(volume) {
            Some(direction) if volume.abs() >= self.zero_volume_epsilon => direction,
            _ => {
                return Ok(MarginalPricedMinute {
                    minute: call.minute,
                    volume_mw: volume,
                    direction: None,
                    tariff: Some(tariff),
                    marginal_work_price: None,
                })
            }
        };

        let required_mw = volume.abs();
        let shortfall = |available_mw: f64| Error::InsufficientCapacity {
            minute: call.minute,
            direction,
            tariff: Some(tariff),
            required_mw,
            available_mw,
        };
        let ladder = self
            .ladder_for(local.date(), direction, tariff)
            .ok_or_else(|| shortfall(0.0))?;
        let price = ladder
            .marginal_price(required_mw)
            .ok_or_else(|| shortfall(ladder.total_capacity()))?;

        Ok(MarginalPricedMinute {
            minute: call.minute,
            volume_mw: volume,
            direction: Some(direction),
            tariff: Some(tariff),
            marginal_work_price: Some(price),
        })
    }

    /// Price every minute, failing on the first one that cannot be covered.
    pub fn price_all(&self, calls: &[ApproxMinuteCall]) -> Result<Vec<MarginalPricedMinute>> {
        calls.iter().map(|call| self.price_minute(call)).collect()
    }
}
