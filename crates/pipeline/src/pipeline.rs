//! Pipeline entry points.
//!
//! Every call recomputes from freshly fetched rows; nothing is cached
//! between calls. The first error aborts the call.

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use reserve_analytics::{CallApproximator, MarginalPriceCalculator, NeedsAggregator};
use reserve_core::time::{parse_timezone, weeks_in};
use reserve_core::{
    ApproxMinuteCall, AuctionBid, CallWindow, DateRange, EventSink, LocalTimeRule,
    MarginalPricedMinute, NeedsSample, NullSink, PipelineConfig, PipelineEvent, ReserveType, Result,
    Table, TariffCalendar, Timestamp, TracingSink,
};
use reserve_ingestion::{Preprocessor, RawSource};

/// Reserve-market pipeline over a raw source.
pub struct ReservePipeline<S> {
    source: S,
    config: PipelineConfig,
    tz: Tz,
    sink: Box<dyn EventSink>,
}

impl<S: RawSource> ReservePipeline<S> {
    /// Create a pipeline that logs through `tracing`.
    pub fn new(source: S, config: PipelineConfig) -> Result<Self> {
        Self::with_sink(source, config, Box::new(TracingSink))
    }

    /// Create a pipeline with an explicit event sink.
    ///
    /// The sink is replaced by [`NullSink`] when logging is disabled in the
    /// configuration.
    pub fn with_sink(source: S, config: PipelineConfig, sink: Box<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        let tz = parse_timezone(&config.time.timezone)?;
        let sink = if config.logging.enabled {
            sink
        } else {
            Box::new(NullSink)
        };
        Ok(Self {
            source,
            config,
            tz,
            sink,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 4-second needs for `start..=end`.
    pub fn get_reserve_needs(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NeedsSample>> {
        let preprocessor = self.prepare(start, end)?;
        self.fetch_needs(&preprocessor, start, end)
    }

    /// 15-minute calls of one operator and reserve type for `start..=end`.
    pub fn get_reserve_calls(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<CallWindow>> {
        let preprocessor = self.prepare(start, end)?;
        self.fetch_calls(&preprocessor, start, end, source_id, reserve_type)
    }

    /// Auction bids of every week touching `start..=end`.
    pub fn get_reserve_auctions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        reserve_type: ReserveType,
    ) -> Result<Vec<AuctionBid>> {
        let preprocessor = self.prepare(start, end)?;
        self.fetch_auctions(&preprocessor, start, end, reserve_type)
    }

    /// Approximated 1-minute calls from needs and calls.
    pub fn get_one_minute_calls(
        &self,
        needs: &[NeedsSample],
        calls: &[CallWindow],
    ) -> Result<Vec<ApproxMinuteCall>> {
        let mut aggregator = NeedsAggregator::new();
        let windows = aggregator.aggregate(needs, calls)?;
        let stats = aggregator.stats();
        self.sink.emit(&PipelineEvent::WindowsAligned {
            windows: stats.windows,
            ignored_samples: stats.ignored_samples,
            backfilled_minutes: stats.backfilled_minutes,
        });

        let mut approximator = CallApproximator::new(&self.config.approximation);
        let minutes = approximator.approximate(&windows)?;
        self.sink.emit(&PipelineEvent::MinutesApproximated {
            minutes: minutes.len(),
            max_residual_mw: approximator.stats().max_residual_mw,
        });
        Ok(minutes)
    }

    /// Marginal work price of every approximated minute.
    pub fn get_marginal_work_prices(
        &self,
        needs: &[NeedsSample],
        calls: &[CallWindow],
        auctions: &[AuctionBid],
    ) -> Result<Vec<MarginalPricedMinute>> {
        let minutes = self.get_one_minute_calls(needs, calls)?;
        let (Some(first), Some(last)) = (minutes.first(), minutes.last()) else {
            self.sink.emit(&PipelineEvent::MinutesPriced {
                minutes: 0,
                unpriced: 0,
            });
            return Ok(Vec::new());
        };

        let rule = self.rule_between(first.minute, last.minute)?;
        let calculator =
            MarginalPriceCalculator::new(auctions, TariffCalendar::new(&self.config.tariff), rule)
                .with_zero_volume_epsilon(self.config.approximation.zero_sum_epsilon);
        let priced = calculator.price_all(&minutes)?;
        self.sink.emit(&PipelineEvent::MinutesPriced {
            minutes: priced.len(),
            unpriced: priced.iter().filter(|m| m.marginal_work_price.is_none()).count(),
        });
        Ok(priced)
    }

    /// Fetch everything for `start..=end` and price every minute.
    pub fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<MarginalPricedMinute>> {
        let preprocessor = self.prepare(start, end)?;
        let needs = self.fetch_needs(&preprocessor, start, end)?;
        let calls = self.fetch_calls(&preprocessor, start, end, source_id, reserve_type)?;
        let auctions = self.fetch_auctions(&preprocessor, start, end, reserve_type)?;

        let priced = self.get_marginal_work_prices(&needs, &calls, &auctions)?;
        self.sink.emit(&PipelineEvent::RunFinished {
            minutes: priced.len(),
            priced: priced.iter().filter(|m| m.marginal_work_price.is_some()).count(),
        });
        Ok(priced)
    }

    /// Validate the range and build the preprocessor for it.
    fn prepare(&self, start: NaiveDate, end: NaiveDate) -> Result<Preprocessor> {
        let range = DateRange::new(start, end)?;
        let rule = range.local_rule(self.tz)?;
        self.sink.emit(&PipelineEvent::RangeValidated {
            start,
            end,
            utc_offset_secs: rule.offset().local_minus_utc(),
        });
        Ok(Preprocessor::new(rule, self.config.numbers))
    }

    /// Local-time rule covering the local dates of two instants.
    fn rule_between(&self, first: Timestamp, last: Timestamp) -> Result<LocalTimeRule> {
        let start = first.with_timezone(&self.tz).date_naive();
        let end = last.with_timezone(&self.tz).date_naive();
        DateRange::new(start, end)?.local_rule(self.tz)
    }

    fn fetch_needs(&self, preprocessor: &Preprocessor, start: NaiveDate, end: NaiveDate) -> Result<Vec<NeedsSample>> {
        let rows = self.source.fetch_needs(start, end)?;
        self.sink.emit(&PipelineEvent::RowsFetched {
            table: Table::Needs,
            rows: rows.len(),
        });
        let needs = preprocessor.needs(&rows)?;
        self.sink.emit(&PipelineEvent::RowsParsed {
            table: Table::Needs,
            rows: needs.len(),
        });
        Ok(needs)
    }

    fn fetch_calls(
        &self,
        preprocessor: &Preprocessor,
        start: NaiveDate,
        end: NaiveDate,
        source_id: &str,
        reserve_type: ReserveType,
    ) -> Result<Vec<CallWindow>> {
        let rows = self.source.fetch_calls(start, end, source_id, reserve_type)?;
        self.sink.emit(&PipelineEvent::RowsFetched {
            table: Table::Calls,
            rows: rows.len(),
        });
        let calls = preprocessor.calls(&rows)?;
        self.sink.emit(&PipelineEvent::RowsParsed {
            table: Table::Calls,
            rows: calls.len(),
        });
        Ok(calls)
    }

    /// One fetch per auction week, deduplicated across weeks.
    fn fetch_auctions(
        &self,
        preprocessor: &Preprocessor,
        start: NaiveDate,
        end: NaiveDate,
        reserve_type: ReserveType,
    ) -> Result<Vec<AuctionBid>> {
        let chunks = weeks_in(start, end)
            .into_iter()
            .map(|monday| self.source.fetch_auctions(monday, monday + Duration::days(6), reserve_type))
            .collect::<Result<Vec<_>>>()?;
        self.sink.emit(&PipelineEvent::RowsFetched {
            table: Table::Auctions,
            rows: chunks.iter().map(Vec::len).sum(),
        });

        let table = preprocessor.auctions(&chunks)?;
        if table.duplicates_dropped > 0 {
            self.sink.emit(&PipelineEvent::DuplicatesDropped {
                table: Table::Auctions,
                dropped: table.duplicates_dropped,
            });
        }
        self.sink.emit(&PipelineEvent::RowsParsed {
            table: Table::Auctions,
            rows: table.bids.len(),
        });
        Ok(table.bids)
    }
}
