//! PyO3 bindings for the reserve-market pipeline.
//!
//! Exposes to Python:
//! - Canonical records (needs, calls, auction bids, minute results)
//! - 1-minute call approximation and marginal work prices
//! - A pipeline over in-memory raw rows
//!
//! Instants cross the boundary as Unix milliseconds (UTC), dates as
//! `YYYY-MM-DD` strings.

use chrono::{DateTime, NaiveDate};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use reserve_core::{
    parse_product, ApproxMinuteCall as RustApproxMinuteCall, AuctionBid as RustAuctionBid,
    CallWindow as RustCallWindow, MarginalPricedMinute as RustMarginalPricedMinute,
    NeedsSample as RustNeedsSample, PipelineConfig, ReserveType, Timestamp,
};
use reserve_ingestion::{MemorySource, RawAuctionRow, RawCallRow, RawNeedsRow};
use reserve_pipeline::ReservePipeline;

fn to_py_err(err: reserve_core::Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn timestamp(ms: i64) -> PyResult<Timestamp> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PyValueError::new_err(format!("timestamp out of range: {ms}")))
}

fn date(raw: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| PyValueError::new_err(format!("expected YYYY-MM-DD, got {raw:?}")))
}

fn parse_reserve_type(raw: &str) -> PyResult<ReserveType> {
    raw.parse().map_err(to_py_err)
}

/// Parse an optional JSON configuration; absent fields take defaults.
fn config(json: Option<&str>) -> PyResult<PipelineConfig> {
    let config = match json {
        Some(text) => serde_json::from_str::<PipelineConfig>(text)
            .map_err(|e| PyValueError::new_err(format!("invalid config: {e}")))?,
        None => PipelineConfig::default(),
    };
    config.validate().map_err(to_py_err)?;
    Ok(config)
}

/// Pipeline used by the free functions, which work on already parsed tables.
fn table_pipeline(config_json: Option<&str>) -> PyResult<ReservePipeline<MemorySource>> {
    ReservePipeline::new(MemorySource::new(), config(config_json)?).map_err(to_py_err)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One 4-second needs sample.
#[pyclass]
#[derive(Clone)]
pub struct NeedsSample {
    #[pyo3(get, set)]
    pub ts_ms: i64,
    #[pyo3(get, set)]
    pub value_mw: f64,
}

#[pymethods]
impl NeedsSample {
    #[new]
    fn new(ts_ms: i64, value_mw: f64) -> Self {
        NeedsSample { ts_ms, value_mw }
    }

    fn __repr__(&self) -> String {
        format!("NeedsSample(ts_ms={}, value_mw={})", self.ts_ms, self.value_mw)
    }
}

impl NeedsSample {
    fn to_rust(&self) -> PyResult<RustNeedsSample> {
        Ok(RustNeedsSample {
            ts: timestamp(self.ts_ms)?,
            value_mw: self.value_mw,
        })
    }
}

impl From<RustNeedsSample> for NeedsSample {
    fn from(s: RustNeedsSample) -> Self {
        NeedsSample {
            ts_ms: s.ts.timestamp_millis(),
            value_mw: s.value_mw,
        }
    }
}

/// One 15-minute call window.
#[pyclass]
#[derive(Clone)]
pub struct CallWindow {
    #[pyo3(get, set)]
    pub start_ms: i64,
    #[pyo3(get, set)]
    pub neg_mw: f64,
    #[pyo3(get, set)]
    pub pos_mw: f64,
}

#[pymethods]
impl CallWindow {
    #[new]
    fn new(start_ms: i64, neg_mw: f64, pos_mw: f64) -> Self {
        CallWindow {
            start_ms,
            neg_mw,
            pos_mw,
        }
    }

    /// Net signed call volume.
    fn net_mw(&self) -> f64 {
        self.pos_mw - self.neg_mw
    }

    fn __repr__(&self) -> String {
        format!(
            "CallWindow(start_ms={}, neg_mw={}, pos_mw={})",
            self.start_ms, self.neg_mw, self.pos_mw
        )
    }
}

impl CallWindow {
    fn to_rust(&self) -> PyResult<RustCallWindow> {
        Ok(RustCallWindow {
            start: timestamp(self.start_ms)?,
            neg_mw: self.neg_mw,
            pos_mw: self.pos_mw,
        })
    }
}

impl From<RustCallWindow> for CallWindow {
    fn from(c: RustCallWindow) -> Self {
        CallWindow {
            start_ms: c.start.timestamp_millis(),
            neg_mw: c.neg_mw,
            pos_mw: c.pos_mw,
        }
    }
}

/// One weekly auction bid.
#[pyclass]
#[derive(Clone)]
pub struct AuctionBid {
    #[pyo3(get, set)]
    pub week_start: String,
    #[pyo3(get, set)]
    pub week_end: String,
    /// `POS` or `NEG`.
    #[pyo3(get, set)]
    pub direction: String,
    /// `HT` or `NT`.
    #[pyo3(get, set)]
    pub tariff: String,
    #[pyo3(get, set)]
    pub power_price: f64,
    #[pyo3(get, set)]
    pub work_price: f64,
    #[pyo3(get, set)]
    pub offered_mw: f64,
}

#[pymethods]
impl AuctionBid {
    #[new]
    #[allow(clippy::too_many_arguments)]
    fn new(
        week_start: String,
        week_end: String,
        direction: String,
        tariff: String,
        power_price: f64,
        work_price: f64,
        offered_mw: f64,
    ) -> Self {
        AuctionBid {
            week_start,
            week_end,
            direction,
            tariff,
            power_price,
            work_price,
            offered_mw,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "AuctionBid(week_start={}, product={}_{}, work_price={}, offered_mw={})",
            self.week_start, self.direction, self.tariff, self.work_price, self.offered_mw
        )
    }
}

impl AuctionBid {
    fn to_rust(&self) -> PyResult<RustAuctionBid> {
        let product = format!("{}_{}", self.direction, self.tariff);
        let (direction, tariff) = parse_product(&product)
            .ok_or_else(|| PyValueError::new_err(format!("unknown product {product}")))?;
        Ok(RustAuctionBid {
            week_start: date(&self.week_start)?,
            week_end: date(&self.week_end)?,
            direction,
            tariff,
            power_price: self.power_price,
            work_price: self.work_price,
            offered_mw: self.offered_mw,
        })
    }
}

impl From<RustAuctionBid> for AuctionBid {
    fn from(b: RustAuctionBid) -> Self {
        AuctionBid {
            week_start: b.week_start.to_string(),
            week_end: b.week_end.to_string(),
            direction: b.direction.code().to_string(),
            tariff: b.tariff.code().to_string(),
            power_price: b.power_price,
            work_price: b.work_price,
            offered_mw: b.offered_mw,
        }
    }
}

/// Approximated call of one minute.
#[pyclass]
#[derive(Clone)]
pub struct ApproxMinuteCall {
    #[pyo3(get)]
    pub minute_ms: i64,
    #[pyo3(get)]
    pub pos_mw: f64,
    #[pyo3(get)]
    pub neg_mw: f64,
    #[pyo3(get)]
    pub volume_mw: f64,
}

#[pymethods]
impl ApproxMinuteCall {
    fn __repr__(&self) -> String {
        format!(
            "ApproxMinuteCall(minute_ms={}, volume_mw={})",
            self.minute_ms, self.volume_mw
        )
    }
}

impl From<RustApproxMinuteCall> for ApproxMinuteCall {
    fn from(m: RustApproxMinuteCall) -> Self {
        ApproxMinuteCall {
            minute_ms: m.minute.timestamp_millis(),
            pos_mw: m.pos_mw,
            neg_mw: m.neg_mw,
            volume_mw: m.volume_mw,
        }
    }
}

/// A minute with its marginal work price.
#[pyclass]
#[derive(Clone)]
pub struct MarginalPricedMinute {
    #[pyo3(get)]
    pub minute_ms: i64,
    #[pyo3(get)]
    pub volume_mw: f64,
    #[pyo3(get)]
    pub direction: Option<String>,
    #[pyo3(get)]
    pub tariff: Option<String>,
    #[pyo3(get)]
    pub marginal_work_price: Option<f64>,
}

#[pymethods]
impl MarginalPricedMinute {
    fn __repr__(&self) -> String {
        format!(
            "MarginalPricedMinute(minute_ms={}, volume_mw={}, marginal_work_price={:?})",
            self.minute_ms, self.volume_mw, self.marginal_work_price
        )
    }
}

impl From<RustMarginalPricedMinute> for MarginalPricedMinute {
    fn from(m: RustMarginalPricedMinute) -> Self {
        MarginalPricedMinute {
            minute_ms: m.minute.timestamp_millis(),
            volume_mw: m.volume_mw,
            direction: m.direction.map(|d| d.code().to_string()),
            tariff: m.tariff.map(|t| t.code().to_string()),
            marginal_work_price: m.marginal_work_price,
        }
    }
}

fn rust_tables(
    needs: &[NeedsSample],
    calls: &[CallWindow],
) -> PyResult<(Vec<RustNeedsSample>, Vec<RustCallWindow>)> {
    let needs = needs.iter().map(NeedsSample::to_rust).collect::<PyResult<Vec<_>>>()?;
    let calls = calls.iter().map(CallWindow::to_rust).collect::<PyResult<Vec<_>>>()?;
    Ok((needs, calls))
}

// ============================================================================
// Functions
// ============================================================================

/// Approximate 1-minute calls from needs samples and call windows.
#[pyfunction]
#[pyo3(signature = (needs, calls, config_json=None))]
fn get_one_minute_calls(
    needs: Vec<NeedsSample>,
    calls: Vec<CallWindow>,
    config_json: Option<&str>,
) -> PyResult<Vec<ApproxMinuteCall>> {
    let (needs, calls) = rust_tables(&needs, &calls)?;
    let minutes = table_pipeline(config_json)?
        .get_one_minute_calls(&needs, &calls)
        .map_err(to_py_err)?;
    Ok(minutes.into_iter().map(Into::into).collect())
}

/// Marginal work price of every approximated minute.
#[pyfunction]
#[pyo3(signature = (needs, calls, auctions, config_json=None))]
fn get_marginal_work_prices(
    needs: Vec<NeedsSample>,
    calls: Vec<CallWindow>,
    auctions: Vec<AuctionBid>,
    config_json: Option<&str>,
) -> PyResult<Vec<MarginalPricedMinute>> {
    let (needs, calls) = rust_tables(&needs, &calls)?;
    let auctions = auctions
        .iter()
        .map(AuctionBid::to_rust)
        .collect::<PyResult<Vec<_>>>()?;
    let priced = table_pipeline(config_json)?
        .get_marginal_work_prices(&needs, &calls, &auctions)
        .map_err(to_py_err)?;
    Ok(priced.into_iter().map(Into::into).collect())
}

// ============================================================================
// Pipeline Class
// ============================================================================

/// Pipeline over raw rows loaded from Python.
///
/// Rows are tuples of source-native strings, e.g. `("08.05.2019",
/// "10:00:04", "-12,5")` for needs.
#[pyclass]
pub struct PyReservePipeline {
    config: PipelineConfig,
    needs: Vec<RawNeedsRow>,
    calls: Vec<(String, ReserveType, Vec<RawCallRow>)>,
    auctions: Vec<(ReserveType, Vec<RawAuctionRow>)>,
}

impl PyReservePipeline {
    fn pipeline(&self) -> PyResult<ReservePipeline<MemorySource>> {
        let mut source = MemorySource::new().with_needs(self.needs.clone());
        for (source_id, reserve_type, rows) in &self.calls {
            source = source.with_calls(source_id, *reserve_type, rows.clone());
        }
        for (reserve_type, rows) in &self.auctions {
            source = source.with_auctions(*reserve_type, rows.clone());
        }
        ReservePipeline::new(source, self.config.clone()).map_err(to_py_err)
    }
}

#[pymethods]
impl PyReservePipeline {
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        Ok(Self {
            config: config(config_json)?,
            needs: Vec::new(),
            calls: Vec::new(),
            auctions: Vec::new(),
        })
    }

    /// Append `(date, time, value)` needs rows.
    fn add_needs_rows(&mut self, rows: Vec<(String, String, String)>) {
        self.needs.extend(
            rows.into_iter()
                .map(|(date, time, value)| RawNeedsRow { date, time, value }),
        );
    }

    /// Set the `(date, time_from, neg, pos)` call rows of one operator.
    fn set_call_rows(
        &mut self,
        source_id: String,
        reserve_type: &str,
        rows: Vec<(String, String, String, String)>,
    ) -> PyResult<()> {
        let reserve_type = parse_reserve_type(reserve_type)?;
        let rows = rows
            .into_iter()
            .map(|(date, time_from, neg, pos)| RawCallRow {
                date,
                time_from,
                neg,
                pos,
            })
            .collect();
        self.calls.push((source_id, reserve_type, rows));
        Ok(())
    }

    /// Set the `(date_from, date_to, product, power_price, work_price,
    /// offered_mw)` auction rows of one reserve type.
    fn set_auction_rows(
        &mut self,
        reserve_type: &str,
        rows: Vec<(String, String, String, String, String, String)>,
    ) -> PyResult<()> {
        let reserve_type = parse_reserve_type(reserve_type)?;
        let rows = rows
            .into_iter()
            .map(
                |(date_from, date_to, product, power_price, work_price, offered_mw)| RawAuctionRow {
                    date_from,
                    date_to,
                    product,
                    power_price,
                    work_price,
                    offered_mw,
                },
            )
            .collect();
        self.auctions.push((reserve_type, rows));
        Ok(())
    }

    fn get_reserve_needs(&self, start: &str, end: &str) -> PyResult<Vec<NeedsSample>> {
        let needs = self
            .pipeline()?
            .get_reserve_needs(date(start)?, date(end)?)
            .map_err(to_py_err)?;
        Ok(needs.into_iter().map(Into::into).collect())
    }

    fn get_reserve_calls(
        &self,
        start: &str,
        end: &str,
        source_id: &str,
        reserve_type: &str,
    ) -> PyResult<Vec<CallWindow>> {
        let calls = self
            .pipeline()?
            .get_reserve_calls(date(start)?, date(end)?, source_id, parse_reserve_type(reserve_type)?)
            .map_err(to_py_err)?;
        Ok(calls.into_iter().map(Into::into).collect())
    }

    fn get_reserve_auctions(&self, start: &str, end: &str, reserve_type: &str) -> PyResult<Vec<AuctionBid>> {
        let bids = self
            .pipeline()?
            .get_reserve_auctions(date(start)?, date(end)?, parse_reserve_type(reserve_type)?)
            .map_err(to_py_err)?;
        Ok(bids.into_iter().map(Into::into).collect())
    }

    /// Full run from raw rows to priced minutes.
    fn run(
        &self,
        start: &str,
        end: &str,
        source_id: &str,
        reserve_type: &str,
    ) -> PyResult<Vec<MarginalPricedMinute>> {
        let priced = self
            .pipeline()?
            .run(date(start)?, date(end)?, source_id, parse_reserve_type(reserve_type)?)
            .map_err(to_py_err)?;
        Ok(priced.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// Reserve Market Core - balancing-reserve analytics for Python.
#[pymodule]
fn reserve_market_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<NeedsSample>()?;
    m.add_class::<CallWindow>()?;
    m.add_class::<AuctionBid>()?;
    m.add_class::<ApproxMinuteCall>()?;
    m.add_class::<MarginalPricedMinute>()?;

    // Functions
    m.add_function(wrap_pyfunction!(get_one_minute_calls, m)?)?;
    m.add_function(wrap_pyfunction!(get_marginal_work_prices, m)?)?;

    // Pipeline
    m.add_class::<PyReservePipeline>()?;

    Ok(())
}
