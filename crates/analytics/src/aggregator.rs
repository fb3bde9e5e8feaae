//! Needs aggregation onto the 15-minute call grid.
//!
//! Every window collects the needs samples in `[start, start + 15min)` and
//! reports their mean plus one mean per minute slot.

use chrono::Duration;
use reserve_core::{
    is_window_aligned, AlignedWindow, CallWindow, Error, NeedsSample, Result, Timestamp,
    MINUTES_PER_WINDOW, WINDOW_MINUTES,
};
use serde::Serialize;
use std::borrow::Cow;

/// Needs observed in one window.
#[derive(Debug, Clone, PartialEq)]
pub struct NeedsWindow {
    pub start: Timestamp,
    pub mean: f64,
    /// Per-minute means; minutes without samples hold `mean`.
    pub minute_means: [f64; MINUTES_PER_WINDOW],
    pub sample_count: usize,
    pub backfilled_minutes: usize,
}

/// Statistics about the last aggregation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationStats {
    /// Windows produced.
    pub windows: usize,
    /// Samples that fell inside a window.
    pub samples_used: usize,
    /// Samples outside every window.
    pub ignored_samples: usize,
    /// Minute slots filled with the window mean.
    pub backfilled_minutes: usize,
}

/// A window that's currently being filled.
#[derive(Debug, Clone)]
struct WindowInProgress {
    start: Timestamp,
    sum: f64,
    count: usize,
    minute_sums: [f64; MINUTES_PER_WINDOW],
    minute_counts: [usize; MINUTES_PER_WINDOW],
}

impl WindowInProgress {
    fn new(start: Timestamp) -> Self {
        Self {
            start,
            sum: 0.0,
            count: 0,
            minute_sums: [0.0; MINUTES_PER_WINDOW],
            minute_counts: [0; MINUTES_PER_WINDOW],
        }
    }

    fn add_sample(&mut self, sample: &NeedsSample) {
        let slot = (sample.ts - self.start).num_minutes() as usize;
        self.sum += sample.value_mw;
        self.count += 1;
        self.minute_sums[slot] += sample.value_mw;
        self.minute_counts[slot] += 1;
    }

    fn finish(&self) -> Result<NeedsWindow> {
        if self.count == 0 {
            return Err(Error::alignment(format!(
                "no needs samples in window starting {}",
                self.start
            )));
        }
        let mean = self.sum / self.count as f64;
        let mut minute_means = [mean; MINUTES_PER_WINDOW];
        let mut backfilled_minutes = 0;
        for (slot, value) in minute_means.iter_mut().enumerate() {
            match self.minute_counts[slot] {
                0 => backfilled_minutes += 1,
                n => *value = self.minute_sums[slot] / n as f64,
            }
        }
        Ok(NeedsWindow {
            start: self.start,
            mean,
            minute_means,
            sample_count: self.count,
            backfilled_minutes,
        })
    }
}

/// Resamples the needs series onto a 15-minute grid.
#[derive(Debug, Default)]
pub struct NeedsAggregator {
    stats: AggregationStats,
}

impl NeedsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate needs onto the given window starts.
    ///
    /// Starts must sit on the 15-minute grid and increase strictly. A window
    /// without any sample is an alignment error.
    pub fn resample(&mut self, needs: &[NeedsSample], starts: &[Timestamp]) -> Result<Vec<NeedsWindow>> {
        check_grid(starts)?;
        self.stats = AggregationStats::default();

        let needs: Cow<'_, [NeedsSample]> = if needs.windows(2).all(|p| p[0].ts <= p[1].ts) {
            Cow::Borrowed(needs)
        } else {
            let mut sorted = needs.to_vec();
            sorted.sort_by_key(|s| s.ts);
            Cow::Owned(sorted)
        };

        let window_len = Duration::minutes(WINDOW_MINUTES);
        let mut windows = Vec::with_capacity(starts.len());
        let mut cursor = 0;

        for &start in starts {
            let end = start + window_len;
            while cursor < needs.len() && needs[cursor].ts < start {
                self.stats.ignored_samples += 1;
                cursor += 1;
            }
            let mut window = WindowInProgress::new(start);
            while cursor < needs.len() && needs[cursor].ts < end {
                window.add_sample(&needs[cursor]);
                cursor += 1;
            }
            let finished = window.finish()?;
            self.stats.samples_used += finished.sample_count;
            self.stats.backfilled_minutes += finished.backfilled_minutes;
            windows.push(finished);
        }
        self.stats.ignored_samples += needs.len() - cursor;
        self.stats.windows = windows.len();
        Ok(windows)
    }

    /// Aggregate needs onto the call grid and pair each window with its call.
    pub fn aggregate(&mut self, needs: &[NeedsSample], calls: &[CallWindow]) -> Result<Vec<AlignedWindow>> {
        let starts: Vec<Timestamp> = calls.iter().map(|c| c.start).collect();
        let windows = self.resample(needs, &starts)?;
        align(&windows, calls)
    }

    /// Statistics of the last run.
    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }
}

fn check_grid(starts: &[Timestamp]) -> Result<()> {
    if let Some(bad) = starts.iter().find(|s| !is_window_aligned(**s)) {
        return Err(Error::alignment(format!("window start {bad} is off the 15-minute grid")));
    }
    if let Some(pair) = starts.windows(2).find(|p| p[1] <= p[0]) {
        return Err(Error::alignment(format!(
            "window starts not strictly increasing: {} then {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Pair needs windows with call windows one-to-one.
pub fn align(needs_windows: &[NeedsWindow], calls: &[CallWindow]) -> Result<Vec<AlignedWindow>> {
    if needs_windows.len() != calls.len() {
        return Err(Error::alignment(format!(
            "needs cover {} windows but calls cover {}",
            needs_windows.len(),
            calls.len()
        )));
    }
    needs_windows
        .iter()
        .zip(calls)
        .map(|(needs, call)| {
            if needs.start != call.start {
                return Err(Error::alignment(format!(
                    "needs window {} does not match call window {}",
                    needs.start, call.start
                )));
            }
            Ok(AlignedWindow {
                start: call.start,
                needs_mean: needs.mean,
                minute_needs: needs.minute_means,
                sample_count: needs.sample_count,
                neg_mw: call.neg_mw,
                pos_mw: call.pos_mw,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2019, 5, 6, 10, 0, 0).unwrap()
    }

    /// 4-second samples over `windows` windows with value `f(index)`.
    fn make_needs(windows: i64, f: impl Fn(i64) -> f64) -> Vec<NeedsSample> {
        (0..windows * 225)
            .map(|i| NeedsSample {
                ts: t0() + Duration::seconds(i * 4),
                value_mw: f(i),
            })
            .collect()
    }

    fn make_call(offset_windows: i64, neg: f64, pos: f64) -> CallWindow {
        CallWindow {
            start: t0() + Duration::minutes(offset_windows * 15),
            neg_mw: neg,
            pos_mw: pos,
        }
    }

    #[test]
    fn test_window_means() {
        // First window constant 10, second window constant -20
        let needs = make_needs(2, |i| if i < 225 { 10.0 } else { -20.0 });
        let calls = vec![make_call(0, 0.0, 150.0), make_call(1, 30.0, 0.0)];
        let mut aggregator = NeedsAggregator::new();
        let windows = aggregator.aggregate(&needs, &calls).unwrap();

        assert_eq!(windows.len(), 2);
        assert_relative_eq!(windows[0].needs_mean, 10.0);
        assert_relative_eq!(windows[1].needs_mean, -20.0);
        assert_eq!(windows[0].sample_count, 225);
        assert_relative_eq!(windows[1].pos_mw, 0.0);
        assert_relative_eq!(windows[1].neg_mw, 30.0);
        assert_eq!(aggregator.stats().samples_used, 450);
        assert_eq!(aggregator.stats().ignored_samples, 0);
    }

    #[test]
    fn test_minute_means_follow_shape() {
        // Value equals the minute index within the window
        let needs = make_needs(1, |i| (i / 15) as f64);
        let mut aggregator = NeedsAggregator::new();
        let windows = aggregator.resample(&needs, &[t0()]).unwrap();
        for (slot, value) in windows[0].minute_means.iter().enumerate() {
            assert_relative_eq!(*value, slot as f64);
        }
        assert_relative_eq!(windows[0].mean, 7.0);
    }

    #[test]
    fn test_half_open_interval() {
        // A sample exactly at the next window start belongs to the next window
        let needs = vec![
            NeedsSample { ts: t0(), value_mw: 1.0 },
            NeedsSample { ts: t0() + Duration::minutes(15), value_mw: 99.0 },
        ];
        let mut aggregator = NeedsAggregator::new();
        let windows = aggregator.resample(&needs, &[t0()]).unwrap();
        assert_relative_eq!(windows[0].mean, 1.0);
        assert_eq!(aggregator.stats().ignored_samples, 1);
        assert_eq!(windows[0].backfilled_minutes, 14);
    }

    #[test]
    fn test_empty_window_is_alignment_error() {
        let needs = make_needs(1, |_| 5.0);
        let calls = vec![make_call(0, 0.0, 1.0), make_call(1, 0.0, 1.0)];
        let err = NeedsAggregator::new().aggregate(&needs, &calls).unwrap_err();
        assert!(err.is_alignment());
    }

    #[test]
    fn test_unsorted_needs_are_sorted() {
        let mut needs = make_needs(1, |i| i as f64);
        needs.reverse();
        let windows = NeedsAggregator::new().resample(&needs, &[t0()]).unwrap();
        assert_relative_eq!(windows[0].minute_means[0], 7.0);
    }

    #[test]
    fn test_off_grid_start_rejected() {
        let needs = make_needs(1, |_| 1.0);
        let start = t0() + Duration::minutes(5);
        assert!(NeedsAggregator::new().resample(&needs, &[start]).unwrap_err().is_alignment());
    }

    #[test]
    fn test_align_count_mismatch() {
        let needs = make_needs(1, |_| 1.0);
        let windows = NeedsAggregator::new().resample(&needs, &[t0()]).unwrap();
        let calls = vec![make_call(0, 0.0, 1.0), make_call(1, 0.0, 1.0)];
        assert!(align(&windows, &calls).unwrap_err().is_alignment());
    }

    #[test]
    fn test_align_start_mismatch() {
        let needs = make_needs(1, |_| 1.0);
        let windows = NeedsAggregator::new().resample(&needs, &[t0()]).unwrap();
        let calls = vec![make_call(1, 0.0, 1.0)];
        assert!(align(&windows, &calls).unwrap_err().is_alignment());
    }
}
