//! Approximation of 1-minute calls from 15-minute call windows.
//!
//! Each window's call volume is spread over its fifteen minutes in
//! proportion to the needs curve inside the window, separately for the
//! positive and the negative direction. Windows are folded in chronological
//! order; the fold carries the difference between the cumulative called and
//! the cumulative assigned volume into the next window so rounding drift
//! never accumulates.

use chrono::Duration;
use reserve_core::config::ApproximationConfig;
use reserve_core::{
    is_window_aligned, AlignedWindow, ApproxMinuteCall, Direction, Error, Result,
    MINUTES_PER_WINDOW,
};
use serde::Serialize;

/// Statistics about the last approximation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApproximationStats {
    pub windows: usize,
    pub minutes: usize,
    /// Direction/window pairs that used uniform weights.
    pub uniform_fallbacks: usize,
    /// Largest carried residual seen (MW).
    pub max_residual_mw: f64,
}

/// Running totals of one direction.
#[derive(Debug, Clone, Copy, Default)]
struct Carry {
    called: f64,
    assigned: f64,
}

impl Carry {
    fn residual(&self) -> f64 {
        self.called - self.assigned
    }
}

/// Redistributes window calls to minutes.
#[derive(Debug)]
pub struct CallApproximator {
    zero_sum_epsilon: f64,
    resolution_mw: f64,
    stats: ApproximationStats,
}

impl CallApproximator {
    pub fn new(config: &ApproximationConfig) -> Self {
        Self {
            zero_sum_epsilon: config.zero_sum_epsilon,
            resolution_mw: config.resolution_mw,
            stats: ApproximationStats::default(),
        }
    }

    /// Approximate minute calls for chronologically ordered windows.
    ///
    /// With `resolution_mw == 0` every window's minutes sum to its call
    /// volume up to floating-point error. With a positive resolution the
    /// minute values are multiples of it and the cumulative drift stays
    /// within half a quantum.
    pub fn approximate(&mut self, windows: &[AlignedWindow]) -> Result<Vec<ApproxMinuteCall>> {
        check_order(windows)?;
        self.stats = ApproximationStats {
            windows: windows.len(),
            ..ApproximationStats::default()
        };

        let mut pos_carry = Carry::default();
        let mut neg_carry = Carry::default();
        let mut minutes = Vec::with_capacity(windows.len() * MINUTES_PER_WINDOW);

        for window in windows {
            let pos = self.distribute(window, Direction::Pos, &mut pos_carry);
            let neg = self.distribute(window, Direction::Neg, &mut neg_carry);
            for slot in 0..MINUTES_PER_WINDOW {
                minutes.push(ApproxMinuteCall {
                    minute: window.start + Duration::minutes(slot as i64),
                    pos_mw: pos[slot],
                    neg_mw: neg[slot],
                    volume_mw: pos[slot] - neg[slot],
                });
            }
        }
        self.stats.minutes = minutes.len();
        Ok(minutes)
    }

    /// Statistics of the last run.
    pub fn stats(&self) -> &ApproximationStats {
        &self.stats
    }

    /// Split one direction's window volume over the minute slots.
    fn distribute(
        &mut self,
        window: &AlignedWindow,
        direction: Direction,
        carry: &mut Carry,
    ) -> [f64; MINUTES_PER_WINDOW] {
        let volume = window.call().volume_mw(direction);
        let residual = carry.residual();
        self.stats.max_residual_mw = self.stats.max_residual_mw.max(residual.abs());

        // A negative carry stays in the carry; a direction's share is never negative
        let target = (volume + residual).max(0.0);
        let weights = self.weights(window, direction);

        // Cumulative rounding: each slot gets the increment of the rounded
        // running total, so slot values never drift apart from the target.
        let mut slots = [0.0; MINUTES_PER_WINDOW];
        let mut running = 0.0;
        let mut assigned = 0.0;
        for (slot, weight) in slots.iter_mut().zip(weights) {
            running += target * weight;
            let rounded = self.quantize(running);
            *slot = rounded - assigned;
            assigned = rounded;
        }

        carry.called += volume;
        carry.assigned += assigned;
        slots
    }

    /// Share of each minute in one direction.
    fn weights(&mut self, window: &AlignedWindow, direction: Direction) -> [f64; MINUTES_PER_WINDOW] {
        let mut parts = [0.0; MINUTES_PER_WINDOW];
        for (part, needs) in parts.iter_mut().zip(&window.minute_needs) {
            *part = (needs * direction.sign()).max(0.0);
        }
        let total: f64 = parts.iter().sum();
        if total < self.zero_sum_epsilon {
            tracing::trace!(start = %window.start, %direction, "flat needs, uniform weights");
            self.stats.uniform_fallbacks += 1;
            return [1.0 / MINUTES_PER_WINDOW as f64; MINUTES_PER_WINDOW];
        }
        parts.map(|p| p / total)
    }

    fn quantize(&self, value: f64) -> f64 {
        if self.resolution_mw > 0.0 {
            (value / self.resolution_mw).round() * self.resolution_mw
        } else {
            value
        }
    }
}

fn check_order(windows: &[AlignedWindow]) -> Result<()> {
    if let Some(bad) = windows.iter().find(|w| !is_window_aligned(w.start)) {
        return Err(Error::alignment(format!(
            "window start {} is off the 15-minute grid",
            bad.start
        )));
    }
    if let Some(pair) = windows.windows(2).find(|p| p[1].start <= p[0].start) {
        return Err(Error::alignment(format!(
            "windows not in chronological order: {} then {}",
            pair[0].start, pair[1].start
        )));
    }
    Ok(())
}
