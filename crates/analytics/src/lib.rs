//! Derived analytics for the reserve-market system.
//!
//! This crate handles:
//! - Resampling the 4-second needs signal onto the 15-minute call grid
//! - Redistributing 15-minute calls to approximated 1-minute calls
//! - Marginal work-price attribution from weekly auction bid ladders

pub mod aggregator;
pub mod approximator;
pub mod marginal_price;

pub use aggregator::{align, AggregationStats, NeedsAggregator, NeedsWindow};
pub use approximator::{ApproximationStats, CallApproximator};
pub use marginal_price::{BidLadder, MarginalPriceCalculator};
