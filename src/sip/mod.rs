//! Turns engine detections into durable sip events and keeps today's totals.

mod aggregator;
mod converter;
mod tracker;

#[cfg(test)]
mod tests;

pub use aggregator::{estimate_ml, AggregatorConfig, SipAggregator};
pub use converter::CupConverter;
pub use tracker::SipTracker;

/// Row id of the cup profile seeded by the first migration.
pub const DEFAULT_PROFILE_ID: i64 = 1;
