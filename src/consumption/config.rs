use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Channel, Strategy};

/// Configuration for consumption estimation with tunable thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsumptionConfig {
    pub strategy: Strategy,

    /// Level increase (vs. the last kept reading) treated as a delivery
    pub refill_threshold_percent: f64,
    pub refill_threshold_volume: f64,

    /// Decreases at or below this are sensor jitter
    pub noise_floor_percent: f64,
    pub noise_floor_volume: f64,

    /// Fewer readings than this (raw or filtered) yields an empty result
    pub min_readings: usize,

    pub max_days_remaining: f64,

    /// Trend classification
    pub stable_slope_threshold: f64,
    pub trend_delta_threshold: f64,

    /// Percent rates at or below this are not projected from
    pub min_projection_rate_percent: f64,

    pub default_analysis_days: u32,

    /// Offset from UTC used to cut readings into calendar days.
    pub day_offset_minutes: i32,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Summation,
            refill_threshold_percent: 10.0,
            refill_threshold_volume: 250.0,
            noise_floor_percent: 0.5,
            noise_floor_volume: 5.0,
            min_readings: 3,
            max_days_remaining: 365.0,
            stable_slope_threshold: 0.5,
            trend_delta_threshold: 5.0,
            min_projection_rate_percent: 0.1,
            default_analysis_days: 7,
            day_offset_minutes: 0,
        }
    }
}

impl ConsumptionConfig {
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn refill_threshold(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Percent => self.refill_threshold_percent,
            Channel::Volume => self.refill_threshold_volume,
        }
    }

    pub fn noise_floor(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Percent => self.noise_floor_percent,
            Channel::Volume => self.noise_floor_volume,
        }
    }

    /// Falls back to UTC when the configured offset is out of range.
    pub fn day_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.day_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}
