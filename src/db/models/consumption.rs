//! Consumption estimate data models.
//!
//! `TankContext` is what the engine needs to know about a tank besides its
//! readings; `ConsumptionResult` is the only thing it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rate estimation algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Drop refill readings, then least-squares fit over the window.
    Regression,
    /// Sum per-day decreases above the noise floor, average over days with data.
    #[default]
    Summation,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Regression => "regression",
            Strategy::Summation => "summation",
        }
    }
}

/// Measurement channel driving the computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Percent,
    Volume,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Percent => "percent",
            Channel::Volume => "volume",
        }
    }
}

/// Direction of consumption over the window.
///
/// `Increasing` means the tank is being drained faster in the second half of
/// the window than in the first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Per-call tank state handed to the engine alongside the reading window.
#[derive(Debug, Clone, PartialEq)]
pub struct TankContext {
    pub current_level_percent: f64,
    pub current_level_volume: Option<f64>,
    /// Enables percent/volume conversion when known.
    pub capacity: Option<f64>,
    pub analysis_days: u32,
}

impl TankContext {
    pub fn new(current_level_percent: f64, capacity: Option<f64>, analysis_days: u32) -> Self {
        Self {
            current_level_percent,
            current_level_volume: None,
            capacity: capacity.filter(|c| c.is_finite() && *c > 0.0),
            analysis_days,
        }
    }

    pub fn with_current_volume(mut self, volume: f64) -> Self {
        self.current_level_volume = Some(volume);
        self
    }

    pub(crate) fn usable_capacity(&self) -> Option<f64> {
        self.capacity.filter(|c| c.is_finite() && *c > 0.0)
    }

    /// Current level as a percentage of capacity, from the volume reading.
    pub(crate) fn current_volume_as_percent(&self) -> Option<f64> {
        let volume = self.current_level_volume.filter(|v| v.is_finite())?;
        Some(volume / self.usable_capacity()? * 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionResult {
    pub daily_consumption_volume: Option<f64>,
    pub daily_consumption_percent: Option<f64>,
    /// Clamped to `[0, max_days_remaining]`.
    pub days_remaining: Option<f64>,
    pub trend: Trend,
    pub confidence: Confidence,
    /// Readings actually used after filtering.
    pub sample_count: usize,
    /// R² in regression mode, day coverage ratio in summation mode.
    pub fit_quality: Option<f64>,
    pub channel: Option<Channel>,
    pub strategy: Strategy,
}

impl ConsumptionResult {
    /// The answer when there is no trustworthy signal.
    pub fn empty(sample_count: usize, strategy: Strategy) -> Self {
        Self {
            daily_consumption_volume: None,
            daily_consumption_percent: None,
            days_remaining: None,
            trend: Trend::Unknown,
            confidence: Confidence::Low,
            sample_count,
            fit_quality: None,
            channel: None,
            strategy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily_consumption_percent.is_none() && self.daily_consumption_volume.is_none()
    }
}

/// One persisted estimate, kept for auditing how a tank's rate evolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionSnapshot {
    pub id: String,
    pub asset_id: String,
    pub computed_at: DateTime<Utc>,
    pub result: ConsumptionResult,
}
