//! Tank asset data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::consumption::{Confidence, ConsumptionResult, TankContext, Trend};

/// A monitored tank together with the last consumption figures persisted for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub capacity: Option<f64>,
    pub current_level_percent: f64,
    pub current_level_volume: Option<f64>,
    /// Overrides the configured analysis horizon for this tank.
    pub analysis_days: Option<u32>,
    pub enabled: bool,
    pub daily_consumption_percent: Option<f64>,
    pub daily_consumption_volume: Option<f64>,
    pub days_remaining: Option<f64>,
    pub consumption_trend: Option<Trend>,
    pub consumption_confidence: Option<Confidence>,
    pub consumption_computed_at: Option<DateTime<Utc>>,
}

impl AssetRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, current_level_percent: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capacity: None,
            current_level_percent,
            current_level_volume: None,
            analysis_days: None,
            enabled: true,
            daily_consumption_percent: None,
            daily_consumption_volume: None,
            days_remaining: None,
            consumption_trend: None,
            consumption_confidence: None,
            consumption_computed_at: None,
        }
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn tank_context(&self, default_analysis_days: u32) -> TankContext {
        TankContext {
            current_level_percent: self.current_level_percent,
            current_level_volume: self.current_level_volume,
            capacity: self.capacity,
            analysis_days: self.analysis_days.unwrap_or(default_analysis_days).max(1),
        }
    }

    /// Copy the persisted fields of an estimate onto this record.
    pub fn apply_consumption(&mut self, result: &ConsumptionResult, computed_at: DateTime<Utc>) {
        self.daily_consumption_percent = result.daily_consumption_percent;
        self.daily_consumption_volume = result.daily_consumption_volume;
        self.days_remaining = result.days_remaining;
        self.consumption_trend = Some(result.trend);
        self.consumption_confidence = Some(result.confidence);
        self.consumption_computed_at = Some(computed_at);
    }
}
