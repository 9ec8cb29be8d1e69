//! Tank level reading data model.
//!
//! A single telemetry sample reported by a tank's level sensor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One level sample. Either channel may be missing, and some sensors report
/// a spurious `0.0` percent, so neither field is trusted until the window has
/// been classified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub level_percent: Option<f64>,
    pub level_volume: Option<f64>,
}

impl Reading {
    pub fn percent(timestamp: DateTime<Utc>, level_percent: f64) -> Self {
        Self {
            timestamp,
            level_percent: Some(level_percent),
            level_volume: None,
        }
    }

    pub fn volume(timestamp: DateTime<Utc>, level_volume: f64) -> Self {
        Self {
            timestamp,
            level_percent: None,
            level_volume: Some(level_volume),
        }
    }

    /// Percent value if the sensor reported something usable.
    pub fn usable_percent(&self) -> Option<f64> {
        self.level_percent.filter(|v| v.is_finite() && *v > 0.0)
    }

    pub fn usable_volume(&self) -> Option<f64> {
        self.level_volume.filter(|v| v.is_finite() && *v > 0.0)
    }
}
