use chrono::{DateTime, Utc};

use crate::db::models::{Channel, Reading};

/// Fraction of readings that must carry a usable value for a channel to be trusted.
const RELIABLE_FRACTION: f64 = 0.5;

/// A reading reduced to the value of the channel driving the computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelReliability {
    pub percent: bool,
    pub volume: bool,
}

/// Check each channel against the reliability fraction.
pub fn assess_reliability(readings: &[Reading]) -> ChannelReliability {
    if readings.is_empty() {
        return ChannelReliability {
            percent: false,
            volume: false,
        };
    }

    let total = readings.len() as f64;
    let percent_count = readings.iter().filter(|r| r.usable_percent().is_some()).count();
    let volume_count = readings.iter().filter(|r| r.usable_volume().is_some()).count();

    ChannelReliability {
        percent: percent_count as f64 / total >= RELIABLE_FRACTION,
        volume: volume_count as f64 / total >= RELIABLE_FRACTION,
    }
}

/// Pick the channel to compute from: percent when reliable, volume as a
/// fallback only when capacity allows converting back to percent.
pub fn select_channel(readings: &[Reading], capacity: Option<f64>) -> Option<Channel> {
    let reliability = assess_reliability(readings);
    let has_capacity = capacity.is_some_and(|c| c.is_finite() && c > 0.0);

    if reliability.percent {
        Some(Channel::Percent)
    } else if reliability.volume && has_capacity {
        Some(Channel::Volume)
    } else {
        None
    }
}

/// Project readings onto one channel, skipping readings where it is unusable.
/// Input order is preserved.
pub fn extract_series(readings: &[Reading], channel: Channel) -> Vec<LevelSample> {
    readings
        .iter()
        .filter_map(|r| {
            let value = match channel {
                Channel::Percent => r.usable_percent(),
                Channel::Volume => r.usable_volume(),
            }?;
            Some(LevelSample {
                timestamp: r.timestamp,
                value,
            })
        })
        .collect()
}
