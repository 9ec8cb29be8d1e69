use crate::consumption::config::ConsumptionConfig;
use crate::db::models::{Channel, Confidence, TankContext, Trend};

use super::quality::LevelSample;

const HIGH_MIN_SAMPLES: usize = 7;
const HIGH_MIN_FIT: f64 = 0.7;
const HIGH_MIN_ANALYSIS_DAYS: u32 = 7;
const MEDIUM_MIN_SAMPLES: usize = 5;
const MEDIUM_MIN_FIT: f64 = 0.5;

/// Fewer samples than this can't be split into meaningful halves.
const MIN_TREND_SAMPLES: usize = 3;

/// Project days until empty, clamped to `[0, max_days_remaining]`.
///
/// Percent drives the projection when its rate is meaningful; otherwise a
/// positive volume rate is used, which needs capacity to express the current
/// level in volume when the tank only reported percent. When the rate came
/// from the volume channel the current level is taken from volume too, since
/// the percent sensor was the one judged unreliable.
pub fn days_remaining(
    context: &TankContext,
    channel: Channel,
    percent_per_day: Option<f64>,
    volume_per_day: Option<f64>,
    config: &ConsumptionConfig,
) -> Option<f64> {
    let current_percent = match channel {
        Channel::Volume => context
            .current_volume_as_percent()
            .unwrap_or(context.current_level_percent),
        Channel::Percent => context.current_level_percent,
    };

    let raw = if let Some(rate) =
        percent_per_day.filter(|rate| *rate > config.min_projection_rate_percent)
    {
        Some(current_percent / rate)
    } else if let (Some(rate), Some(capacity)) = (
        volume_per_day.filter(|rate| *rate > 0.0),
        context.usable_capacity(),
    ) {
        let current_volume = context
            .current_level_volume
            .unwrap_or(current_percent / 100.0 * capacity);
        Some(current_volume / rate)
    } else {
        None
    };

    raw.filter(|days| days.is_finite())
        .map(|days| days.clamp(0.0, config.max_days_remaining))
}

/// Classify consumption direction by comparing the average level of the two
/// halves of the window.
///
/// A falling level average between halves means consumption is speeding up,
/// hence `Increasing`.
pub fn classify_trend(samples: &[LevelSample], slope: f64, config: &ConsumptionConfig) -> Trend {
    if samples.len() < MIN_TREND_SAMPLES || !slope.is_finite() {
        return Trend::Unknown;
    }

    let mid = samples.len() / 2;
    let average = |half: &[LevelSample]| half.iter().map(|s| s.value).sum::<f64>() / half.len() as f64;
    let delta = average(&samples[mid..]) - average(&samples[..mid]);

    if slope.abs() < config.stable_slope_threshold {
        Trend::Stable
    } else if delta < -config.trend_delta_threshold {
        Trend::Increasing
    } else if delta > config.trend_delta_threshold {
        Trend::Decreasing
    } else if slope < 0.0 {
        Trend::Stable
    } else {
        Trend::Unknown
    }
}

/// Coarse trust label from sample size, fit quality and horizon. First match wins.
pub fn confidence_tier(sample_count: usize, fit_quality: f64, analysis_days: u32) -> Confidence {
    if sample_count >= HIGH_MIN_SAMPLES
        && fit_quality > HIGH_MIN_FIT
        && analysis_days >= HIGH_MIN_ANALYSIS_DAYS
    {
        Confidence::High
    } else if sample_count >= MEDIUM_MIN_SAMPLES && fit_quality > MEDIUM_MIN_FIT {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone, Utc};
    use test_case::test_case;

    fn samples(values: &[f64]) -> Vec<LevelSample> {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| LevelSample {
                timestamp: start + Duration::days(i as i64),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn days_remaining_from_percent() {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(62.0, Some(10_000.0), 7);

        let days = days_remaining(&context, Channel::Percent, Some(3.0), Some(300.0), &config).unwrap();

        assert_abs_diff_eq!(days, 62.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn days_remaining_falls_back_to_volume() {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(50.0, Some(100_000.0), 7).with_current_volume(50_000.0);

        // 0.05 %/day is below the projection floor, 50 units/day is not zero
        let days = days_remaining(&context, Channel::Percent, Some(0.05), Some(50.0), &config).unwrap();

        assert_abs_diff_eq!(days, 365.0);

        let days = days_remaining(&context, Channel::Percent, None, Some(500.0), &config).unwrap();
        assert_abs_diff_eq!(days, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn days_remaining_converts_current_percent_with_capacity() {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(40.0, Some(2_000.0), 7);

        let days = days_remaining(&context, Channel::Percent, None, Some(100.0), &config).unwrap();

        assert_abs_diff_eq!(days, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn days_remaining_on_volume_channel_ignores_stale_percent() {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(0.0, Some(10_000.0), 7).with_current_volume(6_800.0);

        let days =
            days_remaining(&context, Channel::Volume, Some(3.0), Some(300.0), &config).unwrap();

        assert_abs_diff_eq!(days, 68.0 / 3.0, epsilon = 1e-9);

        // Same context on the percent channel trusts the reported percent
        let days =
            days_remaining(&context, Channel::Percent, Some(3.0), Some(300.0), &config).unwrap();
        assert_abs_diff_eq!(days, 0.0);
    }

    #[test]
    fn days_remaining_needs_a_rate() {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(40.0, None, 7);

        assert_eq!(days_remaining(&context, Channel::Percent, Some(0.0), None, &config), None);
        assert_eq!(days_remaining(&context, Channel::Percent, Some(0.1), None, &config), None);
        assert_eq!(days_remaining(&context, Channel::Percent, None, Some(20.0), &config), None);
    }

    #[test_case(99.0, 0.2 => 365.0 ; "clamps above the ceiling")]
    #[test_case(-12.0, 3.0 => 0.0 ; "clamps negative to zero")]
    #[test_case(0.0, 3.0 => 0.0 ; "empty tank")]
    fn days_remaining_clamp(current: f64, rate: f64) -> f64 {
        let config = ConsumptionConfig::default();
        let context = TankContext::new(current, None, 7);
        days_remaining(&context, Channel::Percent, Some(rate), None, &config).unwrap()
    }

    #[test]
    fn trend_steady_decline_is_increasing_consumption() {
        let config = ConsumptionConfig::default();
        let window = samples(&[80.0, 77.0, 74.0, 71.0, 68.0, 65.0, 62.0]);

        // Halves average 77.0 and 66.5
        assert_eq!(classify_trend(&window, -3.0, &config), Trend::Increasing);
    }

    #[test]
    fn trend_small_slope_is_stable() {
        let config = ConsumptionConfig::default();
        let window = samples(&[80.0, 79.8, 79.7, 79.5]);

        assert_eq!(classify_trend(&window, -0.2, &config), Trend::Stable);
    }

    #[test]
    fn trend_recovering_level_is_decreasing_consumption() {
        let config = ConsumptionConfig::default();
        let window = samples(&[40.0, 42.0, 55.0, 60.0]);

        assert_eq!(classify_trend(&window, 7.0, &config), Trend::Decreasing);
    }

    #[test]
    fn trend_gentle_decline_is_stable() {
        let config = ConsumptionConfig::default();
        let window = samples(&[60.0, 59.0, 58.0, 57.0]);

        assert_eq!(classify_trend(&window, -1.0, &config), Trend::Stable);
    }

    #[test]
    fn trend_gentle_rise_is_unknown() {
        let config = ConsumptionConfig::default();
        let window = samples(&[57.0, 58.0, 59.0, 60.0]);

        assert_eq!(classify_trend(&window, 1.0, &config), Trend::Unknown);
    }

    #[test]
    fn trend_needs_three_samples() {
        let config = ConsumptionConfig::default();
        let window = samples(&[80.0, 60.0]);

        assert_eq!(classify_trend(&window, -20.0, &config), Trend::Unknown);
    }

    #[test_case(7, 0.9, 7 => Confidence::High ; "high")]
    #[test_case(7, 0.9, 6 => Confidence::Medium ; "short horizon caps at medium")]
    #[test_case(7, 0.7, 7 => Confidence::Medium ; "fit threshold is exclusive")]
    #[test_case(5, 0.6, 7 => Confidence::Medium ; "medium")]
    #[test_case(5, 0.5, 7 => Confidence::Low ; "medium fit threshold is exclusive")]
    #[test_case(4, 1.0, 30 => Confidence::Low ; "too few samples")]
    fn confidence_tiers(samples: usize, fit: f64, days: u32) -> Confidence {
        confidence_tier(samples, fit, days)
    }

    #[test]
    fn confidence_never_drops_with_more_samples() {
        for fit in [0.0, 0.55, 0.75, 1.0] {
            for days in [1, 7, 30] {
                let tiers: Vec<Confidence> = [4, 5, 7]
                    .iter()
                    .map(|n| confidence_tier(*n, fit, days))
                    .collect();
                assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "fit={fit} days={days}");
            }
        }
    }
}
