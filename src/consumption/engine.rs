use crate::consumption::config::ConsumptionConfig;
use crate::db::models::{Channel, ConsumptionResult, Reading, Strategy, TankContext, Trend};

use super::filter::{daily_decreases, drop_refills};
use super::quality::{extract_series, select_channel, LevelSample};
use super::rate::{convert_rate, linear_regression, summation_rate, RateEstimate};
use super::scoring::{classify_trend, confidence_tier, days_remaining};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Filtered samples plus the rate estimated from them.
struct RatedWindow {
    samples: Vec<LevelSample>,
    estimate: RateEstimate,
}

/// Main estimation function: turns one tank's reading window into a consumption result.
///
/// Never fails. Too few readings, no trustworthy channel, or a degenerate fit
/// all produce [`ConsumptionResult::empty`].
pub fn compute_consumption(
    readings: &[Reading],
    context: &TankContext,
    config: &ConsumptionConfig,
) -> ConsumptionResult {
    let strategy = config.strategy;

    // Edge case: sparse window
    if readings.len() < config.min_readings {
        log_debug!("only {} readings, need {}", readings.len(), config.min_readings);
        return ConsumptionResult::empty(readings.len(), strategy);
    }

    let mut sorted = readings.to_vec();
    sorted.sort_by_key(|r| r.timestamp);

    // Step 1: Pick the channel
    let capacity = context.usable_capacity();
    let Some(channel) = select_channel(&sorted, capacity) else {
        log_debug!("no reliable level channel across {} readings", sorted.len());
        return ConsumptionResult::empty(sorted.len(), strategy);
    };
    let series = extract_series(&sorted, channel);

    // Step 2 + 3: Filter events and estimate the rate
    let rated = match strategy {
        Strategy::Regression => rate_by_regression(series, channel, config),
        Strategy::Summation => rate_by_summation(series, channel, config),
    };
    let rated = match rated {
        Ok(rated) => rated,
        Err(sample_count) => return ConsumptionResult::empty(sample_count, strategy),
    };

    // Step 4: Project and score
    let (percent_per_day, volume_per_day) =
        convert_rate(rated.estimate.daily_rate, channel, capacity);
    let days_remaining =
        days_remaining(context, channel, percent_per_day, volume_per_day, config);
    let trend = classify_trend_as_percent(&rated, capacity, config);
    let sample_count = rated.samples.len();
    let fit_quality = rated.estimate.fit_quality;
    let confidence = confidence_tier(sample_count, fit_quality, context.analysis_days);

    ConsumptionResult {
        daily_consumption_volume: volume_per_day.filter(|v| v.is_finite()),
        daily_consumption_percent: percent_per_day.filter(|v| v.is_finite()),
        days_remaining,
        trend,
        confidence,
        sample_count,
        fit_quality: Some(fit_quality),
        channel: Some(channel),
        strategy,
    }
}

/// Trend thresholds are in percentage points, so a volume window is rescaled
/// by capacity before classification.
fn classify_trend_as_percent(
    rated: &RatedWindow,
    capacity: Option<f64>,
    config: &ConsumptionConfig,
) -> Trend {
    let slope = rated.estimate.slope;
    match (rated.estimate.channel, capacity) {
        (Channel::Volume, Some(capacity)) => {
            let scale = 100.0 / capacity;
            let scaled: Vec<LevelSample> = rated
                .samples
                .iter()
                .map(|s| LevelSample {
                    value: s.value * scale,
                    ..*s
                })
                .collect();
            classify_trend(&scaled, slope * scale, config)
        }
        _ => classify_trend(&rated.samples, slope, config),
    }
}

/// Outlier drop, then least squares. `Err` carries the sample count for the
/// empty result.
fn rate_by_regression(
    series: Vec<LevelSample>,
    channel: Channel,
    config: &ConsumptionConfig,
) -> Result<RatedWindow, usize> {
    let kept = drop_refills(&series, config.refill_threshold(channel));
    if kept.len() < config.min_readings {
        log_debug!(
            "refill filter left {} of {} readings",
            kept.len(),
            series.len()
        );
        return Err(kept.len());
    }

    let Some(fit) = linear_regression(&kept) else {
        log_debug!("regression undefined over {} readings", kept.len());
        return Err(kept.len());
    };

    Ok(RatedWindow {
        samples: kept,
        estimate: RateEstimate::from((channel, fit)),
    })
}

/// Day-bucket decrease summation. Keeps every sample.
fn rate_by_summation(
    series: Vec<LevelSample>,
    channel: Channel,
    config: &ConsumptionConfig,
) -> Result<RatedWindow, usize> {
    if series.len() < config.min_readings {
        log_debug!("only {} usable {} readings", series.len(), channel.as_str());
        return Err(series.len());
    }

    let daily = daily_decreases(&series, config.noise_floor(channel), config.day_offset());
    let Some(rate) = summation_rate(&daily) else {
        return Err(series.len());
    };

    Ok(RatedWindow {
        samples: series,
        estimate: RateEstimate::from((channel, rate)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Confidence;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn noon(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::days(day)
    }

    fn daily_percent(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::percent(noon(i as i64), *v))
            .collect()
    }

    fn daily_volume(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::volume(noon(i as i64), *v))
            .collect()
    }

    fn regression() -> ConsumptionConfig {
        ConsumptionConfig::with_strategy(Strategy::Regression)
    }

    fn summation() -> ConsumptionConfig {
        ConsumptionConfig::with_strategy(Strategy::Summation)
    }

    const STEADY: [f64; 7] = [80.0, 77.0, 74.0, 71.0, 68.0, 65.0, 62.0];

    #[test]
    fn steady_decline_regression() {
        let context = TankContext::new(62.0, Some(10_000.0), 7);

        let result = compute_consumption(&daily_percent(&STEADY), &context, &regression());

        assert_abs_diff_eq!(result.daily_consumption_percent.unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.daily_consumption_volume.unwrap(), 300.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.days_remaining.unwrap(), 62.0 / 3.0, epsilon = 1e-6);
        assert_eq!(result.trend, Trend::Increasing);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.sample_count, 7);
        assert_eq!(result.channel, Some(Channel::Percent));
        assert_eq!(result.strategy, Strategy::Regression);
    }

    #[test]
    fn steady_decline_summation() {
        let context = TankContext::new(62.0, Some(10_000.0), 7);

        let result = compute_consumption(&daily_percent(&STEADY), &context, &summation());

        assert_abs_diff_eq!(result.daily_consumption_percent.unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.days_remaining.unwrap(), 62.0 / 3.0, epsilon = 1e-6);
        // First day has no overnight predecessor, so coverage is 6 of 7 days
        assert_abs_diff_eq!(result.fit_quality.unwrap(), 6.0 / 7.0, epsilon = 1e-9);
        assert_eq!(result.trend, Trend::Increasing);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn refill_mid_window_summation_counts_only_declines() {
        let readings = daily_percent(&[80.0, 75.0, 70.0, 90.0, 85.0, 80.0, 75.0]);
        let context = TankContext::new(75.0, None, 7);

        let result = compute_consumption(&readings, &context, &summation());

        assert_abs_diff_eq!(result.daily_consumption_percent.unwrap(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.days_remaining.unwrap(), 15.0, epsilon = 1e-9);
        assert_eq!(result.daily_consumption_volume, None);
        assert_eq!(result.sample_count, 7);
        assert_eq!(result.trend, Trend::Decreasing);
    }

    #[test]
    fn refill_spike_does_not_move_regression_rate() {
        let context = TankContext::new(62.0, Some(10_000.0), 7);
        let clean = daily_percent(&STEADY);
        let mut with_spike = clean.clone();
        with_spike.push(Reading::percent(noon(3) + Duration::hours(6), 86.0));

        let baseline = compute_consumption(&clean, &context, &regression());
        let spiked = compute_consumption(&with_spike, &context, &regression());

        assert_abs_diff_eq!(
            spiked.daily_consumption_percent.unwrap(),
            baseline.daily_consumption_percent.unwrap(),
            epsilon = 1e-9
        );
        assert_eq!(spiked.sample_count, baseline.sample_count);
    }

    #[test]
    fn sub_noise_jitter_is_zero_consumption() {
        let readings = daily_percent(&[80.0, 79.7, 79.5, 79.8, 79.6, 79.3]);
        let context = TankContext::new(79.3, None, 7);

        let result = compute_consumption(&readings, &context, &summation());

        assert_eq!(result.daily_consumption_percent, Some(0.0));
        assert_eq!(result.days_remaining, None);
        assert_eq!(result.fit_quality, Some(0.0));
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn sparse_window_is_empty() {
        let readings = daily_percent(&[80.0, 77.0]);
        let context = TankContext::new(77.0, Some(10_000.0), 7);

        for config in [regression(), summation()] {
            let result = compute_consumption(&readings, &context, &config);
            assert!(result.is_empty());
            assert_eq!(result.days_remaining, None);
            assert_eq!(result.fit_quality, None);
            assert_eq!(result.trend, Trend::Unknown);
            assert_eq!(result.confidence, Confidence::Low);
            assert_eq!(result.sample_count, 2);
        }
    }

    #[test]
    fn unreliable_channels_are_empty() {
        let readings: Vec<Reading> = (0..5)
            .map(|i| Reading {
                timestamp: noon(i),
                level_percent: Some(0.0),
                level_volume: None,
            })
            .collect();
        let context = TankContext::new(50.0, Some(10_000.0), 7);

        let result = compute_consumption(&readings, &context, &summation());

        assert!(result.is_empty());
        assert_eq!(result.sample_count, 5);
        assert_eq!(result.channel, None);
    }

    #[test]
    fn refill_filter_collapse_is_empty() {
        // Every reading after the first is a jump above the anchor
        let readings = daily_percent(&[20.0, 45.0, 70.0, 95.0]);
        let context = TankContext::new(95.0, None, 7);

        let result = compute_consumption(&readings, &context, &regression());

        assert!(result.is_empty());
        assert_eq!(result.sample_count, 1);
    }

    #[test]
    fn same_instant_readings_are_empty_not_nan() {
        let readings: Vec<Reading> = [60.0, 59.0, 58.0]
            .iter()
            .map(|v| Reading::percent(noon(0), *v))
            .collect();
        let context = TankContext::new(58.0, None, 7);

        let result = compute_consumption(&readings, &context, &regression());

        assert!(result.is_empty());
        assert_eq!(result.sample_count, 3);
    }

    #[test]
    fn volume_fallback_derives_percent() {
        let readings: Vec<Reading> = [8000.0, 7700.0, 7400.0, 7100.0, 6800.0]
            .iter()
            .enumerate()
            .map(|(i, v)| Reading {
                timestamp: noon(i as i64),
                level_percent: Some(0.0),
                level_volume: Some(*v),
            })
            .collect();
        let context = TankContext::new(68.0, Some(10_000.0), 7).with_current_volume(6800.0);

        let result = compute_consumption(&readings, &context, &regression());

        assert_eq!(result.channel, Some(Channel::Volume));
        assert_abs_diff_eq!(result.daily_consumption_volume.unwrap(), 300.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.daily_consumption_percent.unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.days_remaining.unwrap(), 68.0 / 3.0, epsilon = 1e-6);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn unsorted_input_matches_sorted() {
        let context = TankContext::new(62.0, None, 7);
        let sorted = daily_percent(&STEADY);
        let mut shuffled = sorted.clone();
        shuffled.swap(0, 5);
        shuffled.swap(2, 6);

        for config in [regression(), summation()] {
            assert_eq!(
                compute_consumption(&shuffled, &context, &config),
                compute_consumption(&sorted, &context, &config)
            );
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let readings = daily_percent(&[80.0, 75.0, 70.0, 90.0, 85.0, 80.0, 75.0]);
        let context = TankContext::new(75.0, Some(5_000.0), 7);

        for config in [regression(), summation()] {
            let first = compute_consumption(&readings, &context, &config);
            let second = compute_consumption(&readings, &context, &config);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn days_remaining_is_clamped() {
        let slow: Vec<f64> = (0..7).map(|i| 80.0 - 0.2 * i as f64).collect();
        let readings = daily_percent(&slow);

        let full = compute_consumption(&readings, &TankContext::new(90.0, None, 7), &regression());
        assert_eq!(full.days_remaining, Some(365.0));

        let bogus = compute_consumption(&readings, &TankContext::new(-5.0, None, 7), &regression());
        assert_eq!(bogus.days_remaining, Some(0.0));
    }

    #[test]
    fn volume_channel_projects_from_current_volume() {
        // Percent sensor is stuck at zero, so the reported current percent is too
        let readings: Vec<Reading> = [8000.0, 7700.0, 7400.0, 7100.0, 6800.0]
            .iter()
            .enumerate()
            .map(|(i, v)| Reading {
                timestamp: noon(i as i64),
                level_percent: Some(0.0),
                level_volume: Some(*v),
            })
            .collect();
        let context = TankContext::new(0.0, Some(10_000.0), 7).with_current_volume(6800.0);

        for config in [regression(), summation()] {
            let result = compute_consumption(&readings, &context, &config);

            assert_eq!(result.channel, Some(Channel::Volume));
            assert_abs_diff_eq!(result.daily_consumption_percent.unwrap(), 3.0, epsilon = 1e-9);
            assert_abs_diff_eq!(result.days_remaining.unwrap(), 68.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn trend_matches_across_channels() {
        let context = TankContext::new(80.0, Some(10_000.0), 7);

        // 10 units/day is 0.1 %/day; 300 units/day is 3 %/day
        for (per_day_volume, expected) in [(10.0, Trend::Stable), (300.0, Trend::Increasing)] {
            let volumes: Vec<f64> = (0..7).map(|i| 8000.0 - per_day_volume * i as f64).collect();
            let percents: Vec<f64> = volumes.iter().map(|v| v / 100.0).collect();

            let by_volume = compute_consumption(&daily_volume(&volumes), &context, &regression());
            let by_percent = compute_consumption(&daily_percent(&percents), &context, &regression());

            assert_eq!(by_volume.channel, Some(Channel::Volume));
            assert_eq!(by_percent.channel, Some(Channel::Percent));
            assert_eq!(by_volume.trend, expected);
            assert_eq!(by_percent.trend, expected);
        }
    }

    #[test]
    fn volume_jitter_below_noise_floor_is_zero_consumption() {
        // Every step is 3 units or less, under the 5 unit volume floor
        let readings = daily_volume(&[8000.0, 7997.0, 7995.0, 7998.0, 7996.0, 7993.0]);
        let context = TankContext::new(79.93, Some(10_000.0), 7).with_current_volume(7993.0);

        let result = compute_consumption(&readings, &context, &summation());

        assert_eq!(result.channel, Some(Channel::Volume));
        assert_eq!(result.daily_consumption_volume, Some(0.0));
        assert_eq!(result.daily_consumption_percent, Some(0.0));
        assert_eq!(result.days_remaining, None);
        assert_eq!(result.fit_quality, Some(0.0));
    }

    #[test]
    fn volume_refill_spike_uses_volume_threshold() {
        let context = TankContext::new(62.0, Some(10_000.0), 7);
        let clean = daily_volume(&[8000.0, 7700.0, 7400.0, 7100.0, 6800.0, 6500.0, 6200.0]);
        let jump_at = noon(3) + Duration::hours(6);

        // +300 over the last kept 7100 is above the 250 unit threshold
        let mut refill = clean.clone();
        refill.push(Reading::volume(jump_at, 7400.0));
        // +200 is kept
        let mut bump = clean.clone();
        bump.push(Reading::volume(jump_at, 7300.0));

        let baseline = compute_consumption(&clean, &context, &regression());
        let refilled = compute_consumption(&refill, &context, &regression());
        let bumped = compute_consumption(&bump, &context, &regression());

        assert_abs_diff_eq!(
            refilled.daily_consumption_volume.unwrap(),
            baseline.daily_consumption_volume.unwrap(),
            epsilon = 1e-6
        );
        assert_eq!(refilled.sample_count, 7);
        assert_eq!(bumped.sample_count, 8);
    }
}
