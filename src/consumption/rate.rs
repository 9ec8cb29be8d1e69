use crate::db::models::Channel;

use super::filter::DailyDecreases;
use super::quality::LevelSample;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Below this the regression denominator is treated as zero.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Least-squares fit of level against elapsed days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionFit {
    /// Level units per day; negative while the tank drains.
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Average daily decrease over the days that recorded any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummationRate {
    pub daily_rate: f64,
    /// `days_with_data / total_days`
    pub day_coverage: f64,
}

/// Rate in the active channel's units, before conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEstimate {
    pub channel: Channel,
    /// Non-negative consumption per day.
    pub daily_rate: f64,
    /// Signed level change per day, used for trend classification.
    pub slope: f64,
    /// Unitless in `[0, 1]`.
    pub fit_quality: f64,
}

impl From<(Channel, RegressionFit)> for RateEstimate {
    fn from((channel, fit): (Channel, RegressionFit)) -> Self {
        Self {
            channel,
            daily_rate: fit.slope.abs(),
            slope: fit.slope,
            fit_quality: fit.r_squared,
        }
    }
}

impl From<(Channel, SummationRate)> for RateEstimate {
    fn from((channel, rate): (Channel, SummationRate)) -> Self {
        Self {
            channel,
            daily_rate: rate.daily_rate,
            slope: -rate.daily_rate,
            fit_quality: rate.day_coverage,
        }
    }
}

/// Fit `level = intercept + slope * days_since_first`. Returns `None` when the
/// fit is undefined: fewer than two samples, or every sample at the same instant.
pub fn linear_regression(samples: &[LevelSample]) -> Option<RegressionFit> {
    let first = samples.first()?;
    if samples.len() < 2 {
        return None;
    }

    let points: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| {
            let days =
                (s.timestamp - first.timestamp).num_milliseconds() as f64 / MILLIS_PER_DAY;
            (days, s.value)
        })
        .collect();

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    if !sxx.is_finite() || sxx <= DEGENERATE_EPSILON {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = points.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();

    // A flat series is explained perfectly by a flat line
    let r_squared = if ss_tot <= DEGENERATE_EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    if !slope.is_finite() || !intercept.is_finite() || !r_squared.is_finite() {
        return None;
    }

    Some(RegressionFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Average the per-day totals. `None` only when no day was seen at all.
pub fn summation_rate(daily: &DailyDecreases) -> Option<SummationRate> {
    let total_days = daily.total_days();
    if total_days == 0 {
        return None;
    }

    let days_with_data = daily.days_with_data();
    let daily_rate = if days_with_data > 0 {
        daily.consumed() / days_with_data as f64
    } else {
        0.0
    };

    Some(SummationRate {
        daily_rate,
        day_coverage: days_with_data as f64 / total_days as f64,
    })
}

/// Express a rate in both percent and volume terms. The side that needs an
/// unknown capacity stays `None`.
///
/// Returns `(percent_per_day, volume_per_day)`.
pub fn convert_rate(
    daily_rate: f64,
    channel: Channel,
    capacity: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    let capacity = capacity.filter(|c| c.is_finite() && *c > 0.0);
    match channel {
        Channel::Percent => (Some(daily_rate), capacity.map(|c| daily_rate / 100.0 * c)),
        Channel::Volume => (capacity.map(|c| daily_rate / c * 100.0), Some(daily_rate)),
    }
}
