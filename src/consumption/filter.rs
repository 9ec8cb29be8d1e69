use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};

use super::quality::LevelSample;

/// Consumption accumulated for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// Output of the day-bucket pass: every day seen, with its accumulated decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyDecreases {
    pub days: Vec<DayTotal>,
}

impl DailyDecreases {
    pub fn total_days(&self) -> usize {
        self.days.len()
    }

    pub fn days_with_data(&self) -> usize {
        self.days.iter().filter(|d| d.total > 0.0).count()
    }

    pub fn consumed(&self) -> f64 {
        self.days.iter().filter(|d| d.total > 0.0).map(|d| d.total).sum()
    }
}

/// Drop readings that jump above the last kept reading by more than
/// `refill_threshold`. Dropped readings never anchor later comparisons.
///
/// Expects samples sorted ascending by timestamp.
pub fn drop_refills(samples: &[LevelSample], refill_threshold: f64) -> Vec<LevelSample> {
    let mut kept: Vec<LevelSample> = Vec::with_capacity(samples.len());

    for sample in samples {
        match kept.last() {
            Some(last) if sample.value - last.value > refill_threshold => continue,
            _ => kept.push(*sample),
        }
    }

    kept
}

/// Bucket samples by calendar day and sum the decreases that clear the noise
/// floor, including the overnight step from the previous day's last reading.
/// Increases never count, which is what keeps deliveries out of the total.
///
/// Expects samples sorted ascending by timestamp.
pub fn daily_decreases(
    samples: &[LevelSample],
    noise_floor: f64,
    day_offset: FixedOffset,
) -> DailyDecreases {
    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        let date = sample.timestamp.with_timezone(&day_offset).date_naive();
        buckets.entry(date).or_default().push(sample.value);
    }

    let counted = |older: f64, newer: f64| {
        let delta = older - newer;
        if delta > noise_floor && delta > 0.0 {
            delta
        } else {
            0.0
        }
    };

    let mut days = Vec::with_capacity(buckets.len());
    let mut previous_last: Option<f64> = None;

    for (date, values) in &buckets {
        let mut total: f64 = values.windows(2).map(|pair| counted(pair[0], pair[1])).sum();

        if let (Some(prev), Some(first)) = (previous_last, values.first()) {
            total += counted(prev, *first);
        }

        previous_last = values.last().copied();
        days.push(DayTotal { date: *date, total });
    }

    DailyDecreases { days }
}
