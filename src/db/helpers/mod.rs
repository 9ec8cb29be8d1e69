use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::{Channel, Confidence, Strategy, Trend};

/// Fixed-width UTC form, so lexicographic order in SQLite is chronological order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn to_usize(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_i64(value: usize, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{field} too large to store: {value}"))
}

pub fn parse_trend(value: &str) -> Result<Trend> {
    match value {
        "increasing" => Ok(Trend::Increasing),
        "decreasing" => Ok(Trend::Decreasing),
        "stable" => Ok(Trend::Stable),
        "unknown" => Ok(Trend::Unknown),
        other => Err(anyhow!("unknown trend {other}")),
    }
}

pub fn parse_confidence(value: &str) -> Result<Confidence> {
    match value {
        "high" => Ok(Confidence::High),
        "medium" => Ok(Confidence::Medium),
        "low" => Ok(Confidence::Low),
        other => Err(anyhow!("unknown confidence {other}")),
    }
}

pub fn parse_strategy(value: &str) -> Result<Strategy> {
    match value {
        "regression" => Ok(Strategy::Regression),
        "summation" => Ok(Strategy::Summation),
        other => Err(anyhow!("unknown strategy {other}")),
    }
}

pub fn parse_channel(value: &str) -> Result<Channel> {
    match value {
        "percent" => Ok(Channel::Percent),
        "volume" => Ok(Channel::Volume),
        other => Err(anyhow!("unknown channel {other}")),
    }
}
