use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        parse_channel, parse_confidence, parse_datetime, parse_strategy, parse_trend, to_i64,
        to_usize,
    },
    models::{ConsumptionResult, ConsumptionSnapshot},
};

fn row_to_snapshot(row: &Row) -> Result<ConsumptionSnapshot> {
    let computed_at: String = row.get("computed_at")?;
    let strategy: String = row.get("strategy")?;
    let channel: Option<String> = row.get("channel")?;
    let trend: String = row.get("trend")?;
    let confidence: String = row.get("confidence")?;
    let sample_count: i64 = row.get("sample_count")?;

    Ok(ConsumptionSnapshot {
        id: row.get("id")?,
        asset_id: row.get("asset_id")?,
        computed_at: parse_datetime(&computed_at, "computed_at")?,
        result: ConsumptionResult {
            daily_consumption_volume: row.get("daily_consumption_volume")?,
            daily_consumption_percent: row.get("daily_consumption_percent")?,
            days_remaining: row.get("days_remaining")?,
            trend: parse_trend(&trend)?,
            confidence: parse_confidence(&confidence)?,
            sample_count: to_usize(sample_count, "sample_count")?,
            fit_quality: row.get("fit_quality")?,
            channel: channel.as_deref().map(parse_channel).transpose()?,
            strategy: parse_strategy(&strategy)?,
        },
    })
}

impl Database {
    /// Most recent estimates for an asset, newest first.
    pub async fn get_consumption_history(
        &self,
        asset_id: &str,
        limit: usize,
    ) -> Result<Vec<ConsumptionSnapshot>> {
        let asset_id = asset_id.to_string();
        let limit = to_i64(limit, "limit")?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    asset_id,
                    computed_at,
                    strategy,
                    channel,
                    daily_consumption_percent,
                    daily_consumption_volume,
                    days_remaining,
                    trend,
                    confidence,
                    sample_count,
                    fit_quality
                FROM consumption_history
                WHERE asset_id = ?1
                ORDER BY computed_at DESC
                LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![asset_id, limit])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(row_to_snapshot(row)?);
            }

            Ok(snapshots)
        })
        .await
    }
}
