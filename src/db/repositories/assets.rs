use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{
        format_timestamp, parse_confidence, parse_optional_datetime, parse_trend, to_i64, to_u32,
    },
    models::{AssetRecord, ConsumptionResult},
};

const ASSET_COLUMNS: &str = "id, name, capacity, current_level_percent, current_level_volume,
    analysis_days, enabled, daily_consumption_percent, daily_consumption_volume,
    days_remaining, consumption_trend, consumption_confidence, consumption_computed_at";

fn row_to_asset(row: &Row) -> Result<AssetRecord> {
    let analysis_days: Option<i64> = row.get("analysis_days")?;
    let trend: Option<String> = row.get("consumption_trend")?;
    let confidence: Option<String> = row.get("consumption_confidence")?;
    let computed_at: Option<String> = row.get("consumption_computed_at")?;

    Ok(AssetRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        capacity: row.get("capacity")?,
        current_level_percent: row.get("current_level_percent")?,
        current_level_volume: row.get("current_level_volume")?,
        analysis_days: analysis_days
            .map(|days| to_u32(days, "analysis_days"))
            .transpose()?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        daily_consumption_percent: row.get("daily_consumption_percent")?,
        daily_consumption_volume: row.get("daily_consumption_volume")?,
        days_remaining: row.get("days_remaining")?,
        consumption_trend: trend.as_deref().map(parse_trend).transpose()?,
        consumption_confidence: confidence.as_deref().map(parse_confidence).transpose()?,
        consumption_computed_at: parse_optional_datetime(computed_at, "consumption_computed_at")?,
    })
}

impl Database {
    /// Insert or replace the descriptive fields and current level of an asset.
    /// Persisted consumption figures are left untouched.
    pub async fn upsert_asset(&self, asset: &AssetRecord) -> Result<()> {
        let record = asset.clone();
        self.execute(move |conn| {
            let now = format_timestamp(&Utc::now());
            conn.execute(
                "INSERT INTO assets (
                    id, name, capacity, current_level_percent, current_level_volume,
                    analysis_days, enabled, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    capacity = excluded.capacity,
                    current_level_percent = excluded.current_level_percent,
                    current_level_volume = excluded.current_level_volume,
                    analysis_days = excluded.analysis_days,
                    enabled = excluded.enabled,
                    updated_at = excluded.updated_at",
                params![
                    record.id,
                    record.name,
                    record.capacity,
                    record.current_level_percent,
                    record.current_level_volume,
                    record.analysis_days.map(i64::from),
                    record.enabled as i64,
                    now,
                ],
            )
            .with_context(|| format!("failed to upsert asset {}", record.id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_asset(&self, asset_id: &str) -> Result<Option<AssetRecord>> {
        let asset_id = asset_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![asset_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_asset(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Enabled assets, ordered by id.
    pub async fn get_enabled_assets(&self) -> Result<Vec<AssetRecord>> {
        self.execute(|conn| {
            let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE enabled = 1 ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut assets = Vec::new();
            while let Some(row) = rows.next()? {
                assets.push(row_to_asset(row)?);
            }
            Ok(assets)
        })
        .await
    }

    pub async fn set_asset_enabled(&self, asset_id: &str, enabled: bool) -> Result<bool> {
        let asset_id = asset_id.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE assets SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
                params![enabled as i64, format_timestamp(&Utc::now()), asset_id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Write the latest estimate onto the asset row and append it to the
    /// history, atomically. Returns `false` when the asset doesn't exist.
    pub async fn record_consumption(
        &self,
        asset_id: &str,
        result: &ConsumptionResult,
        computed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let asset_id = asset_id.to_string();
        let result = result.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let computed_at = format_timestamp(&computed_at);
            let sample_count = to_i64(result.sample_count, "sample_count")?;

            let changed = tx
                .execute(
                    "UPDATE assets
                     SET daily_consumption_percent = ?1,
                         daily_consumption_volume = ?2,
                         days_remaining = ?3,
                         consumption_trend = ?4,
                         consumption_confidence = ?5,
                         consumption_computed_at = ?6,
                         updated_at = ?6
                     WHERE id = ?7",
                    params![
                        result.daily_consumption_percent,
                        result.daily_consumption_volume,
                        result.days_remaining,
                        result.trend.as_str(),
                        result.confidence.as_str(),
                        computed_at,
                        asset_id,
                    ],
                )
                .with_context(|| format!("failed to update consumption for asset {asset_id}"))?;

            if changed == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO consumption_history (
                    id, asset_id, computed_at, strategy, channel,
                    daily_consumption_percent, daily_consumption_volume, days_remaining,
                    trend, confidence, sample_count, fit_quality
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    Uuid::new_v4().to_string(),
                    asset_id,
                    computed_at,
                    result.strategy.as_str(),
                    result.channel.map(|c| c.as_str()),
                    result.daily_consumption_percent,
                    result.daily_consumption_volume,
                    result.days_remaining,
                    result.trend.as_str(),
                    result.confidence.as_str(),
                    sample_count,
                    result.fit_quality,
                ],
            )
            .with_context(|| format!("failed to append consumption history for asset {asset_id}"))?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }
}
