use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime},
    models::Reading,
};

fn row_to_reading(row: &Row) -> Result<Reading> {
    let timestamp: String = row.get("timestamp")?;

    Ok(Reading {
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        level_percent: row.get("level_percent")?,
        level_volume: row.get("level_volume")?,
    })
}

impl Database {
    pub async fn insert_reading(&self, asset_id: &str, reading: &Reading) -> Result<()> {
        self.insert_readings(asset_id, std::slice::from_ref(reading))
            .await
    }

    /// Batch insert readings for one asset in a single transaction.
    pub async fn insert_readings(&self, asset_id: &str, readings: &[Reading]) -> Result<()> {
        let asset_id = asset_id.to_string();
        let readings = readings.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            for reading in &readings {
                tx.execute(
                    "INSERT INTO tank_readings (asset_id, timestamp, level_percent, level_volume)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        asset_id,
                        format_timestamp(&reading.timestamp),
                        reading.level_percent,
                        reading.level_volume,
                    ],
                )
                .with_context(|| format!("failed to insert reading for asset {asset_id}"))?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Readings for an asset at or after `since`, ordered by timestamp.
    pub async fn get_readings_since(
        &self,
        asset_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let asset_id = asset_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, level_percent, level_volume
                 FROM tank_readings
                 WHERE asset_id = ?1 AND timestamp >= ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![asset_id, format_timestamp(&since)])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }

            Ok(readings)
        })
        .await
    }
}
