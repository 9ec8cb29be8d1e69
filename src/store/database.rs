use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{
    models::{AssetRecord, ConsumptionResult, Reading},
    Database,
};

use super::{AssetStore, ReadingStore};

#[async_trait]
impl ReadingStore for Database {
    async fn fetch_readings(&self, asset_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>> {
        self.get_readings_since(asset_id, since).await
    }
}

#[async_trait]
impl AssetStore for Database {
    async fn list_active_assets(&self) -> Result<Vec<AssetRecord>> {
        self.get_enabled_assets().await
    }

    async fn update_consumption(
        &self,
        asset_id: &str,
        result: &ConsumptionResult,
        computed_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.record_consumption(asset_id, result, computed_at).await
    }
}
