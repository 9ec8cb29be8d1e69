//! Collaborator seams for the consumption service.
//!
//! The engine never talks to storage itself. The service fetches readings
//! through a [`ReadingStore`] and persists results through an [`AssetStore`],
//! both injected at construction.

mod database;
mod memory;

pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{AssetRecord, ConsumptionResult, Reading};

/// Read-only source of level readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Readings for `asset_id` taken at or after `since`. Order is not
    /// guaranteed; the engine sorts.
    async fn fetch_readings(&self, asset_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>>;
}

/// Registry of monitored tanks and sink for their consumption estimates.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Assets that are active and not disabled.
    async fn list_active_assets(&self) -> Result<Vec<AssetRecord>>;

    /// Persist an estimate. `Ok(false)` means the asset no longer exists.
    async fn update_consumption(
        &self,
        asset_id: &str,
        result: &ConsumptionResult,
        computed_at: DateTime<Utc>,
    ) -> Result<bool>;
}
