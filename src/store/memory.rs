use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{AssetRecord, ConsumptionResult, Reading};

use super::{AssetStore, ReadingStore};

#[derive(Default)]
struct MemoryState {
    assets: BTreeMap<String, AssetRecord>,
    readings: HashMap<String, Vec<Reading>>,
    applied: HashMap<String, Vec<ConsumptionResult>>,
    failing_fetch: HashSet<String>,
    failing_update: HashSet<String>,
    vanishing: HashSet<String>,
}

/// In-process store for tests and dry runs. Failures can be injected per
/// asset to exercise the batch driver's isolation.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_asset(&self, asset: AssetRecord) {
        self.lock().assets.insert(asset.id.clone(), asset);
    }

    pub fn add_readings(&self, asset_id: &str, readings: impl IntoIterator<Item = Reading>) {
        self.lock()
            .readings
            .entry(asset_id.to_string())
            .or_default()
            .extend(readings);
    }

    pub fn fail_fetch_for(&self, asset_id: &str) {
        self.lock().failing_fetch.insert(asset_id.to_string());
    }

    pub fn fail_update_for(&self, asset_id: &str) {
        self.lock().failing_update.insert(asset_id.to_string());
    }

    /// Delete the asset when its update arrives, as if it was removed after
    /// being listed. The update then reports `Ok(false)`.
    pub fn remove_before_update(&self, asset_id: &str) {
        self.lock().vanishing.insert(asset_id.to_string());
    }

    pub fn asset(&self, asset_id: &str) -> Option<AssetRecord> {
        self.lock().assets.get(asset_id).cloned()
    }

    /// Results persisted for an asset, oldest first.
    pub fn applied_results(&self, asset_id: &str) -> Vec<ConsumptionResult> {
        self.lock()
            .applied
            .get(asset_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn fetch_readings(&self, asset_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>> {
        let state = self.lock();
        if state.failing_fetch.contains(asset_id) {
            bail!("reading store unavailable for asset {asset_id}");
        }

        Ok(state
            .readings
            .get(asset_id)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn list_active_assets(&self) -> Result<Vec<AssetRecord>> {
        Ok(self
            .lock()
            .assets
            .values()
            .filter(|asset| asset.enabled)
            .cloned()
            .collect())
    }

    async fn update_consumption(
        &self,
        asset_id: &str,
        result: &ConsumptionResult,
        computed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock();
        if state.failing_update.contains(asset_id) {
            bail!("asset store rejected update for asset {asset_id}");
        }

        if state.vanishing.remove(asset_id) {
            state.assets.remove(asset_id);
        }

        let Some(asset) = state.assets.get_mut(asset_id) else {
            return Ok(false);
        };
        asset.apply_consumption(result, computed_at);

        state
            .applied
            .entry(asset_id.to_string())
            .or_default()
            .push(result.clone());
        Ok(true)
    }
}
