use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    consumption::{compute_consumption, ConsumptionConfig},
    db::models::{AssetRecord, ConsumptionResult, TankContext},
    store::{AssetStore, ReadingStore},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Counters for one `recalculate_all` run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

enum AssetOutcome {
    Updated,
    Failed,
}

/// Runs the engine against injected stores: fetch, estimate, persist.
pub struct ConsumptionService<R, A> {
    readings: Arc<R>,
    assets: Arc<A>,
    config: Arc<ConsumptionConfig>,
    max_concurrency: usize,
}

impl<R, A> Clone for ConsumptionService<R, A> {
    fn clone(&self) -> Self {
        Self {
            readings: Arc::clone(&self.readings),
            assets: Arc::clone(&self.assets),
            config: Arc::clone(&self.config),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<R, A> ConsumptionService<R, A>
where
    R: ReadingStore + 'static,
    A: AssetStore + 'static,
{
    pub fn new(readings: Arc<R>, assets: Arc<A>, config: ConsumptionConfig) -> Self {
        Self {
            readings,
            assets,
            config: Arc::new(config),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Upper bound on assets processed at once. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn config(&self) -> &ConsumptionConfig {
        &self.config
    }

    /// Fetch the asset's window ending now and run the engine over it.
    ///
    /// `Err` means the reading store failed; a window without a usable
    /// signal is an `Ok` low-confidence result.
    pub async fn estimate_consumption(
        &self,
        asset_id: &str,
        context: &TankContext,
    ) -> Result<ConsumptionResult> {
        self.estimate_consumption_at(asset_id, context, Utc::now())
            .await
    }

    pub async fn estimate_consumption_at(
        &self,
        asset_id: &str,
        context: &TankContext,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionResult> {
        let since = now - Duration::days(i64::from(context.analysis_days));
        let readings = self
            .readings
            .fetch_readings(asset_id, since)
            .await
            .with_context(|| format!("failed to fetch readings for asset {asset_id}"))?;

        Ok(compute_consumption(&readings, context, &self.config))
    }

    /// Persist a result against its asset. `Ok(false)` when the asset is gone.
    pub async fn apply_consumption(&self, asset_id: &str, result: &ConsumptionResult) -> Result<bool> {
        self.apply_consumption_at(asset_id, result, Utc::now())
            .await
    }

    async fn apply_consumption_at(
        &self,
        asset_id: &str,
        result: &ConsumptionResult,
        computed_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.assets
            .update_consumption(asset_id, result, computed_at)
            .await
            .with_context(|| format!("failed to persist consumption for asset {asset_id}"))
    }

    /// Estimate and persist every active asset. One asset failing never stops
    /// the others; only failing to list assets is an error.
    pub async fn recalculate_all(&self) -> Result<BatchSummary> {
        let now = Utc::now();
        let assets = self
            .assets
            .list_active_assets()
            .await
            .context("failed to list active assets")?;

        log_info!(
            "Recalculating consumption for {} assets (strategy={}, concurrency={})",
            assets.len(),
            self.config.strategy.as_str(),
            self.max_concurrency
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for asset in assets {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|err| anyhow!("batch semaphore closed: {err}"))?;
            let service = self.clone();
            tasks.spawn(async move {
                let outcome = service.recalculate_asset(&asset, now).await;
                drop(permit);
                outcome
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            summary.processed += 1;
            match joined {
                Ok(AssetOutcome::Updated) => summary.updated += 1,
                Ok(AssetOutcome::Failed) => summary.failed += 1,
                Err(join_err) => {
                    log_error!("consumption task aborted: {join_err}");
                    summary.failed += 1;
                }
            }
        }

        log_info!(
            "Consumption recalculation done: processed={}, updated={}, failed={}",
            summary.processed,
            summary.updated,
            summary.failed
        );

        Ok(summary)
    }

    async fn recalculate_asset(&self, asset: &AssetRecord, now: DateTime<Utc>) -> AssetOutcome {
        let context = asset.tank_context(self.config.default_analysis_days);

        let result = match self.estimate_consumption_at(&asset.id, &context, now).await {
            Ok(result) => result,
            Err(err) => {
                log_warn!("skipping asset {}: {err:#}", asset.id);
                return AssetOutcome::Failed;
            }
        };

        match self.apply_consumption_at(&asset.id, &result, now).await {
            Ok(true) => AssetOutcome::Updated,
            Ok(false) => {
                log_warn!("asset {} disappeared before its result was saved", asset.id);
                AssetOutcome::Failed
            }
            Err(err) => {
                log_error!("{err:#}");
                AssetOutcome::Failed
            }
        }
    }
}
