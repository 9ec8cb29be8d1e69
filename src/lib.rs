pub mod batch;
pub mod consumption;
pub mod db;
pub mod settings;
pub mod store;
mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

pub use batch::{recalculation_loop, BatchSummary, ConsumptionService};
pub use consumption::{compute_consumption, ConsumptionConfig};
pub use db::models::{
    AssetRecord, Channel, Confidence, ConsumptionResult, ConsumptionSnapshot, Reading, Strategy,
    TankContext, Trend,
};
pub use db::Database;
pub use settings::{BatchSettings, EngineSettings, SettingsStore};
pub use store::{AssetStore, MemoryStore, ReadingStore};

pub const DB_PATH_ENV: &str = "TANKWATCH_DB";
pub const SETTINGS_PATH_ENV: &str = "TANKWATCH_SETTINGS";

const DEFAULT_DB_PATH: &str = "tankwatch.sqlite3";
const DEFAULT_SETTINGS_PATH: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One pass over every active asset, summary printed as JSON.
    Once,
    /// Recalculate on the configured interval until Ctrl-C.
    Watch,
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

pub async fn run(mode: RunMode) -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("tankwatch starting up...");

    let settings = SettingsStore::new(path_from_env(SETTINGS_PATH_ENV, DEFAULT_SETTINGS_PATH))?;
    let engine = settings.snapshot();

    let database = Arc::new(Database::new(path_from_env(DB_PATH_ENV, DEFAULT_DB_PATH))?);
    let service = ConsumptionService::new(Arc::clone(&database), database, engine.consumption)
        .with_max_concurrency(engine.batch.max_concurrency);

    match mode {
        RunMode::Once => {
            let summary = service.recalculate_all().await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        RunMode::Watch => {
            let cancel_token = CancellationToken::new();
            let worker = tokio::spawn(recalculation_loop(
                service,
                engine.batch.interval(),
                cancel_token.clone(),
            ));

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            log::info!("shutdown requested");
            cancel_token.cancel();
            worker.await.context("consumption loop panicked")?;
        }
    }

    Ok(())
}
