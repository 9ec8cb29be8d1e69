use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::store::{AssetStore, ReadingStore};

use super::service::ConsumptionService;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Recalculate every active asset on a fixed interval until cancelled.
/// The first pass runs immediately.
pub async fn recalculation_loop<R, A>(
    service: ConsumptionService<R, A>,
    interval: Duration,
    cancel_token: CancellationToken,
) where
    R: ReadingStore + 'static,
    A: AssetStore + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("consumption loop started (every {}s)", interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = service.recalculate_all().await {
                    log_error!("consumption recalculation failed: {err:#}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("consumption loop shutting down");
                break;
            }
        }
    }
}
