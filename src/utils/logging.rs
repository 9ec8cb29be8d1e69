//! Per-module switchable logging.
//!
//! Each module that logs declares an `ENABLE_LOGS` const and the macros check
//! it before forwarding to `log`. The engine keeps its empty-result reasons at
//! debug level; the batch service reports per-asset failures and run totals.
//!
//! ```ignore
//! // Set to true to enable verbose logging in this module
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("only {} readings, need {}", readings.len(), config.min_readings);
//! log_warn!("skipping asset {}: {err:#}", asset.id);
//! ```

/// Debug line, used for why an estimate came back empty.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info line, used for batch start and summary.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn line, used for assets skipped by a run.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error line, used for store writes that failed and aborted tasks.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
