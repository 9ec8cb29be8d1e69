mod scheduler;
mod service;

pub use scheduler::recalculation_loop;
pub use service::{BatchSummary, ConsumptionService, DEFAULT_MAX_CONCURRENCY};
