pub mod config;
pub mod engine;
pub mod filter;
pub mod quality;
pub mod rate;
pub mod scoring;

pub use config::ConsumptionConfig;
pub use engine::compute_consumption;
