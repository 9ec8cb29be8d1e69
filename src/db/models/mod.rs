pub mod asset;
pub mod consumption;
pub mod reading;

pub use asset::AssetRecord;
pub use consumption::{
    Channel, Confidence, ConsumptionResult, ConsumptionSnapshot, Strategy, TankContext, Trend,
};
pub use reading::Reading;
