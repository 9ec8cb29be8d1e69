pub mod assets;
pub mod consumption_history;
pub mod readings;
