/// Store capability descriptor computed once at startup
pub mod capabilities;

/// Database configuration and connection management
pub mod database;

/// Application settings loading from stocktake.toml
pub mod settings;

pub use capabilities::StoreCapabilities;
pub use settings::{AppConfig, Limits};
