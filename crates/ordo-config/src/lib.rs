pub mod global;
pub mod loader;

pub use global::{EngineConfig, LogFormat, LoggingConfig, OrdoConfig};
pub use loader::{validate, ConfigLoader, CONFIG_FILE};
