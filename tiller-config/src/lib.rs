//! Domain-driven configuration management for Tiller
//!
//! Configuration is split by functional domain, loaded from YAML, overridden
//! from `TILLER_*` environment variables and validated before the engine
//! touches a database.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

pub use domains::{
    database::DatabaseConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    migrations::MigrationsConfig,
    run::RunConfig,
    TillerConfig,
};

pub use domains::utils::serde_duration;
