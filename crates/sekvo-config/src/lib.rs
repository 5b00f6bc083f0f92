//! # sekvo-config
//!
//! Configuration for sekvo. Reads `sekvo.toml`, selects the active
//! environment (`--env` > `SEKVO_ENV` > `default_env`), and fills missing
//! credentials from provider environment variables.

pub mod schema;
pub mod loader;

pub use schema::SekvoConfig;
pub use schema::{ConfigWarning, LoggingConfig, WarningSeverity};
pub use loader::ConfigLoader;
