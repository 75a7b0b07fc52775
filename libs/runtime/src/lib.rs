//! Shared bootstrap for console binaries: layered configuration and logging.

pub mod config;
pub mod logging;
pub mod paths;

pub use config::{default_logging_config, AppConfig, CliArgs, LoggingConfig, Section};
