//! Configuration module for Stream Bridge
//!
//! Handles loading configuration from TOML files and environment variable overrides.

pub mod config;

pub use config::{ApiConfig, Config, ConfigError, IngestConfig, RouterConfig, TranscoderConfig};
