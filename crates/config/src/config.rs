//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// HTTP control API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Address the API listener binds to
    #[serde(default = "default_api_bind")]
    pub bind: String,
    /// Port the API listener binds to
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
            port: default_api_port(),
        }
    }
}

/// RTMP ingest endpoint configuration
///
/// The ingest service itself is an external collaborator; these values are only
/// used to construct locator strings pointing at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Hostname used when building RTMP URLs
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the RTMP ingest service listens on
    #[serde(default = "default_rtmp_port")]
    pub rtmp_port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_rtmp_port() -> u16 {
    1935
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            rtmp_port: default_rtmp_port(),
        }
    }
}

/// Companion RTSP routing service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    /// Hostname used for probing and when building RTSP URLs
    #[serde(default = "default_host")]
    pub host: String,
    /// Default port the routing service listens on
    #[serde(default = "default_rtsp_port")]
    pub rtsp_port: u16,
    /// Directory containing the routing service executable
    #[serde(default = "default_executable_dir")]
    pub executable_dir: String,
    /// Base name of the routing service executable (".exe" appended on Windows)
    #[serde(default = "default_executable_name")]
    pub executable_name: String,
    /// Timeout for a single reachability probe, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Delay between launching the routing service and re-probing, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_rtsp_port() -> u16 {
    8554
}

fn default_executable_dir() -> String {
    ".".to_string()
}

fn default_executable_name() -> String {
    "mediamtx".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    2000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            rtsp_port: default_rtsp_port(),
            executable_dir: default_executable_dir(),
            executable_name: default_executable_name(),
            probe_timeout_ms: default_probe_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Transcoder worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// Program invoked for conversion and test-stream workers
    #[serde(default = "default_program")]
    pub program: String,
    /// Maximum log entries retained per task (oldest dropped first)
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,
}

fn default_program() -> String {
    "ffmpeg".to_string()
}

fn default_log_retention() -> usize {
    1000
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            log_retention: default_log_retention(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - API_BIND -> api.bind
    /// - API_PORT -> api.port
    /// - INGEST_RTMP_PORT -> ingest.rtmp_port
    /// - ROUTER_RTSP_PORT -> router.rtsp_port
    /// - ROUTER_EXECUTABLE_DIR -> router.executable_dir
    /// - TRANSCODER_PROGRAM -> transcoder.program
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("API_BIND") {
            if !val.is_empty() {
                self.api.bind = val;
            }
        }

        if let Ok(val) = env::var("API_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.api.port = port;
            }
        }

        if let Ok(val) = env::var("INGEST_RTMP_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.ingest.rtmp_port = port;
            }
        }

        if let Ok(val) = env::var("ROUTER_RTSP_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.router.rtsp_port = port;
            }
        }

        if let Ok(val) = env::var("ROUTER_EXECUTABLE_DIR") {
            if !val.is_empty() {
                self.router.executable_dir = val;
            }
        }

        if let Ok(val) = env::var("TRANSCODER_PROGRAM") {
            if !val.is_empty() {
                self.transcoder.program = val;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}
