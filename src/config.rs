use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scope::ConnectionConfig;
use crate::scope::protocol::DEFAULT_PORT;
use crate::session::SessionConfig;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scope: ScopeConfig,
    pub acquisition: AcquisitionConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScopeConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// 0 disables the read timeout
    pub read_timeout_ms: u64,
    /// 0 disables the write timeout
    pub write_timeout_ms: u64,
    pub end_of_block_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub trigger_poll_interval_ms: u64,
    /// 0 waits for a trigger until cancelled
    pub trigger_timeout_ms: u64,
    /// Send `:RUN` once the acquisition is over
    pub resume_after: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for capture logs, `None` keeps captures in memory only
    pub directory: Option<PathBuf>,
    /// Captures buffered before the capture log is flushed
    pub flush_every: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            host: "192.168.1.50".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: millis(connection.connect_timeout),
            read_timeout_ms: connection.read_timeout.map(millis).unwrap_or(0),
            write_timeout_ms: connection.write_timeout.map(millis).unwrap_or(0),
            end_of_block_timeout_ms: millis(connection.end_of_block_timeout),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            trigger_poll_interval_ms: 100,
            trigger_timeout_ms: 0,
            resume_after: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            flush_every: 1,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn optional_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl ScopeConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: optional_millis(self.read_timeout_ms),
            write_timeout: optional_millis(self.write_timeout_ms),
            end_of_block_timeout: Duration::from_millis(self.end_of_block_timeout_ms),
        }
    }
}

impl AcquisitionConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.trigger_poll_interval_ms),
            trigger_timeout: optional_millis(self.trigger_timeout_ms),
        }
    }
}

/// Load configuration from file with layered fallbacks
///
/// Defaults, then the TOML file, then `DS1000Z_SECTION__KEY` environment
/// variables.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else {
        let possible_paths = ["config.toml", "ds1000z.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("DS1000Z")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration, falling back to defaults on any error
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
