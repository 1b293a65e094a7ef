//! Configuration for soundwave-web
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`SOUNDWAVE_*`, handled by clap)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! Everything is static for the lifetime of the process.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};
use crate::spectrum::BitDepth;

/// Where raw audio blocks come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Live input device
    #[default]
    Device,
    /// WAV file played back in real time
    File,
    /// Generated test tone
    Tone,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Device => write!(f, "device"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Tone => write!(f, "tone"),
        }
    }
}

/// Configuration as read from the TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,
    /// Address the HTTP server binds to
    pub bind_address: IpAddr,
    pub source: SourceKind,
    /// Input device name (None = system default)
    pub device_name: Option<String>,
    /// WAV file for the file source
    pub file_path: Option<PathBuf>,
    /// Restart the file when it ends
    pub loop_file: bool,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Capture bit depth (8, 16 or 32)
    pub bit_depth: u16,
    /// Capture buffer length in milliseconds
    pub buffer_ms: u64,
    /// Per-subscriber send timeout in milliseconds
    pub send_timeout_ms: u64,
    /// Frames queued per subscriber before sends start waiting
    pub subscriber_queue: usize,
    /// Raw blocks queued between capture and pipeline before blocks are dropped
    pub block_queue: usize,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5080,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            source: SourceKind::Device,
            device_name: None,
            file_path: None,
            loop_file: false,
            sample_rate: 60_000,
            bit_depth: 32,
            buffer_ms: 16,
            send_timeout_ms: 250,
            subscriber_queue: 8,
            block_queue: 4,
            logging: LoggingConfig::default(),
        }
    }
}

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "soundwave_web=info,tower_http=info";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Command-line overrides, each also readable from the environment
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Port to listen on
    #[arg(short, long, env = "SOUNDWAVE_PORT")]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "SOUNDWAVE_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// Audio block source
    #[arg(short, long, value_enum, env = "SOUNDWAVE_SOURCE")]
    pub source: Option<SourceKind>,

    /// Input device name
    #[arg(long, env = "SOUNDWAVE_DEVICE")]
    pub device_name: Option<String>,

    /// WAV file to play (implies --source file when no source is given)
    #[arg(short, long, env = "SOUNDWAVE_FILE")]
    pub file: Option<PathBuf>,

    /// Loop the WAV file
    #[arg(long)]
    pub loop_file: bool,

    /// Capture sample rate in Hz
    #[arg(long, env = "SOUNDWAVE_SAMPLE_RATE")]
    pub sample_rate: Option<u32>,

    /// Capture bit depth (8, 16 or 32)
    #[arg(long, env = "SOUNDWAVE_BIT_DEPTH")]
    pub bit_depth: Option<u16>,

    /// Capture buffer length in milliseconds
    #[arg(long, env = "SOUNDWAVE_BUFFER_MS")]
    pub buffer_ms: Option<u64>,

    /// Per-subscriber send timeout in milliseconds
    #[arg(long, env = "SOUNDWAVE_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: Option<u64>,

    /// Log level or filter directive
    #[arg(long, env = "SOUNDWAVE_LOG")]
    pub log_level: Option<String>,
}

/// Resolved, validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub source: SourceKind,
    pub device_name: Option<String>,
    pub file_path: Option<PathBuf>,
    pub loop_file: bool,
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    pub buffer_ms: u64,
    pub send_timeout_ms: u64,
    pub subscriber_queue: usize,
    pub block_queue: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        // Defaults are always valid
        Self::from_parts(TomlConfig::default(), &Overrides::default())
            .unwrap_or_else(|e| unreachable!("default config invalid: {}", e))
    }
}

impl Config {
    /// Load the config file (if any) and apply overrides
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let toml = match soundwave_common::config::resolve_config_path(config_path)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                soundwave_common::config::load_toml(&path)?
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                TomlConfig::default()
            }
        };

        Self::from_parts(toml, overrides)
    }

    /// Merge file values with overrides and validate
    pub fn from_parts(toml: TomlConfig, overrides: &Overrides) -> Result<Self> {
        let file_path = overrides.file.clone().or(toml.file_path);
        let source = match (overrides.source, &overrides.file) {
            (Some(source), _) => source,
            (None, Some(_)) => SourceKind::File,
            (None, None) => toml.source,
        };

        let bit_depth = BitDepth::try_from(overrides.bit_depth.unwrap_or(toml.bit_depth))?;

        let config = Self {
            bind_address: overrides.bind_address.unwrap_or(toml.bind_address),
            port: overrides.port.unwrap_or(toml.port),
            source,
            device_name: overrides.device_name.clone().or(toml.device_name),
            file_path,
            loop_file: overrides.loop_file || toml.loop_file,
            sample_rate: overrides.sample_rate.unwrap_or(toml.sample_rate),
            bit_depth,
            buffer_ms: overrides.buffer_ms.unwrap_or(toml.buffer_ms),
            send_timeout_ms: overrides.send_timeout_ms.unwrap_or(toml.send_timeout_ms),
            subscriber_queue: toml.subscriber_queue,
            block_queue: toml.block_queue,
            log_level: overrides.log_level.clone().unwrap_or(toml.logging.level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if self.buffer_ms == 0 {
            return Err(Error::Config("buffer_ms must be positive".to_string()));
        }
        if self.send_timeout_ms == 0 {
            return Err(Error::Config("send_timeout_ms must be positive".to_string()));
        }
        if self.subscriber_queue == 0 || self.block_queue == 0 {
            return Err(Error::Config("queue capacities must be positive".to_string()));
        }
        if self.source == SourceKind::File && self.file_path.is_none() {
            return Err(Error::Config("file source requires a file path".to_string()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Samples per block at the configured rate and buffer length (at least 1)
    pub fn block_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.buffer_ms / 1000) as usize).max(1)
    }

    /// Pacing interval between blocks
    pub fn buffer_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
