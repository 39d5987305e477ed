//! Configuration module for reactor-chat server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "reactor-chat")]
#[command(author = "reactor-chat authors")]
#[command(version = "0.1.0")]
#[command(about = "A TCP/UDP line server with echo and slash commands", long_about = None)]
pub struct CliArgs {
    /// Port shared by the TCP listener and the UDP socket
    #[arg(value_name = "PORT")]
    pub port_arg: Option<u16>,

    /// Port shared by the TCP listener and the UDP socket (same as PORT)
    #[arg(short, long, conflicts_with = "port_arg")]
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind both transports to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen backlog for the TCP socket
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Maximum readiness events handled per poll cycle
    #[arg(long)]
    pub max_events: Option<usize>,

    /// Unsent response bytes a connection may queue before reads pause
    #[arg(long)]
    pub max_pending_output: Option<usize>,

    /// Size of the per-read receive buffer in bytes
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// How stream input is split into messages
    #[arg(long, value_enum)]
    pub framing: Option<Framing>,

    /// Longest partial line kept when using line framing
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// How bytes read from a stream connection become messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Every successful read is one message. A message split across two
    /// reads is handled as two messages.
    #[default]
    PerRead,
    /// Bytes are buffered per connection and split on `\n`.
    Line,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Socket and reactor configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default = "default_max_pending_output")]
    pub max_pending_output: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            max_events: default_max_events(),
            read_buffer_size: default_read_buffer_size(),
            max_pending_output: default_max_pending_output(),
        }
    }
}

/// Message framing configuration
#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            max_line_length: default_max_line_length(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_backlog() -> u32 {
    10
}

fn default_max_events() -> usize {
    64
}

fn default_read_buffer_size() -> usize {
    1024
}

fn default_max_pending_output() -> usize {
    64 * 1024 // 64 KB
}

fn default_max_line_length() -> usize {
    8192
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub max_events: usize,
    pub read_buffer_size: usize,
    pub max_pending_output: usize,
    pub framing: Framing,
    pub max_line_length: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::empty(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli
                .port_arg
                .or(cli.port)
                .unwrap_or(toml_config.server.port),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            max_events: cli.max_events.unwrap_or(toml_config.server.max_events),
            read_buffer_size: cli
                .read_buffer_size
                .unwrap_or(toml_config.server.read_buffer_size),
            max_pending_output: cli
                .max_pending_output
                .unwrap_or(toml_config.server.max_pending_output),
            framing: cli.framing.unwrap_or(toml_config.protocol.framing),
            max_line_length: cli
                .max_line_length
                .unwrap_or(toml_config.protocol.max_line_length),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Reject values the reactor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog", "must be at least 1"));
        }
        if self.max_events == 0 {
            return Err(ConfigError::Invalid("max_events", "must be at least 1"));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size", "must be at least 1"));
        }
        if self.max_pending_output == 0 {
            return Err(ConfigError::Invalid("max_pending_output", "must be at least 1"));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length", "must be at least 1"));
        }
        Ok(())
    }
}

impl CliArgs {
    fn empty() -> Self {
        CliArgs {
            port_arg: None,
            port: None,
            config: None,
            host: None,
            backlog: None,
            max_events: None,
            max_pending_output: None,
            read_buffer_size: None,
            framing: None,
            max_line_length: None,
            log_level: default_log_level(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(field, reason) => {
                write!(f, "Invalid value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
