use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::MethodPolicy;
use crate::http::parser::ParseOptions;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "SKIFF_CONFIG";
/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub dispatch: DispatchConfig,
    pub parsing: ParsingConfig,
    pub static_files: StaticFilesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Applied to every read on a connection
    pub read_timeout_secs: u64,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            read_timeout_secs: 30,
            max_head_bytes: 16 * 1024,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub method_policy: MethodPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub percent_decode: bool,
    pub lowercase_path: bool,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        let defaults = ParseOptions::default();
        Self {
            percent_decode: defaults.percent_decode,
            lowercase_path: defaults.lowercase_path,
        }
    }
}

impl ParsingConfig {
    pub fn options(&self) -> ParseOptions {
        ParseOptions {
            percent_decode: self.percent_decode,
            lowercase_path: self.lowercase_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Paths under this prefix bypass the dispatcher
    pub prefix: String,
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            prefix: "/resources".to_string(),
            root: PathBuf::from("./resources"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> tracing::Level {
        self.level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

impl Config {
    /// Loads from the file in `SKIFF_CONFIG` (or defaults), then applies `LISTEN`.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let cfg = cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(content).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(LISTEN_ENV) {
            self.server.listen_addr = addr;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("server.listen_addr is empty".into()));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid("server.read_timeout_secs must be > 0".into()));
        }
        if self.server.max_head_bytes == 0 || self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("size limits must be > 0".into()));
        }
        if !self.static_files.prefix.starts_with('/') {
            return Err(ConfigError::Invalid(
                "static_files.prefix must start with '/'".into(),
            ));
        }
        Ok(())
    }
}
