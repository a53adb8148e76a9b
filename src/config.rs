use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Server configuration
///
/// Resolution order is defaults, then settings file, then environment, then
/// explicit setters (the CLI).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,

    /// TCP port; 0 picks a free port
    pub port: u16,

    /// Directory holding one file per database
    pub root: PathBuf,

    /// Live sessions allowed before the acceptor stops accepting
    pub max_sessions: usize,

    /// Block size for newly created database files
    pub block_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            root: PathBuf::from("./data"),
            max_sessions: 32,
            block_size: 4096,
        }
    }
}

/// Settings file as written by operators: `{"Host": .., "Port": .., ...}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettingsFile {
    host: Option<String>,
    port: Option<PortSetting>,
    root: Option<PathBuf>,
    max_sessions: Option<usize>,
    block_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortSetting {
    Number(u16),
    Text(String),
}

impl PortSetting {
    fn resolve(&self) -> Result<u16> {
        match self {
            PortSetting::Number(port) => Ok(*port),
            PortSetting::Text(text) => parse_setting("Port", text),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the storage root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the session ceiling
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the block size
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Defaults overlaid with whatever keys the JSON settings file sets.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: SettingsFile = serde_json::from_str(text)
            .map_err(|e| DbError::Config(format!("Invalid settings file: {}", e)))?;

        let mut config = Self::default();
        if let Some(host) = settings.host {
            config.host = host;
        }
        if let Some(port) = settings.port {
            config.port = port.resolve()?;
        }
        if let Some(root) = settings.root {
            config.root = root;
        }
        if let Some(max_sessions) = settings.max_sessions {
            config.max_sessions = max_sessions;
        }
        if let Some(block_size) = settings.block_size {
            config.block_size = block_size;
        }
        Ok(config)
    }

    /// Apply `MODESTDB_*` environment overrides.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MODESTDB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("MODESTDB_PORT") {
            self.port = parse_setting("MODESTDB_PORT", &port)?;
        }
        if let Some(root) = lookup("MODESTDB_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(max) = lookup("MODESTDB_MAX_SESSIONS") {
            self.max_sessions = parse_setting("MODESTDB_MAX_SESSIONS", &max)?;
        }
        if let Some(block_size) = lookup("MODESTDB_BLOCK_SIZE") {
            self.block_size = parse_setting("MODESTDB_BLOCK_SIZE", &block_size)?;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DbError::Config("host cannot be empty".into()));
        }

        if self.max_sessions == 0 {
            return Err(DbError::Config("max_sessions must be > 0".into()));
        }

        if self.block_size < 64 || !self.block_size.is_power_of_two() {
            return Err(DbError::Config(format!(
                "block_size must be a power of two >= 64, got {}",
                self.block_size
            )));
        }

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DbError::Config(format!("Invalid value for {}: '{}'", key, raw)))
}
