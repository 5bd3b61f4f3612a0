//! Configuration system for Cairn.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAIRN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cairn/config.toml
//!   3. ~/.config/cairn/config.toml
//!
//! The loaded value is validated once and then shared read-only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub node: NodeConfig,
    pub searchgroups: SearchGroupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address advertised to peers and bound by the RPC/API listener.
    pub listen_host: String,
    /// Port for the RPC and management API.
    pub api_port: u16,
    /// Node identity key (hex). Empty = random key per run.
    pub node_key: String,
    /// Number of virtual node keys derived from the node key.
    pub vnodes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGroupConfig {
    /// Cap on peers disclosed in one subscribe reply. Must be > 0.
    pub max_returned_peers: usize,
    /// Seconds between periodic sweeps. Also rate-limits the sweep that
    /// follows a subscribe.
    pub sweep_interval_secs: u64,
    /// Idle seconds after which a group or subscriber is evicted.
    pub group_ttl_secs: u64,
    /// Keep the group database on disk.
    pub persist: bool,
    pub storage_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            api_port: 9100,
            node_key: String::new(),
            vnodes: 4,
        }
    }
}

impl Default for SearchGroupConfig {
    fn default() -> Self {
        Self {
            max_returned_peers: 20,
            sweep_interval_secs: 60,
            group_ttl_secs: 3600,
            persist: true,
            storage_path: data_dir().join("groups"),
        }
    }
}

impl SearchGroupConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn group_ttl(&self) -> Duration {
        Duration::from_secs(self.group_ttl_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("cairn")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("cairn")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CairnConfig {
    /// Load config: env vars → file → defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from `path`, falling back to defaults if it does not exist.
    /// Env overrides and validation apply either way.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            CairnConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAIRN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CairnConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sg = &self.searchgroups;
        if sg.max_returned_peers == 0 {
            return Err(ConfigError::Invalid(
                "searchgroups.max_returned_peers",
                "must be greater than zero".into(),
            ));
        }
        if sg.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "searchgroups.sweep_interval_secs",
                "must be greater than zero".into(),
            ));
        }
        if sg.group_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "searchgroups.group_ttl_secs",
                "must be greater than zero".into(),
            ));
        }
        if !self.node.node_key.is_empty() {
            self.node
                .node_key
                .parse::<crate::key::OverlayKey>()
                .map_err(|e| ConfigError::Invalid("node.node_key", e.to_string()))?;
        }
        Ok(())
    }

    /// Apply CAIRN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CAIRN_NODE__LISTEN_HOST") {
            self.node.listen_host = v;
        }
        if let Ok(v) = std::env::var("CAIRN_NODE__API_PORT") {
            if let Ok(p) = v.parse() {
                self.node.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_NODE__NODE_KEY") {
            self.node.node_key = v;
        }
        if let Ok(v) = std::env::var("CAIRN_NODE__VNODES") {
            if let Ok(n) = v.parse() {
                self.node.vnodes = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_SEARCHGROUPS__MAX_RETURNED_PEERS") {
            if let Ok(n) = v.parse() {
                self.searchgroups.max_returned_peers = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_SEARCHGROUPS__SWEEP_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.searchgroups.sweep_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_SEARCHGROUPS__GROUP_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.searchgroups.group_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("CAIRN_SEARCHGROUPS__PERSIST") {
            self.searchgroups.persist = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("CAIRN_SEARCHGROUPS__STORAGE_PATH") {
            self.searchgroups.storage_path = PathBuf::from(v);
        }
    }
}
