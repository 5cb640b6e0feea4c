//! Configuration — recognized options with defaults.
//!
//! Resolution order: environment variables → config file → defaults.
//! The config file is TOML; `ATOLL_CONFIG` points at an explicit path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::key::GroupId;
use crate::quorum::SuccessMode;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtollConfig {
    /// Initial storage nodes handed to the session at construction.
    pub remotes: Vec<Remote>,
    /// Default group list used when a call passes no explicit groups.
    pub groups: Vec<GroupId>,
    /// Base port for synthesized lookup addresses.
    pub base_port: u16,
    /// Number of groups an object should live in. 0 = |groups|.
    pub replication_count: u32,
    /// Write acceptance policy.
    pub success_mode: SuccessMode,
    /// Minimum live transport states; below this every op refuses.
    pub die_limit: usize,
    /// Chunked upload stride in bytes. 0 = chunked uploads disabled.
    pub chunk_size: u64,
    /// Derive lookup paths in packed-blob form.
    pub eblob_style_path: bool,
    /// Per wire-call timeout in seconds.
    pub wait_timeout_secs: u64,
    /// Transport liveness check interval in seconds.
    pub check_timeout_secs: u64,
    pub balancer: BalancerConfig,
}

/// A storage node address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub family: AddrFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddrFamily {
    #[default]
    Ipv4,
    Ipv6,
}

/// Metadata balancer options. No endpoint means the weighted-cache path
/// is never exercised; there is no compile-time switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Transport endpoint of the balancer bus.
    pub endpoint: Option<String>,
    /// Weighted-cache refresh period in seconds.
    pub refresh_period_secs: u64,
    pub usage: BalancerUsage,
}

/// How hard write-time group selection leans on the balancer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BalancerUsage {
    /// Never consult the balancer.
    #[default]
    None,
    /// Consult it, fall back to the static list on failure.
    Optional,
    /// Consult it; failure fails the write.
    Normal,
    /// Always let the balancer pick, even over an explicit group list.
    Mandatory,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for AtollConfig {
    fn default() -> Self {
        Self {
            remotes: Vec::new(),
            groups: Vec::new(),
            base_port: 1024,
            replication_count: 0,
            success_mode: SuccessMode::Quorum,
            die_limit: 1,
            chunk_size: 0,
            eblob_style_path: false,
            wait_timeout_secs: 5,
            check_timeout_secs: 20,
            balancer: BalancerConfig::default(),
        }
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            refresh_period_secs: 60,
            usage: BalancerUsage::None,
        }
    }
}

impl AtollConfig {
    /// Resolved replication count: 0 means the whole default group list.
    pub fn replication(&self) -> usize {
        if self.replication_count == 0 {
            self.groups.len()
        } else {
            self.replication_count as usize
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.balancer.refresh_period_secs)
    }
}

// ── Remote parsing ────────────────────────────────────────────────────────────

impl Remote {
    pub fn new(host: impl Into<String>, port: u16, family: AddrFamily) -> Self {
        Self {
            host: host.into(),
            port,
            family,
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.family {
            AddrFamily::Ipv4 => "ipv4",
            AddrFamily::Ipv6 => "ipv6",
        };
        write!(f, "{}:{}:{}", self.host, self.port, family)
    }
}

/// Accepts `host:port` and `host:port:family` (family: ipv4/ipv6 or 4/6).
impl FromStr for Remote {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (host, port, family) = match parts.as_slice() {
            [host, port] => (*host, *port, AddrFamily::Ipv4),
            [host, port, family] => {
                let family = match *family {
                    "ipv4" | "4" => AddrFamily::Ipv4,
                    "ipv6" | "6" => AddrFamily::Ipv6,
                    _ => return Err(ConfigError::InvalidRemote(s.to_string())),
                };
                (*host, *port, family)
            }
            _ => return Err(ConfigError::InvalidRemote(s.to_string())),
        };
        if host.is_empty() {
            return Err(ConfigError::InvalidRemote(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| ConfigError::InvalidRemote(s.to_string()))?;
        Ok(Remote::new(host, port, family))
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid remote {0:?}, want host:port[:family]")]
    InvalidRemote(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl AtollConfig {
    /// Load config: env vars → file named by `ATOLL_CONFIG` → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("ATOLL_CONFIG") {
            Ok(path) => Self::read_file(PathBuf::from(path))?,
            Err(_) => AtollConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from an explicit path, then apply env overrides.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.into())?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path, e))
    }

    /// Apply ATOLL_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ATOLL_REMOTES") {
            let parsed: Vec<Remote> = v
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                self.remotes = parsed;
            }
        }
        if let Ok(v) = std::env::var("ATOLL_GROUPS") {
            let parsed: Vec<GroupId> = v
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                self.groups = parsed;
            }
        }
        if let Ok(v) = std::env::var("ATOLL_DIE_LIMIT") {
            if let Ok(n) = v.parse() {
                self.die_limit = n;
            }
        }
        if let Ok(v) = std::env::var("ATOLL_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("ATOLL_BALANCER__USAGE") {
            match v.to_ascii_lowercase().as_str() {
                "none" => self.balancer.usage = BalancerUsage::None,
                "optional" => self.balancer.usage = BalancerUsage::Optional,
                "normal" => self.balancer.usage = BalancerUsage::Normal,
                "mandatory" => self.balancer.usage = BalancerUsage::Mandatory,
                _ => {}
            }
        }
    }
}
