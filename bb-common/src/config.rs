//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (applied by each binary after loading)
//! 2. Environment variable (`BB_*`, see [`BattleConfig::apply_env`])
//! 3. TOML config file
//! 4. Compiled default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::bridge::{BridgeEndpoint, ClientConfig, DEFAULT_ENDPOINT};
use crate::{Error, Result};

pub const ENV_CONFIG: &str = "BB_CONFIG";
pub const ENV_DATABASE: &str = "BB_DATABASE";
pub const ENV_WEB_BIND: &str = "BB_WEB_BIND";
pub const ENV_BOT_PREFIX: &str = "BB_BOT_PREFIX";
pub const ENV_BRIDGE_ENDPOINT: &str = "BB_BRIDGE_ENDPOINT";

/// Complete process configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub database_path: PathBuf,
    pub web: WebConfig,
    pub bot: BotConfig,
    pub bridge: BridgeConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Chat command prefix, e.g. `!bbot`
    pub prefix: String,
    pub site_url: String,
    pub embed_color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `host:port` or `unix:/path`
    pub endpoint: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub sweep_interval_secs: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            web: WebConfig::default(),
            bot: BotConfig::default(),
            bridge: BridgeConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5760".to_string(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!bbot".to_string(),
            site_url: "https://beatbattle.app".to_string(),
            embed_color: "#0099ff".to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_retries: 3,
            retry_delay_ms: 200,
            grace_ms: 1000,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

impl BridgeConfig {
    pub fn endpoint(&self) -> Result<BridgeEndpoint> {
        Ok(self.endpoint.parse()?)
    }

    /// Client settings for the trigger process
    pub fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            endpoint: self.endpoint()?,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            grace: Duration::from_millis(self.grace_ms),
        })
    }
}

impl BattleConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load from `explicit` (or `BB_CONFIG`), else the platform config file, else defaults.
    /// Environment overrides are applied on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                // A path the operator named must exist
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
                })?;
                info!("Loaded config from {}", path.display());
                Self::from_toml_str(&content)?
            }
            None => match locate_config_file() {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    info!("Loaded config from {}", path.display());
                    Self::from_toml_str(&content)?
                }
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Overlay `BB_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(ENV_DATABASE) {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(bind) = std::env::var(ENV_WEB_BIND) {
            self.web.bind = bind;
        }
        if let Ok(prefix) = std::env::var(ENV_BOT_PREFIX) {
            self.bot.prefix = prefix;
        }
        if let Ok(endpoint) = std::env::var(ENV_BRIDGE_ENDPOINT) {
            self.bridge.endpoint = endpoint;
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lifecycle.sweep_interval_secs.max(1))
    }
}

/// User config first, then system-wide (unix only)
fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("beatbattle").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/beatbattle/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("beatbattle").join("beatbattle.db"))
        .unwrap_or_else(|| PathBuf::from("./beatbattle.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BattleConfig::default();
        assert_eq!(config.web.bind, "127.0.0.1:5760");
        assert_eq!(config.bot.prefix, "!bbot");
        assert_eq!(config.bridge.endpoint, "127.0.0.1:5761");
        assert_eq!(config.bridge.max_retries, 3);
        assert_eq!(config.lifecycle.sweep_interval_secs, 60);
        assert!(config.database_path.ends_with("beatbattle.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BattleConfig::from_toml_str(
            r#"
            database_path = "/srv/bb.db"

            [bridge]
            grace_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/srv/bb.db"));
        assert_eq!(config.bridge.grace_ms, 250);
        assert_eq!(config.bridge.max_retries, 3);
        assert_eq!(config.bot.prefix, "!bbot");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = BattleConfig::from_toml_str("web = 5").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_client_config_from_bridge_settings() {
        let bridge = BridgeConfig {
            endpoint: "127.0.0.1:9000".to_string(),
            max_retries: 5,
            retry_delay_ms: 10,
            grace_ms: 20,
        };
        let client = bridge.client_config().unwrap();
        assert_eq!(client.endpoint, BridgeEndpoint::Tcp("127.0.0.1:9000".to_string()));
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.grace, Duration::from_millis(20));
    }
}
