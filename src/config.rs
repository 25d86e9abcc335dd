use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error_utils::parse_json_with_context;

fn default_poll_interval() -> u64 {
    60
}

fn default_ratelimit_wait() -> u64 {
    900
}

fn default_pacing_delay() -> u64 {
    3000
}

/// Bot configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bearer token for the platform API. The TWITTER_BEARER_TOKEN
    /// environment variable takes precedence when set.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Platform API base URL override.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Seconds between polling cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Cooldown applied after a rate-limit signal, in seconds.
    #[serde(default = "default_ratelimit_wait")]
    pub ratelimit_wait_secs: u64,

    /// Courtesy delay between processed mentions, in milliseconds.
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,

    /// Per-plugin configuration sections, keyed by plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_base: None,
            poll_interval_secs: default_poll_interval(),
            ratelimit_wait_secs: default_ratelimit_wait(),
            pacing_delay_ms: default_pacing_delay(),
            plugins: HashMap::new(),
        }
    }
}

impl Config {
    /// Reads and parses the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}", path = path.display()))?;
        let config: Config = parse_json_with_context(&raw, "config file")?;
        debug!("Read config from {path}", path = path.display());
        Ok(config)
    }

    /// Raw config section for a plugin, if present.
    pub fn plugin_section(&self, plugin: &str) -> Option<&serde_json::Value> {
        self.plugins.get(plugin)
    }

    /// Deserializes a plugin's config section into `T`. Returns `Ok(None)`
    /// when the section is absent, `Err` when it is present but malformed.
    pub fn typed_section<T: DeserializeOwned>(&self, plugin: &str) -> Result<Option<T>> {
        match self.plugins.get(plugin) {
            Some(value) => {
                let section = T::deserialize(value)
                    .with_context(|| format!("Invalid config section for plugin `{plugin}`"))?;
                Ok(Some(section))
            }
            None => Ok(None),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ratelimit_wait(&self) -> Duration {
        Duration::from_secs(self.ratelimit_wait_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let config: Config = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.ratelimit_wait(), Duration::from_secs(900));
        assert_eq!(config.pacing_delay(), Duration::from_millis(3000));
        assert!(config.bearer_token.is_none());
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config: Config = serde_json::from_value(json!({
            "bearer_token": "token",
            "poll_interval_secs": 30,
            "ratelimit_wait_secs": 120,
            "pacing_delay_ms": 500,
            "plugins": {
                "ping": {"response": "hello"}
            }
        }))
        .unwrap();
        assert_eq!(config.bearer_token.as_deref(), Some("token"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(config.plugin_section("ping").is_some());
        assert!(config.plugin_section("missing").is_none());
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct PingSection {
        response: String,
    }

    #[test]
    fn test_typed_section_deserializes() {
        let config: Config = serde_json::from_value(json!({
            "plugins": {"ping": {"response": "hello"}}
        }))
        .unwrap();

        let section: Option<PingSection> = config.typed_section("ping").unwrap();
        assert_eq!(
            section,
            Some(PingSection {
                response: "hello".to_string()
            })
        );

        let absent: Option<PingSection> = config.typed_section("missing").unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn test_typed_section_rejects_malformed_sections() {
        let config: Config = serde_json::from_value(json!({
            "plugins": {"ping": {"response": 5}}
        }))
        .unwrap();
        let result: Result<Option<PingSection>> = config.typed_section("ping");
        assert!(result.is_err());
    }
}
