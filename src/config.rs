//! # Application Configuration
//!
//! Broker settings live in a single TOML file, by default
//! `~/.config/mqttview/config.toml`; `MQTTVIEW_CONFIG` points to another file.
//! A default file is written on first start so the user has something to
//! edit. Missing keys fall back to their defaults.
//!
//! File I/O errors are reported with `color_eyre`; invalid values are
//! [`ConfigError`]s.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::mqtt::config::MqttConfig;

const CONFIG_DIR: &str = ".config/mqttview";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "MQTTVIEW_CONFIG";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Broker host must not be empty")]
    EmptyHost,

    #[error("Client id must not be empty")]
    EmptyClientId,

    #[error("Broker port must not be 0")]
    InvalidPort,

    #[error("Keep alive must be at least 1 second, got {0}")]
    KeepAliveTooShort(u64),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub topics: TopicsConfig,
    pub ui: UiConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    /// Clean session flag for the first connect.
    pub clean_session: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "mqttview".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 5,
            reconnect_delay_ms: 1000,
            clean_session: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct TopicsConfig {
    /// Subscribed with QoS 0 after every successful connect.
    pub subscribe_on_connect: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub dark_theme: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { dark_theme: true }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes the default configuration to `path` unless a file exists there.
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        AppConfig::default().save(path).await
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let broker = &self.broker;
        if broker.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if broker.client_id.trim().is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if broker.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if broker.keep_alive_secs < 1 {
            return Err(ConfigError::KeepAliveTooShort(broker.keep_alive_secs));
        }
        Ok(())
    }

    pub fn mqtt_config(&self) -> Result<MqttConfig, ConfigError> {
        self.validate()?;
        let broker = &self.broker;

        let credentials = match (&broker.username, &broker.password) {
            (Some(user), pw) if !user.is_empty() => {
                Some((user.clone(), pw.clone().unwrap_or_default()))
            }
            _ => None,
        };

        Ok(MqttConfig {
            host: broker.host.trim().to_string(),
            port: broker.port,
            client_id: broker.client_id.trim().to_string(),
            credentials,
            keep_alive: Duration::from_secs(broker.keep_alive_secs),
            reconnect_delay: Duration::from_millis(broker.reconnect_delay_ms),
            clean_session: broker.clean_session,
            subscribe_on_connect: self
                .topics
                .subscribe_on_connect
                .iter()
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [broker]
            host = "broker.local"
            username = "alice"

            [topics]
            subscribe_on_connect = ["home/#", "  "]
            "#,
        )
        .unwrap();

        let mqtt = config.mqtt_config().unwrap();
        assert_eq!(mqtt.broker_label(), "broker.local:1883");
        assert_eq!(mqtt.client_id, "mqttview");
        assert_eq!(mqtt.credentials, Some(("alice".into(), String::new())));
        assert_eq!(mqtt.subscribe_on_connect, vec!["home/#".to_string()]);
        assert!(config.ui.dark_theme);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.broker.host = " ".into();
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));

        let mut config = AppConfig::default();
        config.broker.port = 0;
        assert_eq!(config.mqtt_config(), Err(ConfigError::InvalidPort));

        let mut config = AppConfig::default();
        config.broker.keep_alive_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::KeepAliveTooShort(0)));
    }

    #[tokio::test]
    async fn default_config_is_written_once_and_loads_back() {
        let mut path = std::env::temp_dir();
        path.push(format!("mqttview-config-{}", std::process::id()));
        path.push(CONFIG_FILE);

        AppConfig::ensure_default_config(&path).await.unwrap();
        let mut edited = AppConfig::load(&path).await.unwrap();
        assert_eq!(edited, AppConfig::default());

        edited.broker.host = "edited.local".into();
        edited.save(&path).await.unwrap();
        AppConfig::ensure_default_config(&path).await.unwrap();
        assert_eq!(AppConfig::load(&path).await.unwrap().broker.host, "edited.local");

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }
}
