//! Agent settings file
//!
//! One JSON document describes a deployment: where the collector lives, how
//! to authenticate, which delivery path is primary, and where the store file
//! goes. Every field has a default, so a minimal file only names the device:
//!
//! ```json
//! {
//!   "device_id": "e00fce68d1b2c3a4f5e6d7c8",
//!   "server_url": "http://collector.local:3000",
//!   "api_key": "3786bc99-d8f4-428c-80a3-33fd7afaf5de",
//!   "primary": "direct",
//!   "secondary": "cloud",
//!   "utc_offset_hours": -7
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "http")]
use crate::http::HttpConfig;

#[cfg(feature = "cloud")]
use crate::mqtt::MqttConfig;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read
    #[error("Cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid settings document
    #[error("Invalid settings document: {0}")]
    Parse(String),

    /// A value is out of range
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Delivery path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// POST to the collector
    Direct,
    /// Publish on the MQTT cloud channel
    Cloud,
}

/// MQTT broker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Prepended to every topic
    pub topic_prefix: String,
    /// Keep-alive in seconds
    pub keep_alive_secs: u64,
    /// Optional username/password
    pub username: Option<String>,
    /// Password for `username`
    pub password: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            topic_prefix: String::new(),
            keep_alive_secs: 60,
            username: None,
            password: None,
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Device identity
    pub device_id: String,
    /// Collector base URL
    pub server_url: String,
    /// API key for the collector
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Primary delivery path
    pub primary: TransportKind,
    /// Alternate delivery path
    pub secondary: Option<TransportKind>,
    /// Local time offset from UTC
    pub utc_offset_hours: i32,
    /// Store file
    pub store_path: PathBuf,
    /// MQTT broker, used when a path is `cloud`
    pub broker: BrokerSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            server_url: "http://localhost:3000".into(),
            api_key: None,
            request_timeout_secs: 10,
            primary: TransportKind::Direct,
            secondary: None,
            utc_offset_hours: -7,
            store_path: PathBuf::from("pulseguard.store"),
            broker: BrokerSettings::default(),
        }
    }
}

impl AgentSettings {
    /// Load and validate a settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&text)?;
        log::info!("settings loaded from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Parse and validate a settings document
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.device_id.trim().is_empty() {
            return Err(SettingsError::Invalid { field: "device_id", reason: "must not be empty" });
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(SettingsError::Invalid { field: "server_url", reason: "must be an http(s) URL" });
        }
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(SettingsError::Invalid { field: "utc_offset_hours", reason: "must be within ±23" });
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid { field: "request_timeout_secs", reason: "must be positive" });
        }
        Ok(())
    }

    /// Set device identity
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = id.into();
        self
    }

    /// Set collector base URL
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set primary delivery path
    pub fn with_primary(mut self, kind: TransportKind) -> Self {
        self.primary = kind;
        self
    }

    /// Set or clear the alternate delivery path
    pub fn with_secondary(mut self, kind: Option<TransportKind>) -> Self {
        self.secondary = kind;
        self
    }

    /// Set store file
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// HTTP client configuration derived from these settings
    #[cfg(feature = "http")]
    pub fn http_config(&self) -> HttpConfig {
        let config = HttpConfig::new(self.server_url.clone()).timeout_secs(self.request_timeout_secs);
        match &self.api_key {
            Some(key) => config.api_key(key.clone()),
            None => config,
        }
    }

    /// MQTT configuration derived from these settings
    #[cfg(feature = "cloud")]
    pub fn mqtt_config(&self) -> MqttConfig {
        let mut config = MqttConfig::new(&self.broker.host, self.broker.port, &self.device_id)
            .topic_prefix(self.broker.topic_prefix.clone())
            .keep_alive_secs(self.broker.keep_alive_secs);
        if let (Some(user), Some(pass)) = (&self.broker.username, &self.broker.password) {
            config = config.credentials(user.clone(), pass.clone());
        }
        config
    }
}
