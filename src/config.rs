//! Configuration for the posture monitor.
//!
//! Values come from `POSTURE_*` environment variables and can be
//! overridden from the command line. Nothing is read from or written to
//! disk.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_BACKEND_URL: &str = "POSTURE_BACKEND_URL";
pub const ENV_MODE: &str = "POSTURE_MODE";
pub const ENV_POLL_INTERVAL: &str = "POSTURE_POLL_INTERVAL_SECS";
pub const ENV_POLL_ENDPOINT: &str = "POSTURE_POLL_ENDPOINT";
pub const ENV_EVENT: &str = "POSTURE_EVENT";
pub const ENV_REQUEST_TIMEOUT: &str = "POSTURE_REQUEST_TIMEOUT_SECS";
pub const ENV_TIMEZONE: &str = "POSTURE_TIMEZONE";

/// Backend used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "https://backiacamara-production.up.railway.app";

/// Main configuration for the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the sensing backend
    pub backend_url: String,

    /// Which data source to use
    pub mode: SourceMode,

    /// Interval between polling requests
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Path of the polling endpoint, relative to the backend URL
    pub poll_endpoint: String,

    /// Event name carrying posture updates on the event stream
    pub event_name: String,

    /// Timeout for a single HTTP request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// IANA time zone for displayed timestamps (local time if unset)
    pub timezone: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            mode: SourceMode::Stream,
            poll_interval: Duration::from_secs(5),
            poll_endpoint: "/postura".to_string(),
            event_name: "nueva_postura".to_string(),
            request_timeout: Duration::from_secs(10),
            timezone: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_BACKEND_URL) {
            config.backend_url = url;
        }
        if let Some(mode) = get(ENV_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(secs) = get(ENV_POLL_INTERVAL) {
            config.poll_interval = parse_secs(ENV_POLL_INTERVAL, &secs)?;
        }
        if let Some(endpoint) = get(ENV_POLL_ENDPOINT) {
            config.poll_endpoint = endpoint;
        }
        if let Some(event) = get(ENV_EVENT) {
            config.event_name = event;
        }
        if let Some(secs) = get(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT, &secs)?;
        }
        if let Some(tz) = get(ENV_TIMEZONE) {
            config.timezone = Some(tz);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: ENV_BACKEND_URL,
                value: self.backend_url.clone(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: ENV_POLL_INTERVAL,
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.event_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ENV_EVENT,
                value: self.event_name.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        self.display_timezone()?;
        Ok(())
    }

    /// Full URL of the polling endpoint.
    pub fn poll_url(&self) -> String {
        let base = self.backend_url.trim().trim_end_matches('/');
        let path = self.poll_endpoint.trim().trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// WebSocket URL of the backend's Socket.IO endpoint.
    pub fn socket_url(&self) -> String {
        let base = self.backend_url.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/socket.io/?EIO=4&transport=websocket")
    }

    /// Parsed display time zone, `None` for local time.
    pub fn display_timezone(&self) -> Result<Option<chrono_tz::Tz>, ConfigError> {
        match self.timezone.as_deref() {
            None => Ok(None),
            Some(name) => name
                .parse::<chrono_tz::Tz>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_TIMEZONE,
                    value: name.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Which data source feeds the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Socket.IO event stream
    Stream,
    /// Fixed-interval HTTP polling
    Poll,
}

impl FromStr for SourceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "socket" => Ok(SourceMode::Stream),
            "poll" => Ok(SourceMode::Poll),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_MODE,
                value: s.to_string(),
                reason: "expected stream or poll".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Stream => f.write_str("stream"),
            SourceMode::Poll => f.write_str("poll"),
        }
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// The selected mode was compiled out
    Unsupported(SourceMode),
    /// The HTTP client could not be built
    Client(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid value '{value}' for {key}: {reason}")
            }
            ConfigError::Unsupported(mode) => {
                write!(f, "Mode '{mode}' not enabled at compile time")
            }
            ConfigError::Client(e) => write!(f, "HTTP client error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mode, SourceMode::Stream);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.event_name, "nueva_postura");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_BACKEND_URL, "http://127.0.0.1:8000/"),
            (ENV_MODE, "poll"),
            (ENV_POLL_INTERVAL, "2"),
            (ENV_TIMEZONE, "America/Lima"),
            (ENV_EVENT, ""),
        ]))
        .unwrap();

        assert_eq!(config.mode, SourceMode::Poll);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_url(), "http://127.0.0.1:8000/postura");
        assert_eq!(config.event_name, "nueva_postura");
        assert_eq!(
            config.display_timezone().unwrap(),
            Some(chrono_tz::America::Lima)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_lookup(lookup(&[(ENV_MODE, "carrier-pigeon")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_POLL_INTERVAL, "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_POLL_INTERVAL, "five")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_BACKEND_URL, "ftp://x")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_TIMEZONE, "Mars/Olympus")])).is_err());
    }

    #[test]
    fn test_socket_url() {
        let mut config = Config::default();
        assert_eq!(
            config.socket_url(),
            "wss://backiacamara-production.up.railway.app/socket.io/?EIO=4&transport=websocket"
        );

        config.backend_url = "http://localhost:5000/".to_string();
        assert_eq!(
            config.socket_url(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("socket".parse::<SourceMode>(), Ok(SourceMode::Stream));
        assert_eq!(" POLL ".parse::<SourceMode>(), Ok(SourceMode::Poll));
    }

    #[test]
    fn test_config_serializes_durations_as_secs() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["poll_interval"], 5);
        assert_eq!(json["mode"], "stream");
    }
}
