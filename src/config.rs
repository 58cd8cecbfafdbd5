//! Board configuration parsed from environment variables.

use std::time::Duration;

use crate::api::DEFAULT_API_URL;
use crate::layout::{DEFAULT_COLUMN_SIZE, DEFAULT_COLUMNS, LayoutConfig};
use crate::realtime::BoardOptions;
use crate::transport::stomp::StompConfig;
use crate::transport::{BROADCAST_TOPIC, Topics};

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws/websocket";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a {expected} url, got {value:?}")]
    InvalidUrl { var: &'static str, expected: &'static str, value: String },
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

impl ConfigError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "E_CONFIG_URL",
            Self::InvalidValue { .. } => "E_CONFIG_VALUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub api_url: String,
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub broadcast_topic: String,
    pub layout: LayoutConfig,
    pub port: u16,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            ws_url: DEFAULT_WS_URL.to_owned(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            broadcast_topic: BROADCAST_TOPIC.to_owned(),
            layout: LayoutConfig::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl BoardConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `BOXBOARD_API_URL`: backend REST base, default `http://localhost:8080/api`
    /// - `BOXBOARD_WS_URL`: STOMP endpoint, default `ws://localhost:8080/ws/websocket`
    /// - `BOXBOARD_RECONNECT_DELAY_MS`: default 5000
    /// - `BOXBOARD_CONNECT_TIMEOUT_MS`: default 10000
    /// - `BOXBOARD_BROADCAST_TOPIC`: default `/topic/dashboard`
    /// - `BOXBOARD_COLUMNS` / `BOXBOARD_COLUMN_SIZE`: default 4 x 6
    /// - `PORT`: HTTP port for `serve`, default 3000
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed URLs, a topic without a leading `/`, or
    /// an empty grid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            api_url: lookup("BOXBOARD_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            ws_url: lookup("BOXBOARD_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_owned()),
            reconnect_delay: Duration::from_millis(parse_or(
                lookup("BOXBOARD_RECONNECT_DELAY_MS"),
                DEFAULT_RECONNECT_DELAY_MS,
            )),
            connect_timeout: Duration::from_millis(parse_or(
                lookup("BOXBOARD_CONNECT_TIMEOUT_MS"),
                DEFAULT_CONNECT_TIMEOUT_MS,
            )),
            broadcast_topic: lookup("BOXBOARD_BROADCAST_TOPIC").unwrap_or_else(|| BROADCAST_TOPIC.to_owned()),
            layout: LayoutConfig {
                columns: parse_or(lookup("BOXBOARD_COLUMNS"), DEFAULT_COLUMNS),
                column_size: parse_or(lookup("BOXBOARD_COLUMN_SIZE"), DEFAULT_COLUMN_SIZE),
            },
            port: parse_or(lookup("PORT"), DEFAULT_PORT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail much later.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_scheme(&self.api_url, &["http://", "https://"]) {
            return Err(ConfigError::InvalidUrl {
                var: "BOXBOARD_API_URL",
                expected: "http(s)",
                value: self.api_url.clone(),
            });
        }
        if !has_scheme(&self.ws_url, &["ws://", "wss://"]) {
            return Err(ConfigError::InvalidUrl { var: "BOXBOARD_WS_URL", expected: "ws(s)", value: self.ws_url.clone() });
        }
        if !self.broadcast_topic.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                var: "BOXBOARD_BROADCAST_TOPIC",
                value: self.broadcast_topic.clone(),
            });
        }
        if self.layout.columns == 0 {
            return Err(ConfigError::InvalidValue { var: "BOXBOARD_COLUMNS", value: "0".into() });
        }
        if self.layout.column_size == 0 {
            return Err(ConfigError::InvalidValue { var: "BOXBOARD_COLUMN_SIZE", value: "0".into() });
        }
        Ok(())
    }

    #[must_use]
    pub fn stomp_config(&self) -> StompConfig {
        StompConfig {
            url: self.ws_url.clone(),
            reconnect_delay: self.reconnect_delay,
            connect_timeout: self.connect_timeout,
        }
    }

    #[must_use]
    pub fn board_options(&self) -> BoardOptions {
        BoardOptions { topics: Topics { broadcast: self.broadcast_topic.clone() }, layout: self.layout }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

/// `url` starts with one of `schemes` and has something after it.
fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes.iter().any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
