//! Client configuration parsed from environment variables.

use std::time::Duration;

use canvas::consts::CURSOR_EMIT_INTERVAL_MS;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Capped exponential backoff between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the driver gives up.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            initial_backoff_ms: DEFAULT_BACKOFF_MS,
            max_backoff_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): doubles from the initial value up to the cap.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay websocket endpoint.
    pub url: String,
    /// Display name sent to the relay.
    pub user_name: Option<String>,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on one websocket handshake.
    pub connect_timeout_ms: u64,
    /// Minimum gap between outbound cursor positions.
    pub cursor_interval_ms: i64,
    /// Shift snapshots out of negative coordinates on ingestion.
    pub renormalize: bool,
    /// Broadcast the store diff after an undo.
    pub broadcast_undo: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            user_name: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            cursor_interval_ms: CURSOR_EMIT_INTERVAL_MS,
            renormalize: true,
            broadcast_undo: false,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `SKETCHROOM_URL`: relay endpoint, default `ws://127.0.0.1:3000/ws`
    /// - `SKETCHROOM_USER`: display name
    /// - `SKETCHROOM_RECONNECT_ATTEMPTS`: default 10
    /// - `SKETCHROOM_BACKOFF_MS`: default 1000
    /// - `SKETCHROOM_BACKOFF_MAX_MS`: default 10000
    /// - `SKETCHROOM_CONNECT_TIMEOUT_MS`: default 10000
    /// - `SKETCHROOM_CURSOR_INTERVAL_MS`: default 16
    /// - `SKETCHROOM_RENORMALIZE`: default on
    /// - `SKETCHROOM_BROADCAST_UNDO`: default off
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unparsable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let url = lookup("SKETCHROOM_URL").unwrap_or(defaults.url).trim_end_matches('/').to_owned();
        let user_name = lookup("SKETCHROOM_USER").filter(|name| !name.trim().is_empty());
        let reconnect = ReconnectPolicy {
            max_attempts: env_parse(&lookup, "SKETCHROOM_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS)?,
            initial_backoff_ms: env_parse(&lookup, "SKETCHROOM_BACKOFF_MS", DEFAULT_BACKOFF_MS)?,
            max_backoff_ms: env_parse(&lookup, "SKETCHROOM_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS)?,
        };
        let connect_timeout_ms = env_parse(&lookup, "SKETCHROOM_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;
        let cursor_interval_ms = env_parse(&lookup, "SKETCHROOM_CURSOR_INTERVAL_MS", CURSOR_EMIT_INTERVAL_MS)?;
        let renormalize = env_flag(&lookup, "SKETCHROOM_RENORMALIZE", defaults.renormalize)?;
        let broadcast_undo = env_flag(&lookup, "SKETCHROOM_BROADCAST_UNDO", defaults.broadcast_undo)?;

        Ok(Self { url, user_name, reconnect, connect_timeout_ms, cursor_interval_ms, renormalize, broadcast_undo })
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Endpoint with the display name attached as the `user` query parameter.
    #[must_use]
    pub fn connect_url(&self) -> String {
        let Some(name) = &self.user_name else {
            return self.url.clone();
        };
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}user={}", self.url, urlencoding::encode(name))
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn env_flag(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
