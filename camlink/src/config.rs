// Session configuration with fixed defaults, overridable at construction.
//
// The session carries no durable state and reads no environment variables;
// an embedding application that loads these from its own config file can
// deserialize them directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-session connection and reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Full renegotiation attempts allowed before the session is declared
    /// terminally disconnected.
    pub max_reconnect_attempts: u32,
    /// Constant delay between reconnect attempts. The target is a single
    /// fixed endpoint, so no exponential backoff.
    pub reconnect_delay_ms: u64,
    /// Deadline for one connection attempt to reach a ready signal.
    pub connect_timeout_ms: u64,
    pub engine: EngineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 2000,
            connect_timeout_ms: 15_000,
            engine: EngineConfig::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Tuning handed to the adaptive-streaming engine when transport is
/// engine-mediated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefer low-latency manifest handling.
    pub low_latency: bool,
    /// Offload manifest/segment parsing to a worker.
    pub worker: bool,
    /// Back-buffer retention window in seconds.
    pub back_buffer_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_latency: true,
            worker: true,
            back_buffer_secs: 90,
        }
    }
}

/// Logging configuration for embedding binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" for development, "json" for production.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(2000));
        assert_eq!(config.connect_timeout(), Duration::from_millis(15_000));
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert!(engine.low_latency);
        assert!(engine.worker);
        assert_eq!(engine.back_buffer_secs, 90);
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::new()
            .with_max_reconnect_attempts(2)
            .with_reconnect_delay_ms(100)
            .with_connect_timeout_ms(500);
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(100));
        assert_eq!(config.connect_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"max_reconnect_attempts": 3}"#).expect("valid config");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay_ms, 2000);
        assert_eq!(config.engine, EngineConfig::default());
    }
}
