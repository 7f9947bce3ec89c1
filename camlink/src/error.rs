use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("No viable transport: {0}")]
    Capability(String),

    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Sink failed: {0}")]
    SinkFailed(String),

    #[error("Engine fatal error: {0}")]
    EngineFatal(String),

    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Reconnect budget exhausted after {0} attempts")]
    ReconnectExhausted(u32),

    #[error("Disconnected before the connection was established")]
    Disconnected,

    #[error("Session closed")]
    Closed,
}

pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    /// Whether the error is recovered in place, without consuming the
    /// reconnect budget.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Media(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(StreamError::Network("segment fetch failed".to_string()).is_recoverable());
        assert!(StreamError::Media("decode stall".to_string()).is_recoverable());

        assert!(!StreamError::Capability("no engine".to_string()).is_recoverable());
        assert!(!StreamError::SinkFailed("bad source".to_string()).is_recoverable());
        assert!(!StreamError::EngineFatal("mux error".to_string()).is_recoverable());
        assert!(!StreamError::ReconnectExhausted(5).is_recoverable());
    }
}
