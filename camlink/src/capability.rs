// Capability probe — transport negotiation without network I/O.
//
// Decides, for a (sink, protocol) pair, whether the sink can decode the
// target protocol through its built-in URL attachment or whether an
// adaptive-streaming engine must be attached. Pure decision over injected
// capability flags.

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::media::{EngineProvider, MediaSink};

/// Stream protocol of a target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Progressive HTTP/HTTPS stream.
    Http,
    /// Manifest-based adaptive stream.
    Hls,
}

impl Protocol {
    /// Infer the protocol from the URL when no explicit hint is given.
    #[must_use]
    pub fn infer(url: &str) -> Self {
        if url.ends_with(".m3u8") || url.contains(".m3u8?") {
            Self::Hls
        } else {
            Self::Http
        }
    }

    /// Parse a caller-supplied protocol hint.
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "http" | "https" => Some(Self::Http),
            "hls" => Some(Self::Hls),
            _ => None,
        }
    }
}

/// How a session feeds the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// The sink decodes the URL through its built-in attachment mechanism.
    Direct,
    /// An adaptive-streaming engine parses the manifest and feeds the sink.
    EngineMediated,
    /// No source attached.
    Unattached,
}

/// Decide the transport mode for a `(sink, protocol)` pair.
///
/// Progressive HTTP always attaches directly. Manifest-based streaming
/// attaches directly only on sinks with native support, falls back to an
/// engine when one is available, and is a capability error otherwise.
pub fn resolve_transport(
    sink: &dyn MediaSink,
    engines: &dyn EngineProvider,
    protocol: Protocol,
) -> StreamResult<TransportMode> {
    match protocol {
        Protocol::Http => Ok(TransportMode::Direct),
        Protocol::Hls => {
            if sink.supports_native_hls() {
                Ok(TransportMode::Direct)
            } else if engines.is_available() {
                Ok(TransportMode::EngineMediated)
            } else {
                Err(StreamError::Capability(
                    "HLS requested but the sink has no native support and no streaming engine is available".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fakes::{FakeEngines, FakeSink};

    #[test]
    fn test_protocol_inference() {
        assert_eq!(Protocol::infer("http://cam.example/live.m3u8"), Protocol::Hls);
        assert_eq!(
            Protocol::infer("https://cam.example/live.m3u8?token=abc"),
            Protocol::Hls
        );
        assert_eq!(Protocol::infer("http://cam.example/live.mp4"), Protocol::Http);
        assert_eq!(Protocol::infer("http://cam.example/stream"), Protocol::Http);
    }

    #[test]
    fn test_protocol_hint_parsing() {
        assert_eq!(Protocol::from_hint("http"), Some(Protocol::Http));
        assert_eq!(Protocol::from_hint("https"), Some(Protocol::Http));
        assert_eq!(Protocol::from_hint("hls"), Some(Protocol::Hls));
        assert_eq!(Protocol::from_hint("rtmp"), None);
    }

    #[test]
    fn test_http_is_always_direct() {
        let sink = FakeSink::new(false);
        let engines = FakeEngines::new(false);
        assert_eq!(
            resolve_transport(sink.as_ref(), engines.as_ref(), Protocol::Http),
            Ok(TransportMode::Direct)
        );
    }

    #[test]
    fn test_hls_native_is_direct() {
        let sink = FakeSink::new(true);
        let engines = FakeEngines::new(false);
        assert_eq!(
            resolve_transport(sink.as_ref(), engines.as_ref(), Protocol::Hls),
            Ok(TransportMode::Direct)
        );
    }

    #[test]
    fn test_hls_falls_back_to_engine() {
        let sink = FakeSink::new(false);
        let engines = FakeEngines::new(true);
        assert_eq!(
            resolve_transport(sink.as_ref(), engines.as_ref(), Protocol::Hls),
            Ok(TransportMode::EngineMediated)
        );
    }

    #[test]
    fn test_hls_without_support_is_capability_error() {
        let sink = FakeSink::new(false);
        let engines = FakeEngines::new(false);
        let err = resolve_transport(sink.as_ref(), engines.as_ref(), Protocol::Hls)
            .expect_err("should not resolve");
        assert!(matches!(err, StreamError::Capability(_)));
    }
}
