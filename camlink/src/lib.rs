// camlink - live video stream ingestion and resilience
//
// Architecture:
// - capability - transport negotiation (pure probe over injected capabilities)
// - media      - trait seams for the playback sink and the streaming engine
// - session    - per-connection state machine actor (connect, classify, reconnect)
// - config     - session, engine and logging configuration
//
// A session attaches one external source (progressive HTTP or an HLS
// playlist) to a playback sink, selects direct or engine-mediated
// transport, and recovers from transient failures within a bounded
// reconnect budget. Sessions are independent; run one per camera.

pub mod capability;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod session;

// Re-exports for convenience
pub use capability::{resolve_transport, Protocol, TransportMode};
pub use config::{EngineConfig, LoggingConfig, SessionConfig};
pub use error::{StreamError, StreamResult};
pub use media::{
    EngineErrorKind, EngineEvent, EngineEvents, EngineProvider, MediaHandle, MediaSink,
    SinkEvent, SinkEvents, StreamEngine,
};
pub use session::{SessionState, StreamSession, StreamStatus, StreamTarget};
