// Trait seams between a session and its playback environment.
//
// The sink and the adaptive-streaming engine are injected, never looked up
// ambiently, so capability permutations stay testable with fakes. The
// engine surface mirrors the embeddable engines this crate delegates
// manifest parsing to: load_source / attach_media / start_load /
// recover_media_error / destroy.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::error::StreamResult;

/// Events a playback sink reports back to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// First frame metadata is available; the attached source is decodable.
    MetadataReady,
    /// The sink failed to load or decode the attached source.
    Error(String),
}

/// Origin of a fatal engine error, deciding recovery vs. reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other,
}

/// Events an adaptive-streaming engine reports back to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The manifest was parsed and the stream is ready for playback.
    ManifestParsed,
    Error {
        kind: EngineErrorKind,
        fatal: bool,
        detail: String,
    },
}

/// Capturable handle to a sink's decoded output, handed to external
/// recording collaborators. The sink implementation defines how the id is
/// resolved in its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub id: String,
}

#[derive(Debug)]
pub(crate) enum MediaEvent {
    Sink(SinkEvent),
    Engine(EngineEvent),
}

/// Event tagged with the connection attempt it belongs to. The session
/// drops events from superseded attempts.
#[derive(Debug)]
pub(crate) struct TaggedEvent {
    pub(crate) generation: u64,
    pub(crate) event: MediaEvent,
}

/// Sender handed to a sink when a source is attached.
#[derive(Debug, Clone)]
pub struct SinkEvents {
    tx: mpsc::Sender<TaggedEvent>,
    generation: u64,
}

impl SinkEvents {
    pub(crate) fn new(tx: mpsc::Sender<TaggedEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Report a sink event. Events from a superseded attachment are
    /// silently dropped by the session.
    pub fn emit(&self, event: SinkEvent) {
        let _ = self.tx.try_send(TaggedEvent {
            generation: self.generation,
            event: MediaEvent::Sink(event),
        });
    }
}

/// Sender handed to an engine when a manifest is loaded.
#[derive(Debug, Clone)]
pub struct EngineEvents {
    tx: mpsc::Sender<TaggedEvent>,
    generation: u64,
}

impl EngineEvents {
    pub(crate) fn new(tx: mpsc::Sender<TaggedEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.try_send(TaggedEvent {
            generation: self.generation,
            event: MediaEvent::Engine(event),
        });
    }
}

/// Playback sink that decodes and renders an attached media source.
pub trait MediaSink: Send + Sync {
    /// Attach a source URL. The sink reports readiness or failure through
    /// `events`.
    fn set_source(&self, url: &str, events: SinkEvents);

    /// Detach the current source, leaving the sink reusable.
    fn clear_source(&self);

    /// Whether the sink decodes adaptive-streaming manifests natively.
    fn supports_native_hls(&self) -> bool;

    /// Capturable handle to the decoded output. Fails when no source is
    /// attached.
    fn capture_handle(&self) -> StreamResult<MediaHandle>;
}

/// Adaptive-streaming engine that parses a manifest and feeds a sink that
/// cannot do so natively.
pub trait StreamEngine: Send {
    fn load_source(&mut self, url: &str, events: EngineEvents);

    fn attach_media(&mut self, sink: &Arc<dyn MediaSink>);

    /// Resume manifest loading in place after a network-origin error.
    fn start_load(&mut self);

    /// Attempt in-place media-pipeline recovery after a decode error.
    fn recover_media_error(&mut self);

    /// Tear down and detach from the sink.
    fn destroy(&mut self);
}

/// Environment capability provider for engine-mediated transport.
pub trait EngineProvider: Send + Sync {
    /// Whether an adaptive-streaming engine is present in this environment.
    fn is_available(&self) -> bool;

    fn create_engine(&self, config: &EngineConfig) -> Box<dyn StreamEngine>;
}
