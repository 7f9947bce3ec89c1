// Stream session — owns the lifecycle of exactly one active connection.
//
// All mutable state lives in a per-session actor task. Commands, sink and
// engine events, and timer expiries arrive through a single message loop,
// so no two state transitions can race. Events carry the generation of the
// connection attempt that produced them; events from a superseded attempt
// are dropped.
//
// Failure policy: engine network/media errors are recovered in place and
// never consume the reconnect budget; every other fatal error (engine,
// direct sink, connect deadline) consumes one attempt, and the session is
// terminally disconnected once the counter reaches the budget.

use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::capability::{resolve_transport, Protocol, TransportMode};
use crate::config::SessionConfig;
use crate::error::{StreamError, StreamResult};
use crate::media::{
    EngineErrorKind, EngineEvent, EngineEvents, EngineProvider, MediaEvent, MediaHandle,
    MediaSink, SinkEvent, SinkEvents, StreamEngine, TaggedEvent,
};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal until the next `connect`.
    Disconnected,
}

/// Immutable connection target. A new target requires a new `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub url: String,
    pub protocol: Protocol,
}

/// Read-only status projection. Safe to poll from a UI indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub is_connected: bool,
    pub state: SessionState,
    pub transport: TransportMode,
    pub url: Option<String>,
    pub reconnect_attempts: u32,
    /// Terminal failure, set once the reconnect budget is exhausted.
    pub last_error: Option<String>,
}

impl StreamStatus {
    fn idle() -> Self {
        Self {
            is_connected: false,
            state: SessionState::Idle,
            transport: TransportMode::Unattached,
            url: None,
            reconnect_attempts: 0,
            last_error: None,
        }
    }
}

enum Command {
    Connect {
        target: StreamTarget,
        reply: oneshot::Sender<StreamResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a per-session actor managing one stream connection.
///
/// Construction spawns the actor task, so a tokio runtime must be active.
/// Dropping the handle tears the actor down.
pub struct StreamSession {
    cmd_tx: mpsc::Sender<Command>,
    status: Arc<RwLock<StreamStatus>>,
    sink: Arc<dyn MediaSink>,
    cancel: CancellationToken,
}

impl StreamSession {
    #[must_use]
    pub fn new(sink: Arc<dyn MediaSink>, engines: Arc<dyn EngineProvider>) -> Self {
        Self::with_config(sink, engines, SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(
        sink: Arc<dyn MediaSink>,
        engines: Arc<dyn EngineProvider>,
        config: SessionConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let status = Arc::new(RwLock::new(StreamStatus::idle()));
        let cancel = CancellationToken::new();

        let actor = SessionActor {
            sink: Arc::clone(&sink),
            engines,
            config,
            cmd_rx,
            event_tx,
            event_rx,
            status: Arc::clone(&status),
            cancel: cancel.clone(),
            state: SessionState::Idle,
            target: None,
            transport: TransportMode::Unattached,
            engine: None,
            reconnect_attempts: 0,
            generation: 0,
            pending_connect: None,
            last_error: None,
            retry_timer: None,
            connect_deadline: None,
        };
        tokio::spawn(actor.run());

        Self {
            cmd_tx,
            status,
            sink,
            cancel,
        }
    }

    /// Connect to a stream target. Resolves once the first frame's metadata
    /// (direct) or the parsed manifest (engine-mediated) is available;
    /// fails with a classified error if the initial negotiation cannot be
    /// established. The session keeps running after this resolves and
    /// reconnects autonomously on later failures. Playback is not started.
    pub async fn connect(&self, url: &str, protocol_hint: Option<Protocol>) -> StreamResult<()> {
        let parsed =
            Url::parse(url).map_err(|e| StreamError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StreamError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let protocol = protocol_hint.unwrap_or_else(|| Protocol::infer(url));
        let target = StreamTarget {
            url: url.to_string(),
            protocol,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect {
                target,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StreamError::Closed)?;
        reply_rx.await.map_err(|_| StreamError::Closed)?
    }

    /// Disconnect and return to `Idle`. Idempotent and safe to call in any
    /// state, including mid-connect; cancels any pending reconnect timer.
    pub async fn disconnect(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Disconnect { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// Point-in-time status snapshot. Side-effect-free.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        self.status.read().clone()
    }

    /// Capturable handle to the attached sink's output, for external
    /// recording collaborators. Fails when no source is attached.
    pub fn capture_handle(&self) -> StreamResult<MediaHandle> {
        if self.status.read().transport == TransportMode::Unattached {
            return Err(StreamError::InvalidState("no source attached".to_string()));
        }
        self.sink.capture_handle()
    }

    /// Tear the session actor down. Any pending connect fails with
    /// [`StreamError::Closed`].
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionActor {
    sink: Arc<dyn MediaSink>,
    engines: Arc<dyn EngineProvider>,
    config: SessionConfig,
    cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<TaggedEvent>,
    event_rx: mpsc::Receiver<TaggedEvent>,
    status: Arc<RwLock<StreamStatus>>,
    cancel: CancellationToken,

    state: SessionState,
    target: Option<StreamTarget>,
    transport: TransportMode,
    engine: Option<Box<dyn StreamEngine>>,
    reconnect_attempts: u32,
    generation: u64,
    pending_connect: Option<oneshot::Sender<StreamResult<()>>>,
    last_error: Option<String>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    connect_deadline: Option<Pin<Box<Sleep>>>,
}

/// Await the sleep in `slot`, or park forever when no timer is armed.
async fn sleep_slot(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl SessionActor {
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.teardown();
                    return;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.teardown();
                        return;
                    }
                },
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                () = sleep_slot(&mut self.retry_timer) => self.on_retry_timer(),
                () = sleep_slot(&mut self.connect_deadline) => self.on_connect_deadline(),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { target, reply } => self.handle_connect(target, reply),
            Command::Disconnect { reply } => {
                self.handle_disconnect();
                let _ = reply.send(());
            }
        }
    }

    fn handle_connect(&mut self, target: StreamTarget, reply: oneshot::Sender<StreamResult<()>>) {
        if !matches!(self.state, SessionState::Idle | SessionState::Disconnected) {
            let _ = reply.send(Err(StreamError::InvalidState(format!(
                "connect is only valid from idle or disconnected, current state is {:?}",
                self.state
            ))));
            return;
        }

        // Probe before touching any state so a capability error leaves the
        // session exactly as it was.
        if let Err(e) = resolve_transport(self.sink.as_ref(), self.engines.as_ref(), target.protocol)
        {
            warn!("Cannot connect {}: {}", target.url, e);
            let _ = reply.send(Err(e));
            return;
        }

        info!("Connecting {} ({:?})", target.url, target.protocol);
        self.target = Some(target);
        self.reconnect_attempts = 0;
        self.last_error = None;
        self.pending_connect = Some(reply);
        self.start_attempt();
    }

    fn handle_disconnect(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        info!("Disconnecting stream");
        self.destroy_engine();
        self.sink.clear_source();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(StreamError::Disconnected));
        }
        self.target = None;
        self.transport = TransportMode::Unattached;
        self.reconnect_attempts = 0;
        self.retry_timer = None;
        self.connect_deadline = None;
        self.generation += 1;
        self.state = SessionState::Idle;
        self.push_status();
    }

    /// Begin one connection attempt against the current target. Re-runs the
    /// capability probe, so a reconnect goes through the full sequence.
    fn start_attempt(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };
        let mode = match resolve_transport(
            self.sink.as_ref(),
            self.engines.as_ref(),
            target.protocol,
        ) {
            Ok(mode) => mode,
            Err(e) => {
                self.fail_terminal(e);
                return;
            }
        };

        self.generation += 1;
        self.transport = mode;
        self.state = SessionState::Connecting;
        self.retry_timer = None;

        match mode {
            TransportMode::Direct => {
                let events = SinkEvents::new(self.event_tx.clone(), self.generation);
                self.sink.set_source(&target.url, events);
            }
            TransportMode::EngineMediated => {
                // Never two engines attached to one sink.
                self.destroy_engine();
                let mut engine = self.engines.create_engine(&self.config.engine);
                let events = EngineEvents::new(self.event_tx.clone(), self.generation);
                engine.load_source(&target.url, events);
                engine.attach_media(&self.sink);
                self.engine = Some(engine);
            }
            TransportMode::Unattached => {
                // resolve_transport never yields this
                self.fail_terminal(StreamError::Capability("no transport resolved".to_string()));
                return;
            }
        }

        self.connect_deadline = Some(Box::pin(tokio::time::sleep(self.config.connect_timeout())));
        self.push_status();
    }

    fn handle_event(&mut self, event: TaggedEvent) {
        if event.generation != self.generation {
            debug!("Dropping media event from superseded attempt");
            return;
        }
        match event.event {
            MediaEvent::Sink(SinkEvent::MetadataReady)
            | MediaEvent::Engine(EngineEvent::ManifestParsed) => self.on_ready(),
            MediaEvent::Sink(SinkEvent::Error(detail)) => {
                self.on_fatal(StreamError::SinkFailed(detail));
            }
            MediaEvent::Engine(EngineEvent::Error {
                kind,
                fatal,
                detail,
            }) => self.on_engine_error(kind, fatal, detail),
        }
    }

    fn on_ready(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        if let Some(target) = &self.target {
            info!("Stream connected: {} via {:?}", target.url, self.transport);
        }
        self.state = SessionState::Connected;
        self.reconnect_attempts = 0;
        self.connect_deadline = None;
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Ok(()));
        }
        self.push_status();
    }

    fn on_engine_error(&mut self, kind: EngineErrorKind, fatal: bool, detail: String) {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            return;
        }
        if !fatal {
            debug!("Non-fatal engine error ({:?}): {}", kind, detail);
            return;
        }
        match kind {
            EngineErrorKind::Network => {
                // Self-healing glitch inside a negotiated session; does not
                // consume the reconnect budget.
                warn!("Engine network error, resuming load in place: {}", detail);
                if let Some(engine) = self.engine.as_mut() {
                    engine.start_load();
                }
                self.reject_pending(StreamError::Network(detail));
            }
            EngineErrorKind::Media => {
                warn!(
                    "Engine media error, attempting pipeline recovery: {}",
                    detail
                );
                if let Some(engine) = self.engine.as_mut() {
                    engine.recover_media_error();
                }
                self.reject_pending(StreamError::Media(detail));
            }
            EngineErrorKind::Other => self.on_fatal(StreamError::EngineFatal(detail)),
        }
    }

    /// Budget-consuming failure: schedule a reconnect or go terminal.
    fn on_fatal(&mut self, err: StreamError) {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            return;
        }
        self.reject_pending(err.clone());
        self.connect_deadline = None;
        self.reconnect_attempts += 1;

        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            self.fail_terminal(StreamError::ReconnectExhausted(self.reconnect_attempts));
            return;
        }

        warn!(
            "Stream error ({}), reconnecting, attempt {} of {}",
            err, self.reconnect_attempts, self.config.max_reconnect_attempts
        );
        self.state = SessionState::Reconnecting;
        // Stale the failed attempt's events and drop its engine before the
        // fresh attempt, so an error storm cannot consume further budget
        // while the timer is pending.
        self.generation += 1;
        self.destroy_engine();
        self.retry_timer = Some(Box::pin(tokio::time::sleep(self.config.reconnect_delay())));
        self.push_status();
    }

    fn on_retry_timer(&mut self) {
        self.retry_timer = None;
        if self.state != SessionState::Reconnecting {
            return;
        }
        info!(
            "Reconnecting, attempt {} of {}",
            self.reconnect_attempts, self.config.max_reconnect_attempts
        );
        self.start_attempt();
    }

    fn on_connect_deadline(&mut self) {
        self.connect_deadline = None;
        if self.state != SessionState::Connecting {
            return;
        }
        self.on_fatal(StreamError::ConnectTimeout(self.config.connect_timeout()));
    }

    /// Terminal failure: release everything and surface the error to any
    /// status observer and the pending connect, if one is still waiting.
    fn fail_terminal(&mut self, err: StreamError) {
        error!("Stream terminally disconnected: {}", err);
        self.destroy_engine();
        self.sink.clear_source();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(err.clone()));
        }
        self.transport = TransportMode::Unattached;
        self.retry_timer = None;
        self.connect_deadline = None;
        self.generation += 1;
        self.last_error = Some(err.to_string());
        self.state = SessionState::Disconnected;
        self.push_status();
    }

    fn teardown(&mut self) {
        debug!("Session actor stopping");
        self.destroy_engine();
        self.sink.clear_source();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(StreamError::Closed));
        }
        self.target = None;
        self.transport = TransportMode::Unattached;
        self.state = SessionState::Idle;
        self.push_status();
    }

    fn destroy_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
    }

    fn reject_pending(&mut self, err: StreamError) {
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(err));
        }
    }

    fn push_status(&self) {
        let mut status = self.status.write();
        status.is_connected = self.state == SessionState::Connected;
        status.state = self.state;
        status.transport = self.transport;
        status.url = self.target.as_ref().map(|t| t.url.clone());
        status.reconnect_attempts = self.reconnect_attempts;
        status.last_error = self.last_error.clone();
    }
}
