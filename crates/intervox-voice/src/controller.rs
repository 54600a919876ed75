//! The voice-agent session state machine.
//!
//! [`SessionController`] drives one voice session per activation:
//!
//! 1. `Requesting`: exchange the interview context for a short-lived
//!    credential.
//! 2. `Negotiating`: acquire the media pipeline, create the offer, submit it
//!    to the voice-agent endpoint, apply the answer.
//! 3. `Active`: once the event channel opens, send `response.create` after
//!    the configured delay; derive speaking/connected state from the channel.
//!
//! `stop()` tears everything down from any state. Every asynchronous step is
//! tagged with the activation's attempt number and its result is discarded if
//! the session it belonged to is gone, so a credential or SDP answer arriving
//! after `stop()` is never applied.

use crate::arbiter::{ConflictArbiter, EngineLease};
use crate::channel::{ChannelEffect, ClientEvent, EventChannel};
use crate::config::RealtimeConfig;
use crate::credential::{CredentialProvider, EphemeralCredential};
use crate::error::VoiceError;
use crate::media::{MediaDevices, MediaPipeline, PeerConnection, PeerConnector, PeerEvent};
use crate::negotiation::SdpNegotiator;
use intervox_types::{InterviewContext, SessionKind, SessionState, TranscriptEntry};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the per-controller event broadcast channel.
const VOICE_EVENT_BROADCAST_CAPACITY: usize = 256;

/// Notifications published by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    StateChanged(SessionState),
    Connected(bool),
    Speaking(bool),
    Transcript(TranscriptEntry),
    Error(VoiceError),
}

/// Snapshot of the controller's derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceStatus {
    pub state: SessionState,
    pub connected: bool,
    pub speaking: bool,
    pub last_error: Option<VoiceError>,
}

/// The external collaborators a controller needs.
pub struct VoiceBackends {
    pub credentials: Arc<dyn CredentialProvider>,
    pub negotiator: Arc<dyn SdpNegotiator>,
    pub devices: Arc<dyn MediaDevices>,
    /// Candidate transports in preference order. The arbiter picks the first
    /// whose engine does not collide with the video call.
    pub transports: Vec<Arc<dyn PeerConnector>>,
}

struct VoiceSession {
    attempt: u64,
    cancel: CancellationToken,
    transport: usize,
    pipeline: Option<MediaPipeline>,
    channel: EventChannel,
    /// The kickoff delay elapsed before the answer was applied.
    kickoff_deferred: bool,
    _lease: EngineLease,
}

impl VoiceSession {
    fn send_response_create(&self) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };
        match pipeline.send(&ClientEvent::response_create().to_json()) {
            Ok(()) => info!(attempt = self.attempt, "sent initial response.create"),
            Err(e) => warn!(attempt = self.attempt, error = %e, "failed to send response.create"),
        }
    }
}

/// What one activation needs to drive its session.
struct Ticket {
    attempt: u64,
    cancel: CancellationToken,
    transport: usize,
    eviction: CancellationToken,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    attempt: u64,
    session: Option<VoiceSession>,
    last_error: Option<VoiceError>,
}

impl Inner {
    fn current(&mut self, attempt: u64) -> Option<&mut VoiceSession> {
        self.session.as_mut().filter(|s| s.attempt == attempt)
    }
}

struct Shared {
    config: RealtimeConfig,
    backends: VoiceBackends,
    arbiter: Arc<ConflictArbiter>,
    events: broadcast::Sender<VoiceEvent>,
    inner: Mutex<Inner>,
}

/// Owns the voice session and sequences its life cycle.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        config: RealtimeConfig,
        backends: VoiceBackends,
        arbiter: Arc<ConflictArbiter>,
    ) -> Self {
        let (events, _) = broadcast::channel(VOICE_EVENT_BROADCAST_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                backends,
                arbiter,
                events,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: VoiceEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn status(&self) -> VoiceStatus {
        let inner = self.lock();
        let channel = inner.session.as_ref().map(|s| &s.channel);
        VoiceStatus {
            state: inner.state,
            connected: channel.is_some_and(EventChannel::is_open),
            speaking: channel.is_some_and(EventChannel::is_speaking),
            last_error: inner.last_error.clone(),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Starts a voice session for `context`.
    ///
    /// A no-op while a session is requesting, negotiating or active. Returns
    /// `Ok(())` when the attempt was superseded by `stop()`.
    ///
    /// # Errors
    ///
    /// [`VoiceError::Configuration`] when no usable context is given, or any
    /// terminal error raised while bringing the session up; the session is
    /// then `Errored`.
    pub async fn activate(&self, context: Option<InterviewContext>) -> Result<(), VoiceError> {
        let Some(Ticket {
            attempt,
            cancel,
            transport,
            eviction,
        }) = self.begin(context.as_ref())?
        else {
            return Ok(());
        };

        self.watch_eviction(attempt, cancel.clone(), eviction);

        // `begin` only returns a ticket for a complete context.
        let context = context.unwrap_or_default();
        match self.bring_up(attempt, &cancel, transport, &context).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.fail(attempt, e.clone()) {
                    Err(e)
                } else {
                    debug!(attempt, error = %e, "discarding error from superseded attempt");
                    Ok(())
                }
            }
        }
    }

    /// Validates the request and moves `Idle`/`Errored` → `Requesting`.
    fn begin(&self, context: Option<&InterviewContext>) -> Result<Option<Ticket>, VoiceError> {
        let mut inner = self.lock();

        if inner.state.is_live() {
            debug!(state = %inner.state, "activation ignored; session already live");
            return Ok(None);
        }

        if !context.is_some_and(InterviewContext::is_complete) {
            let err =
                VoiceError::Configuration("no interview context available".to_string());
            inner.last_error = Some(err.clone());
            self.emit(VoiceEvent::Error(err.clone()));
            return Err(err);
        }

        // Leftovers of an errored session must be gone before new handles
        // are acquired.
        if let Some(session) = inner.session.take() {
            self.teardown(session);
        }

        let profiles: Vec<_> = self
            .shared
            .backends
            .transports
            .iter()
            .map(|t| t.engine())
            .collect();
        let (transport, lease) = match self
            .shared
            .arbiter
            .acquire_any(SessionKind::VoiceAgent, &profiles)
        {
            Ok(granted) => granted,
            Err(e) => {
                inner.last_error = Some(e.clone());
                self.emit(VoiceEvent::Error(e.clone()));
                return Err(e);
            }
        };

        inner.attempt += 1;
        let attempt = inner.attempt;
        let cancel = CancellationToken::new();
        let eviction = lease.eviction_token();
        inner.session = Some(VoiceSession {
            attempt,
            cancel: cancel.clone(),
            transport,
            pipeline: None,
            channel: EventChannel::new(self.shared.config.agent_role),
            kickoff_deferred: false,
            _lease: lease,
        });
        inner.last_error = None;
        self.transition(&mut inner, SessionState::Requesting);
        info!(attempt, transport, "voice session activation started");

        Ok(Some(Ticket {
            attempt,
            cancel,
            transport,
            eviction,
        }))
    }

    async fn bring_up(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        transport: usize,
        context: &InterviewContext,
    ) -> Result<(), VoiceError> {
        let credential: EphemeralCredential = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = self.shared.backends.credentials.fetch(context) => result?,
        };

        if !self.advance(attempt, SessionState::Requesting, SessionState::Negotiating) {
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::clone(&self.shared.backends.transports[transport]);
        let Some(pipeline) = MediaPipeline::acquire(
            self.shared.backends.devices.as_ref(),
            connector.as_ref(),
            &self.shared.config.audio,
            &self.shared.config.data_channel_label,
            tx,
            cancel,
        )
        .await?
        else {
            debug!(attempt, "media acquisition abandoned by superseded attempt");
            return Ok(());
        };
        let peer = pipeline.peer();

        if !self.install_pipeline(attempt, pipeline) {
            return Ok(());
        }
        self.spawn_event_pump(attempt, cancel.clone(), rx);

        let offer = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = peer.create_offer() => result?,
        };
        if !self.is_current(attempt) {
            return Ok(());
        }

        let answer = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = self.shared.backends.negotiator.negotiate(&offer, &credential) => result?,
        };
        if !self.is_current(attempt) {
            debug!(attempt, "discarding SDP answer for superseded attempt");
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = peer.apply_answer(&answer) => result?,
        }

        if self.advance(attempt, SessionState::Negotiating, SessionState::Active) {
            info!(attempt, "voice session active");
            self.flush_deferred_kickoff(attempt);
        }
        Ok(())
    }

    fn flush_deferred_kickoff(&self, attempt: u64) {
        let mut inner = self.lock();
        let Some(session) = inner.current(attempt) else {
            return;
        };
        if std::mem::take(&mut session.kickoff_deferred) && session.channel.is_open() {
            session.send_response_create();
        }
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.lock().current(attempt).is_some()
    }

    /// Moves `from` → `to` if `attempt` still owns the session.
    fn advance(&self, attempt: u64, from: SessionState, to: SessionState) -> bool {
        let mut inner = self.lock();
        if inner.current(attempt).is_none() || inner.state != from {
            return false;
        }
        self.transition(&mut inner, to);
        true
    }

    fn install_pipeline(&self, attempt: u64, mut pipeline: MediaPipeline) -> bool {
        let mut inner = self.lock();
        let negotiating = inner.state == SessionState::Negotiating;
        match inner.current(attempt) {
            Some(session) if negotiating => {
                session.pipeline = Some(pipeline);
                true
            }
            _ => {
                debug!(attempt, "releasing pipeline acquired by superseded attempt");
                pipeline.release();
                false
            }
        }
    }

    fn transition(&self, inner: &mut Inner, next: SessionState) {
        if inner.state == next {
            return;
        }
        info!(from = %inner.state, to = %next, "voice session state changed");
        inner.state = next;
        self.emit(VoiceEvent::StateChanged(next));
    }

    /// Moves the session of `attempt` to `Errored` and releases its handles.
    /// Returns `false` if the attempt was already superseded.
    fn fail(&self, attempt: u64, err: VoiceError) -> bool {
        let mut inner = self.lock();
        if inner.current(attempt).is_none() {
            return false;
        }
        self.fail_locked(&mut inner, err);
        true
    }

    fn fail_locked(&self, inner: &mut Inner, err: VoiceError) {
        warn!(kind = err.kind(), error = %err, "voice session failed");
        if let Some(session) = inner.session.take() {
            self.teardown(session);
        }
        inner.last_error = Some(err.clone());
        self.transition(inner, SessionState::Errored);
        self.emit(VoiceEvent::Error(err));
    }

    fn teardown(&self, mut session: VoiceSession) {
        session.cancel.cancel();
        let was_open = session.channel.is_open();
        if let Some(ChannelEffect::Speaking(false)) = session.channel.close() {
            self.emit(VoiceEvent::Speaking(false));
        }
        if was_open {
            self.emit(VoiceEvent::Connected(false));
        }
        if let Some(mut pipeline) = session.pipeline.take() {
            pipeline.release();
        }
        debug!(attempt = session.attempt, transport = session.transport, "voice session torn down");
        // Dropping the session releases the engine lease.
    }

    /// Tears down the current session, if any, and returns to `Idle`.
    ///
    /// Safe from every state and re-entrant.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Idle && inner.session.is_none() {
            return;
        }
        self.transition(&mut inner, SessionState::Stopping);
        if let Some(session) = inner.session.take() {
            self.teardown(session);
        }
        inner.last_error = None;
        self.transition(&mut inner, SessionState::Idle);
    }

    /// Reacts to the human video call's participant roster.
    ///
    /// A real participant replaces the synthetic one, so any live voice
    /// session is stopped.
    pub fn on_real_participant(&self, present: bool) {
        if !present {
            return;
        }
        let state = self.state();
        if state.is_live() {
            info!(%state, "real participant joined; pre-empting voice agent");
            self.stop();
        }
    }

    fn watch_eviction(&self, attempt: u64, cancel: CancellationToken, eviction: CancellationToken) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = eviction.cancelled() => {
                    controller.fail(
                        attempt,
                        VoiceError::Conflict(
                            "duplicate call engine detected; voice session evicted".to_string(),
                        ),
                    );
                }
            }
        });
    }

    fn spawn_event_pump(
        &self,
        attempt: u64,
        cancel: CancellationToken,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        let controller = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(event) => {
                        if !controller.handle_peer_event(attempt, event) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            debug!(attempt, "peer event pump finished");
        });
    }

    /// Applies one peer callback. Returns `false` once the attempt is stale.
    fn handle_peer_event(&self, attempt: u64, event: PeerEvent) -> bool {
        let mut inner = self.lock();
        let Some(session) = inner.current(attempt) else {
            return false;
        };

        match event {
            PeerEvent::ChannelOpen => {
                if session.channel.open() {
                    info!(attempt, "event channel open");
                    let cancel = session.cancel.clone();
                    self.emit(VoiceEvent::Connected(true));
                    self.schedule_kickoff(attempt, cancel);
                }
            }
            PeerEvent::ChannelClosed => {
                let was_open = session.channel.is_open();
                if let Some(ChannelEffect::Speaking(false)) = session.channel.close() {
                    self.emit(VoiceEvent::Speaking(false));
                }
                if was_open {
                    info!(attempt, "event channel closed");
                    self.emit(VoiceEvent::Connected(false));
                }
            }
            PeerEvent::ChannelMessage(raw) => match session.channel.handle_frame(&raw) {
                Some(ChannelEffect::Speaking(speaking)) => {
                    self.emit(VoiceEvent::Speaking(speaking));
                }
                Some(ChannelEffect::Transcript(entry)) => {
                    self.emit(VoiceEvent::Transcript(entry));
                }
                Some(ChannelEffect::ProtocolError(message)) => {
                    self.fail_locked(&mut inner, VoiceError::AgentProtocol(message));
                    return false;
                }
                None => {}
            },
            PeerEvent::RemoteTrack(stream) => {
                if let Some(pipeline) = session.pipeline.as_mut() {
                    if pipeline.bind_remote(stream) {
                        info!(attempt, "remote audio bound to playback sink");
                    }
                }
            }
            PeerEvent::StateChanged(state) if state.is_terminal_failure() => {
                self.fail_locked(
                    &mut inner,
                    VoiceError::Negotiation(format!("peer connection {state:?}").to_lowercase()),
                );
                return false;
            }
            PeerEvent::StateChanged(state) => {
                debug!(attempt, ?state, "peer connection state");
            }
        }
        true
    }

    fn schedule_kickoff(&self, attempt: u64, cancel: CancellationToken) {
        let controller = self.clone();
        let delay = self.shared.config.kickoff_delay();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => controller.send_kickoff(attempt),
            }
        });
    }

    fn send_kickoff(&self, attempt: u64) {
        let mut inner = self.lock();
        let active = inner.state == SessionState::Active;
        let Some(session) = inner.current(attempt) else {
            return;
        };
        if !session.channel.is_open() {
            debug!(attempt, "skipping response.create; event channel closed");
            return;
        }
        if !active {
            debug!(attempt, "deferring response.create until the answer is applied");
            session.kickoff_deferred = true;
            return;
        }
        session.send_response_create();
    }
}
