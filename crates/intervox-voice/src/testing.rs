//! In-process doubles for the media, peer and HTTP seams.
//!
//! Every double counts the handles it hands out so tests can assert that a
//! session released everything it acquired.

use crate::arbiter::EngineProfile;
use crate::config::AudioConstraints;
use crate::credential::{CredentialProvider, EphemeralCredential};
use crate::error::VoiceError;
use crate::media::{
    LocalAudioStream, LocalAudioTrack, MediaDevices, PeerConnection, PeerConnector, PeerEvent,
    PeerEventSender, PlaybackSink, RemoteStream,
};
use crate::negotiation::SdpNegotiator;
use async_trait::async_trait;
use intervox_types::InterviewContext;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct DevicesState {
    live_streams: usize,
    live_sinks: usize,
    opened: usize,
    attached: Vec<String>,
    last_constraints: Option<AudioConstraints>,
}

/// Microphone and playback doubles.
#[derive(Clone)]
pub struct FakeDevices {
    tracks: usize,
    denied: bool,
    first_open_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    state: Arc<Mutex<DevicesState>>,
}

impl Default for FakeDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevices {
    /// A microphone with one track.
    pub fn new() -> Self {
        Self::with_tracks(1)
    }

    pub fn with_tracks(tracks: usize) -> Self {
        Self {
            tracks,
            denied: false,
            first_open_gate: Arc::default(),
            state: Arc::default(),
        }
    }

    /// Holds the first microphone request, like an unanswered permission
    /// prompt, until the returned handle is notified. Later requests pass.
    pub fn gated() -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let devices = Self::new();
        *lock(&devices.first_open_gate) = Some(Arc::clone(&notify));
        (devices, notify)
    }

    /// A microphone the user refused.
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::new()
        }
    }

    pub fn live_streams(&self) -> usize {
        lock(&self.state).live_streams
    }

    pub fn live_sinks(&self) -> usize {
        lock(&self.state).live_sinks
    }

    pub fn opened_streams(&self) -> usize {
        lock(&self.state).opened
    }

    pub fn attached_streams(&self) -> Vec<String> {
        lock(&self.state).attached.clone()
    }

    pub fn last_constraints(&self) -> Option<AudioConstraints> {
        lock(&self.state).last_constraints
    }
}

struct FakeStream {
    tracks: Vec<LocalAudioTrack>,
    stopped: AtomicBool,
    state: Arc<Mutex<DevicesState>>,
}

impl LocalAudioStream for FakeStream {
    fn tracks(&self) -> Vec<LocalAudioTrack> {
        self.tracks.clone()
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            lock(&self.state).live_streams -= 1;
        }
    }
}

struct FakeSink {
    released: bool,
    state: Arc<Mutex<DevicesState>>,
}

impl PlaybackSink for FakeSink {
    fn attach(&mut self, stream: &RemoteStream) {
        lock(&self.state).attached.push(stream.id.clone());
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            lock(&self.state).live_sinks -= 1;
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Box<dyn LocalAudioStream>, VoiceError> {
        let gate = lock(&self.first_open_gate).take();
        if let Some(notify) = gate {
            notify.notified().await;
        }

        let mut state = lock(&self.state);
        state.last_constraints = Some(*constraints);
        if self.denied {
            return Err(VoiceError::MediaAccess("permission denied".to_string()));
        }
        state.live_streams += 1;
        state.opened += 1;
        let tracks = (0..self.tracks)
            .map(|i| LocalAudioTrack {
                id: format!("mic-{i}"),
                label: "Fake microphone".to_string(),
            })
            .collect();
        Ok(Box::new(FakeStream {
            tracks,
            stopped: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        }))
    }

    fn create_playback_sink(&self) -> Box<dyn PlaybackSink> {
        lock(&self.state).live_sinks += 1;
        Box::new(FakeSink {
            released: false,
            state: Arc::clone(&self.state),
        })
    }
}

/// A peer connection that records what it was asked to do.
#[derive(Default)]
pub struct FakePeer {
    tracks: Mutex<Vec<LocalAudioTrack>>,
    offer: Mutex<Option<String>>,
    answer: Mutex<Option<String>>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakePeer {
    pub fn tracks(&self) -> Vec<LocalAudioTrack> {
        lock(&self.tracks).clone()
    }

    pub fn offer(&self) -> Option<String> {
        lock(&self.offer).clone()
    }

    pub fn answer(&self) -> Option<String> {
        lock(&self.answer).clone()
    }

    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_track(&self, track: &LocalAudioTrack) -> Result<(), VoiceError> {
        lock(&self.tracks).push(track.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, VoiceError> {
        let offer = format!("v=0\r\ns=fake-offer\r\na=tracks:{}\r\n", lock(&self.tracks).len());
        *lock(&self.offer) = Some(offer.clone());
        Ok(offer)
    }

    async fn apply_answer(&self, answer_sdp: &str) -> Result<(), VoiceError> {
        *lock(&self.answer) = Some(answer_sdp.to_string());
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), VoiceError> {
        if self.is_closed() {
            return Err(VoiceError::Negotiation("data channel closed".to_string()));
        }
        lock(&self.sent).push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnectorState {
    peers: Vec<Arc<FakePeer>>,
    events: Option<PeerEventSender>,
    labels: Vec<String>,
}

/// Hands out [`FakePeer`]s and lets tests inject peer callbacks.
#[derive(Clone)]
pub struct FakeConnector {
    profile: EngineProfile,
    fail_connect: bool,
    state: Arc<Mutex<ConnectorState>>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::with_profile(EngineProfile::peer_connection())
    }

    pub fn with_profile(profile: EngineProfile) -> Self {
        Self {
            profile,
            fail_connect: false,
            state: Arc::default(),
        }
    }

    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state).peers.len()
    }

    pub fn last_peer(&self) -> Option<Arc<FakePeer>> {
        lock(&self.state).peers.last().cloned()
    }

    pub fn channel_labels(&self) -> Vec<String> {
        lock(&self.state).labels.clone()
    }

    /// Delivers a callback on the most recent connection. Returns `false` if
    /// nobody is listening any more.
    pub fn emit(&self, event: PeerEvent) -> bool {
        match lock(&self.state).events.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    fn engine(&self) -> EngineProfile {
        self.profile.clone()
    }

    async fn connect(
        &self,
        channel_label: &str,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerConnection>, VoiceError> {
        if self.fail_connect {
            return Err(VoiceError::Negotiation(
                "peer connection unavailable".to_string(),
            ));
        }
        let peer = Arc::new(FakePeer::default());
        let mut state = lock(&self.state);
        state.peers.push(Arc::clone(&peer));
        state.events = Some(events);
        state.labels.push(channel_label.to_string());
        Ok(peer)
    }
}

/// Optional hold point for a double's async call.
#[derive(Clone, Default)]
struct Gate(Option<Arc<Notify>>);

impl Gate {
    async fn pass(&self) {
        if let Some(notify) = &self.0 {
            notify.notified().await;
        }
    }
}

/// Returns a fixed credential, optionally after the test opens a gate.
#[derive(Clone)]
pub struct StaticCredentials {
    result: Result<EphemeralCredential, VoiceError>,
    gate: Gate,
    calls: Arc<AtomicUsize>,
}

impl StaticCredentials {
    pub fn new(value: &str) -> Self {
        Self {
            result: Ok(EphemeralCredential::new(value)),
            gate: Gate::default(),
            calls: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(VoiceError::Configuration(message.to_string())),
            ..Self::new("")
        }
    }

    /// Holds every fetch until the returned handle is notified.
    pub fn gated(value: &str) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let credentials = Self {
            gate: Gate(Some(Arc::clone(&notify))),
            ..Self::new(value)
        };
        (credentials, notify)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn fetch(&self, _context: &InterviewContext) -> Result<EphemeralCredential, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.result.clone()
    }
}

/// Answers offers with a fixed SDP or rejects them.
#[derive(Clone)]
pub struct ScriptedNegotiator {
    result: Result<String, VoiceError>,
    gate: Gate,
    offers: Arc<Mutex<Vec<String>>>,
}

impl ScriptedNegotiator {
    pub fn answering(answer: &str) -> Self {
        Self {
            result: Ok(answer.to_string()),
            gate: Gate::default(),
            offers: Arc::default(),
        }
    }

    /// Fails as a non-success response with `status_text` would.
    pub fn rejecting(status_text: &str) -> Self {
        Self {
            result: Err(VoiceError::Negotiation(status_text.to_string())),
            ..Self::answering("")
        }
    }

    pub fn gated(answer: &str) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let negotiator = Self {
            gate: Gate(Some(Arc::clone(&notify))),
            ..Self::answering(answer)
        };
        (negotiator, notify)
    }

    pub fn offers(&self) -> Vec<String> {
        lock(&self.offers).clone()
    }
}

#[async_trait]
impl SdpNegotiator for ScriptedNegotiator {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        _credential: &EphemeralCredential,
    ) -> Result<String, VoiceError> {
        lock(&self.offers).push(offer_sdp.to_string());
        self.gate.pass().await;
        self.result.clone()
    }
}
