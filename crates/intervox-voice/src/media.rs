//! Media and peer-connection seams, and the pipeline that owns them.
//!
//! The host supplies the concrete engines (a browser binding, a native
//! WebRTC stack) through [`MediaDevices`] and [`PeerConnector`]. The
//! [`MediaPipeline`] owns one peer connection, the microphone stream, and the
//! playback sink for the remote agent's audio, and guarantees all three are
//! released exactly once.

use crate::arbiter::EngineProfile;
use crate::config::AudioConstraints;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One captured local audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAudioTrack {
    pub id: String,
    pub label: String,
}

/// A remote media stream announced by the peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

/// An open microphone capture.
pub trait LocalAudioStream: Send + Sync {
    fn tracks(&self) -> Vec<LocalAudioTrack>;

    /// Stops every track and releases the device. Idempotent.
    fn stop(&self);
}

/// The single audio output element that plays the remote agent.
pub trait PlaybackSink: Send + Sync {
    fn attach(&mut self, stream: &RemoteStream);

    /// Detaches any stream and releases the output. Idempotent.
    fn release(&mut self);
}

/// Capture and playback devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Opens the microphone. Denial must map to [`VoiceError::MediaAccess`].
    async fn open_microphone(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<Box<dyn LocalAudioStream>, VoiceError>;

    fn create_playback_sink(&self) -> Box<dyn PlaybackSink>;
}

/// Connection states reported by the peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// `failed` and `disconnected` end the session; there is no ICE restart.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected)
    }
}

/// Callbacks from the peer connection and its event channel, delivered in
/// arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    ChannelOpen,
    ChannelClosed,
    ChannelMessage(String),
    RemoteTrack(RemoteStream),
    StateChanged(PeerConnectionState),
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

/// Factory for peer connections of one engine family.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// The engine this connector instantiates, checked by the arbiter.
    fn engine(&self) -> EngineProfile;

    /// Creates a peer connection with an ordered data channel named
    /// `channel_label`. Every callback is forwarded to `events`.
    async fn connect(
        &self,
        channel_label: &str,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerConnection>, VoiceError>;
}

/// A live peer connection plus its data channel.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_track(&self, track: &LocalAudioTrack) -> Result<(), VoiceError>;

    /// Creates the offer and applies it as the local description.
    async fn create_offer(&self) -> Result<String, VoiceError>;

    /// Applies the remote answer.
    async fn apply_answer(&self, answer_sdp: &str) -> Result<(), VoiceError>;

    /// Sends a text frame on the data channel.
    fn send(&self, text: &str) -> Result<(), VoiceError>;

    /// Closes the data channel and the connection. Idempotent.
    fn close(&self);
}

/// Owns the peer connection, the microphone, and the playback sink of one
/// voice session.
pub struct MediaPipeline {
    peer: Arc<dyn PeerConnection>,
    local: Box<dyn LocalAudioStream>,
    sink: Box<dyn PlaybackSink>,
    remote: Option<RemoteStream>,
    released: bool,
}

impl MediaPipeline {
    /// Opens the microphone, creates the peer connection, and adds every local
    /// track before any offer exists. Partially acquired handles are released
    /// on failure.
    ///
    /// Returns `Ok(None)` once `cancel` fires: a pending device request is
    /// abandoned and nothing is connected afterwards.
    pub async fn acquire(
        devices: &dyn MediaDevices,
        connector: &dyn PeerConnector,
        constraints: &AudioConstraints,
        channel_label: &str,
        events: PeerEventSender,
        cancel: &CancellationToken,
    ) -> Result<Option<Self>, VoiceError> {
        let local = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = devices.open_microphone(constraints) => result?,
        };
        if cancel.is_cancelled() {
            debug!("microphone opened after cancellation; stopping it");
            local.stop();
            return Ok(None);
        }
        let tracks = local.tracks();
        if tracks.is_empty() {
            local.stop();
            return Err(VoiceError::MediaAccess(
                "microphone produced no audio tracks".to_string(),
            ));
        }

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = connector.connect(channel_label, events) => Some(result),
        };
        let peer = match connected {
            Some(Ok(peer)) if !cancel.is_cancelled() => peer,
            Some(Ok(peer)) => {
                peer.close();
                local.stop();
                return Ok(None);
            }
            Some(Err(e)) => {
                local.stop();
                return Err(e);
            }
            None => {
                local.stop();
                return Ok(None);
            }
        };

        for track in &tracks {
            if let Err(e) = peer.add_track(track) {
                peer.close();
                local.stop();
                return Err(e);
            }
        }

        info!(tracks = tracks.len(), "media pipeline acquired");

        Ok(Some(Self {
            peer,
            local,
            sink: devices.create_playback_sink(),
            remote: None,
            released: false,
        }))
    }

    pub fn peer(&self) -> Arc<dyn PeerConnection> {
        Arc::clone(&self.peer)
    }

    /// Binds a remote stream to the playback sink. Only the first stream is
    /// played; later ones are ignored.
    pub fn bind_remote(&mut self, stream: RemoteStream) -> bool {
        if self.released || self.remote.is_some() {
            debug!(stream = %stream.id, "ignoring additional remote stream");
            return false;
        }
        self.sink.attach(&stream);
        self.remote = Some(stream);
        true
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote.as_ref()
    }

    pub fn send(&self, text: &str) -> Result<(), VoiceError> {
        if self.released {
            return Err(VoiceError::Negotiation(
                "media pipeline already released".to_string(),
            ));
        }
        self.peer.send(text)
    }

    /// Closes the connection, stops the microphone, and releases the sink.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.peer.close();
        self.local.stop();
        self.sink.release();
        self.remote = None;
        info!("media pipeline released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MediaPipeline {
    fn drop(&mut self) {
        if !self.released {
            warn!("media pipeline dropped without release; releasing now");
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, FakeDevices};

    async fn acquire_with(
        devices: &FakeDevices,
        connector: &FakeConnector,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaPipeline>, VoiceError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        MediaPipeline::acquire(
            devices,
            connector,
            &AudioConstraints::default(),
            "oai-events",
            tx,
            cancel,
        )
        .await
    }

    async fn acquire(devices: &FakeDevices, connector: &FakeConnector) -> Result<MediaPipeline, VoiceError> {
        acquire_with(devices, connector, &CancellationToken::new())
            .await
            .map(|pipeline| pipeline.expect("not cancelled"))
    }

    #[tokio::test]
    async fn adds_every_local_track_before_offer() {
        let devices = FakeDevices::with_tracks(2);
        let connector = FakeConnector::new();
        let pipeline = acquire(&devices, &connector).await.expect("acquire");

        let peer = connector.last_peer().expect("peer created");
        assert_eq!(peer.tracks().len(), 2);
        assert!(peer.offer().is_none());
        assert_eq!(devices.last_constraints(), Some(AudioConstraints::default()));
        drop(pipeline);
    }

    #[tokio::test]
    async fn denied_microphone_is_media_access_error() {
        let devices = FakeDevices::denied();
        let connector = FakeConnector::new();
        let err = acquire(&devices, &connector).await.err().expect("should fail");
        assert!(matches!(err, VoiceError::MediaAccess(_)));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn connect_failure_releases_microphone() {
        let devices = FakeDevices::new();
        let connector = FakeConnector::failing_connect();
        assert!(acquire(&devices, &connector).await.is_err());
        assert_eq!(devices.live_streams(), 0);
    }

    #[tokio::test]
    async fn binds_only_first_remote_stream() {
        let devices = FakeDevices::new();
        let connector = FakeConnector::new();
        let mut pipeline = acquire(&devices, &connector).await.expect("acquire");

        assert!(pipeline.bind_remote(RemoteStream { id: "a".into() }));
        assert!(!pipeline.bind_remote(RemoteStream { id: "b".into() }));
        assert_eq!(pipeline.remote_stream().map(|s| s.id.as_str()), Some("a"));
        assert_eq!(devices.attached_streams(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn release_is_idempotent_and_frees_handles() {
        let devices = FakeDevices::new();
        let connector = FakeConnector::new();
        let mut pipeline = acquire(&devices, &connector).await.expect("acquire");
        assert_eq!(devices.live_streams(), 1);
        assert_eq!(devices.live_sinks(), 1);

        pipeline.release();
        pipeline.release();

        assert_eq!(devices.live_streams(), 0);
        assert_eq!(devices.live_sinks(), 0);
        assert!(connector.last_peer().expect("peer").is_closed());
        assert!(pipeline.send("{}").is_err());
    }

    #[tokio::test]
    async fn drop_releases_handles() {
        let devices = FakeDevices::new();
        let connector = FakeConnector::new();
        let pipeline = acquire(&devices, &connector).await.expect("acquire");
        drop(pipeline);
        assert_eq!(devices.live_streams(), 0);
        assert_eq!(devices.live_sinks(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_acquire_opens_nothing() {
        let devices = FakeDevices::new();
        let connector = FakeConnector::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let pipeline = acquire_with(&devices, &connector, &cancel).await.expect("no error");
        assert!(pipeline.is_none());
        assert_eq!(devices.opened_streams(), 0);
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_abandons_pending_microphone_request() {
        let (devices, gate) = FakeDevices::gated();
        let connector = FakeConnector::new();
        let cancel = CancellationToken::new();

        let pending = {
            let devices = devices.clone();
            let connector = connector.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { acquire_with(&devices, &connector, &cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();
        gate.notify_one();

        let pipeline = pending.await.expect("join").expect("no error");
        assert!(pipeline.is_none());
        assert_eq!(devices.live_streams(), 0);
        assert_eq!(connector.connect_count(), 0);
    }
}
