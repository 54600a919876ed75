//! Voice-agent session control for the interview room.
//!
//! A [`SessionController`] connects the local microphone to a remote
//! conversational voice agent over a peer connection. It fetches a
//! short-lived credential from the trust boundary, negotiates the session
//! with the provider, plays the agent's audio, and interprets the event
//! channel to derive speaking state and transcript entries.
//!
//! The host supplies the media engine through the traits in [`media`]. A
//! [`ConflictArbiter`] keeps the voice session and the human video call from
//! instantiating colliding call engines.

pub mod arbiter;
pub mod channel;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod media;
pub mod negotiation;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arbiter::{ConflictArbiter, EngineLease, EngineProfile};
pub use channel::{ChannelEffect, ChannelState, ClientEvent, DispatchTable, EventChannel, ProtocolEvent};
pub use config::{AudioConstraints, RealtimeConfig};
pub use controller::{SessionController, VoiceBackends, VoiceEvent, VoiceStatus};
pub use credential::{CredentialProvider, EphemeralCredential, HttpCredentialProvider};
pub use error::VoiceError;
pub use media::{
    LocalAudioStream, LocalAudioTrack, MediaDevices, MediaPipeline, PeerConnection,
    PeerConnectionState, PeerConnector, PeerEvent, PeerEventSender, PlaybackSink, RemoteStream,
};
pub use negotiation::{RealtimeNegotiator, SdpNegotiator};
