//! The realtime event protocol carried on the peer connection's data channel.
//!
//! Inbound frames are JSON objects tagged by `type`. [`EventChannel`] parses
//! each frame once and routes it through a [`DispatchTable`] of
//! `tag → handler` entries. Handlers update the channel's derived state
//! (speaking flag, last protocol error) and return at most one
//! [`ChannelEffect`] for the session controller to act on.
//!
//! | Tag | Effect |
//! |-----|--------|
//! | `session.created`, `session.updated` | none (informational) |
//! | `response.audio.delta` | speaking → true |
//! | `response.audio.done`, `response.done` | speaking → false |
//! | `response.audio_transcript.done` | agent transcript entry |
//! | `conversation.item.input_audio_transcription.completed` | human transcript entry |
//! | `conversation.item.input_audio_transcription.failed` | none (logged) |
//! | `error` | protocol error surfaced |
//!
//! Unknown tags and unparseable frames are dropped. The dispatcher never
//! returns an error.

use intervox_types::{Role, TranscriptEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One inbound protocol frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProtocolEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ProtocolEvent {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns a top-level string field of the payload.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// Returns the non-empty, trimmed `transcript` field.
    fn transcript(&self) -> Option<&str> {
        self.str_field("transcript")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Best-effort human-readable message for an `error` frame.
    fn error_message(&self) -> String {
        let error = self.payload.get("error");
        error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .or_else(|| error.and_then(Value::as_str))
            .or_else(|| self.str_field("message"))
            .unwrap_or("unspecified agent error")
            .to_string()
    }
}

/// Outbound client directives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseOptions },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseOptions {
    pub modalities: Vec<String>,
}

impl ClientEvent {
    /// The directive that starts the agent's first turn.
    pub fn response_create() -> Self {
        Self::ResponseCreate {
            response: ResponseOptions {
                modalities: vec!["audio".to_string(), "text".to_string()],
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Serialising a tagged enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// What a dispatched frame asks the controller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEffect {
    Speaking(bool),
    Transcript(TranscriptEntry),
    ProtocolError(String),
}

/// Channel life cycle: `Connecting` (closed, never opened) → `Open` → `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Mutable derived state handed to handlers.
#[derive(Debug)]
pub struct ChannelFlags {
    pub speaking: bool,
    pub agent_role: Role,
    pub last_error: Option<String>,
}

impl ChannelFlags {
    fn set_speaking(&mut self, speaking: bool) -> Option<ChannelEffect> {
        if self.speaking == speaking {
            return None;
        }
        self.speaking = speaking;
        Some(ChannelEffect::Speaking(speaking))
    }
}

fn transcribed(role: Role, text: &str) -> Option<ChannelEffect> {
    Some(ChannelEffect::Transcript(TranscriptEntry::new(role, text)))
}

pub type Handler = fn(&mut ChannelFlags, &ProtocolEvent) -> Option<ChannelEffect>;

/// `type` tag → handler.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<&'static str, Handler>,
}

impl DispatchTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The handlers for the realtime voice-agent protocol.
    pub fn realtime() -> Self {
        let mut table = Self::empty();
        table.register("session.created", on_informational);
        table.register("session.updated", on_informational);
        table.register("response.audio.delta", on_audio_delta);
        table.register("response.audio.done", on_audio_done);
        table.register("response.done", on_audio_done);
        table.register("response.audio_transcript.done", on_agent_transcript);
        table.register(
            "conversation.item.input_audio_transcription.completed",
            on_human_transcript,
        );
        table.register(
            "conversation.item.input_audio_transcription.failed",
            on_transcription_failed,
        );
        table.register("error", on_error);
        table
    }

    /// Registers `handler` for `tag`, returning the handler it replaced.
    pub fn register(&mut self, tag: &'static str, handler: Handler) -> Option<Handler> {
        self.handlers.insert(tag, handler)
    }

    pub fn unregister(&mut self, tag: &str) -> Option<Handler> {
        self.handlers.remove(tag)
    }

    pub fn handles(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    fn get(&self, tag: &str) -> Option<Handler> {
        self.handlers.get(tag).copied()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::realtime()
    }
}

fn on_informational(_: &mut ChannelFlags, event: &ProtocolEvent) -> Option<ChannelEffect> {
    info!(event = %event.kind, "agent session event");
    None
}

fn on_audio_delta(flags: &mut ChannelFlags, _: &ProtocolEvent) -> Option<ChannelEffect> {
    flags.set_speaking(true)
}

fn on_audio_done(flags: &mut ChannelFlags, _: &ProtocolEvent) -> Option<ChannelEffect> {
    flags.set_speaking(false)
}

fn on_agent_transcript(flags: &mut ChannelFlags, event: &ProtocolEvent) -> Option<ChannelEffect> {
    let text = event.transcript()?;
    transcribed(flags.agent_role, text)
}

fn on_human_transcript(flags: &mut ChannelFlags, event: &ProtocolEvent) -> Option<ChannelEffect> {
    let text = event.transcript()?;
    transcribed(counterpart(flags.agent_role), text)
}

fn on_transcription_failed(_: &mut ChannelFlags, event: &ProtocolEvent) -> Option<ChannelEffect> {
    warn!(error = %event.error_message(), "input audio transcription failed");
    None
}

fn on_error(flags: &mut ChannelFlags, event: &ProtocolEvent) -> Option<ChannelEffect> {
    let message = event.error_message();
    warn!(error = %message, "agent reported protocol error");
    flags.last_error = Some(message.clone());
    Some(ChannelEffect::ProtocolError(message))
}

fn counterpart(role: Role) -> Role {
    match role {
        Role::Interviewer => Role::Candidate,
        Role::Candidate => Role::Interviewer,
    }
}

/// Interprets the inbound protocol of one voice session.
pub struct EventChannel {
    state: ChannelState,
    flags: ChannelFlags,
    table: DispatchTable,
}

impl EventChannel {
    pub fn new(agent_role: Role) -> Self {
        Self::with_table(agent_role, DispatchTable::realtime())
    }

    pub fn with_table(agent_role: Role, table: DispatchTable) -> Self {
        Self {
            state: ChannelState::Connecting,
            flags: ChannelFlags {
                speaking: false,
                agent_role,
                last_error: None,
            },
            table,
        }
    }

    /// Marks the channel open. Returns `true` only for the first opening.
    pub fn open(&mut self) -> bool {
        if self.state != ChannelState::Connecting {
            return false;
        }
        self.state = ChannelState::Open;
        true
    }

    /// Marks the channel closed. The speaking flag is cleared.
    pub fn close(&mut self) -> Option<ChannelEffect> {
        self.state = ChannelState::Closed;
        self.flags.set_speaking(false)
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn is_speaking(&self) -> bool {
        self.flags.speaking
    }

    pub fn last_error(&self) -> Option<&str> {
        self.flags.last_error.as_deref()
    }

    pub fn table_mut(&mut self) -> &mut DispatchTable {
        &mut self.table
    }

    /// Parses and dispatches one raw frame.
    pub fn handle_frame(&mut self, raw: &str) -> Option<ChannelEffect> {
        if self.state != ChannelState::Open {
            debug!(state = ?self.state, "dropping frame received while channel not open");
            return None;
        }

        let event = match ProtocolEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = raw.len(), "dropping unparseable protocol frame");
                return None;
            }
        };

        self.dispatch(&event)
    }

    /// Routes an already-parsed event.
    pub fn dispatch(&mut self, event: &ProtocolEvent) -> Option<ChannelEffect> {
        match self.table.get(&event.kind) {
            Some(handler) => handler(&mut self.flags, event),
            None => {
                debug!(event = %event.kind, "ignoring unhandled protocol event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_channel() -> EventChannel {
        let mut channel = EventChannel::new(Role::Candidate);
        assert!(channel.open());
        channel
    }

    fn frame(value: Value) -> String {
        value.to_string()
    }

    #[test]
    fn audio_delta_then_done_toggles_speaking_once() {
        let mut channel = open_channel();
        let mut effects = Vec::new();
        for raw in [
            frame(json!({"type": "response.audio.delta", "delta": "AAA"})),
            frame(json!({"type": "response.audio.delta", "delta": "BBB"})),
            frame(json!({"type": "rate_limits.updated"})),
            frame(json!({"type": "session.updated"})),
            frame(json!({"type": "response.audio.done"})),
            frame(json!({"type": "response.done"})),
        ] {
            if let Some(effect) = channel.handle_frame(&raw) {
                effects.push(effect);
            }
        }
        assert_eq!(
            effects,
            vec![ChannelEffect::Speaking(true), ChannelEffect::Speaking(false)]
        );
        assert!(!channel.is_speaking());
    }

    #[test]
    fn agent_transcript_uses_agent_role() {
        let mut channel = open_channel();
        let effect = channel.handle_frame(&frame(json!({
            "type": "response.audio_transcript.done",
            "transcript": "  I built a queue.  "
        })));
        match effect {
            Some(ChannelEffect::Transcript(entry)) => {
                assert_eq!(entry.role, Role::Candidate);
                assert_eq!(entry.content, "I built a queue.");
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn human_transcript_uses_counterpart_role() {
        let mut channel = open_channel();
        let effect = channel.handle_frame(&frame(json!({
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_1",
            "transcript": "Why Rust?"
        })));
        match effect {
            Some(ChannelEffect::Transcript(entry)) => {
                assert_eq!(entry.role, Role::Interviewer);
                assert_eq!(entry.content, "Why Rust?");
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn empty_transcripts_are_skipped() {
        let mut channel = open_channel();
        assert_eq!(
            channel.handle_frame(&frame(json!({
                "type": "response.audio_transcript.done",
                "transcript": "   "
            }))),
            None
        );
        assert_eq!(
            channel.handle_frame(&frame(json!({
                "type": "conversation.item.input_audio_transcription.completed"
            }))),
            None
        );
    }

    #[test]
    fn error_frame_surfaces_message() {
        let mut channel = open_channel();
        let effect = channel.handle_frame(&frame(json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "bad session"}
        })));
        assert_eq!(effect, Some(ChannelEffect::ProtocolError("bad session".into())));
        assert_eq!(channel.last_error(), Some("bad session"));
    }

    #[test]
    fn transcription_failure_is_not_fatal() {
        let mut channel = open_channel();
        let effect = channel.handle_frame(&frame(json!({
            "type": "conversation.item.input_audio_transcription.failed",
            "error": {"message": "audio too short"}
        })));
        assert_eq!(effect, None);
        assert_eq!(channel.last_error(), None);
    }

    #[test]
    fn malformed_and_unknown_frames_are_dropped() {
        let mut channel = open_channel();
        assert_eq!(channel.handle_frame("not json"), None);
        assert_eq!(channel.handle_frame("{\"no_type\": 1}"), None);
        assert_eq!(channel.handle_frame("[1,2,3]"), None);
        assert_eq!(channel.handle_frame(&frame(json!({"type": "future.event"}))), None);
        assert!(channel.is_open());
    }

    #[test]
    fn frames_before_open_or_after_close_are_ignored() {
        let mut channel = EventChannel::new(Role::Candidate);
        let delta = frame(json!({"type": "response.audio.delta"}));
        assert_eq!(channel.handle_frame(&delta), None);

        assert!(channel.open());
        assert!(!channel.open(), "second open is not a transition");
        assert_eq!(channel.handle_frame(&delta), Some(ChannelEffect::Speaking(true)));

        assert_eq!(channel.close(), Some(ChannelEffect::Speaking(false)));
        assert_eq!(channel.handle_frame(&delta), None);
        assert!(!channel.open(), "a closed channel does not reopen");
    }

    #[test]
    fn unregistered_tag_falls_through() {
        let mut channel = open_channel();
        channel.table_mut().unregister("response.audio.delta");
        assert!(!channel.table_mut().handles("response.audio.delta"));
        assert_eq!(
            channel.handle_frame(&frame(json!({"type": "response.audio.delta"}))),
            None
        );
    }

    #[test]
    fn response_create_directive_shape() {
        let value: Value = serde_json::from_str(&ClientEvent::response_create().to_json()).unwrap();
        assert_eq!(
            value,
            json!({"type": "response.create", "response": {"modalities": ["audio", "text"]}})
        );
    }
}
