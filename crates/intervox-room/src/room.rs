//! The interview room: one human video call, one optional voice agent, and
//! the coaching assistant, all sharing a single transcript.

use crate::transcript::TranscriptLog;
use intervox_coach::CoachingScheduler;
use intervox_types::{CoachSuggestion, InterviewContext, SessionKind, TranscriptEntry};
use intervox_voice::{
    ConflictArbiter, EngineLease, EngineProfile, SessionController, VoiceError, VoiceEvent,
    VoiceStatus,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Notifications from the human video call.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoEvent {
    /// A participant joined. `synthetic` marks the room's own bots.
    ParticipantJoined { id: String, synthetic: bool },
    ParticipantLeft { id: String },
    /// A finished utterance transcribed by the call provider.
    Transcription(TranscriptEntry),
    /// The call engine reported a fault.
    EngineFault {
        duplicate_engine: bool,
        message: String,
    },
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RoomShared {
    transcript: Mutex<TranscriptLog>,
    coach: CoachingScheduler,
    started: Instant,
    coaching_context: Option<String>,
}

impl RoomShared {
    fn record(&self, entry: TranscriptEntry) {
        let rendered = {
            let mut log = lock(&self.transcript);
            if !log.push(entry) {
                return;
            }
            log.render()
        };
        self.coach
            .submit(rendered, self.started.elapsed(), self.coaching_context.clone());
    }
}

/// Coordinates the video call, the voice agent and the coaching assistant.
pub struct InterviewRoom {
    shared: Arc<RoomShared>,
    controller: SessionController,
    arbiter: Arc<ConflictArbiter>,
    context: Option<InterviewContext>,
    participants: Mutex<HashSet<String>>,
    video_lease: Mutex<Option<EngineLease>>,
    cancel: CancellationToken,
}

impl InterviewRoom {
    /// Creates the room and starts forwarding voice-agent transcripts into
    /// the shared transcript. Elapsed interview time counts from here.
    pub fn new(
        controller: SessionController,
        coach: CoachingScheduler,
        arbiter: Arc<ConflictArbiter>,
        context: Option<InterviewContext>,
    ) -> Self {
        let shared = Arc::new(RoomShared {
            transcript: Mutex::new(TranscriptLog::new()),
            coach,
            started: Instant::now(),
            coaching_context: context.as_ref().and_then(coaching_context),
        });
        let cancel = CancellationToken::new();
        spawn_transcript_forwarder(&controller, Arc::clone(&shared), cancel.clone());

        Self {
            shared,
            controller,
            arbiter,
            context,
            participants: Mutex::new(HashSet::new()),
            video_lease: Mutex::new(None),
            cancel,
        }
    }

    /// Registers the video call's engine with the arbiter.
    pub fn attach_video(&self, profile: EngineProfile) -> Result<(), VoiceError> {
        let mut slot = lock(&self.video_lease);
        if slot.is_some() {
            return Ok(());
        }
        let lease = self.arbiter.acquire(SessionKind::HumanVideo, profile)?;
        *slot = Some(lease);
        Ok(())
    }

    pub fn detach_video(&self) {
        if lock(&self.video_lease).take().is_some() {
            info!("video call engine released");
        }
    }

    pub fn has_video(&self) -> bool {
        lock(&self.video_lease).is_some()
    }

    /// Starts the AI candidate for the room's interview context.
    ///
    /// # Errors
    ///
    /// [`VoiceError::Conflict`] while a real participant is in the call, or
    /// whatever [`SessionController::activate`] reports.
    pub async fn activate_voice(&self) -> Result<(), VoiceError> {
        let present = self.real_participants();
        if present > 0 {
            warn!(present, "refusing to start voice agent alongside a real participant");
            return Err(VoiceError::Conflict(
                "a real participant is already in the call".to_string(),
            ));
        }
        self.controller.activate(self.context.clone()).await
    }

    pub fn stop_voice(&self) {
        self.controller.stop();
    }

    pub fn handle_video_event(&self, event: VideoEvent) {
        match event {
            VideoEvent::ParticipantJoined { id, synthetic: true } => {
                debug!(participant = %id, "synthetic participant joined");
            }
            VideoEvent::ParticipantJoined { id, synthetic: false } => {
                info!(participant = %id, "participant joined");
                lock(&self.participants).insert(id);
                self.controller.on_real_participant(true);
            }
            VideoEvent::ParticipantLeft { id } => {
                if lock(&self.participants).remove(&id) {
                    info!(participant = %id, "participant left");
                }
            }
            VideoEvent::Transcription(entry) => self.shared.record(entry),
            VideoEvent::EngineFault {
                duplicate_engine: true,
                message,
            } => {
                warn!(%message, "video call reported a duplicate engine");
                if self.arbiter.report_duplicate_engine(SessionKind::HumanVideo)
                    == Some(SessionKind::HumanVideo)
                {
                    self.detach_video();
                }
            }
            VideoEvent::EngineFault { message, .. } => {
                warn!(%message, "video call engine fault");
            }
        }
    }

    pub fn real_participants(&self) -> usize {
        lock(&self.participants).len()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.shared.transcript).entries().to_vec()
    }

    pub fn render_transcript(&self) -> String {
        lock(&self.shared.transcript).render()
    }

    pub fn elapsed(&self) -> Duration {
        self.shared.started.elapsed()
    }

    pub fn suggestions(&self) -> Vec<CoachSuggestion> {
        self.shared.coach.suggestions()
    }

    pub fn dismiss_suggestion(&self, index: usize) -> Option<CoachSuggestion> {
        self.shared.coach.dismiss(index)
    }

    pub fn voice_status(&self) -> VoiceStatus {
        self.controller.status()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Stops the voice agent and the coaching task and releases the video
    /// engine.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.controller.stop();
        self.detach_video();
        self.shared.coach.shutdown().await;
    }
}

impl Drop for InterviewRoom {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Extra scorer context derived from the interview context.
fn coaching_context(context: &InterviewContext) -> Option<String> {
    let mut parts = Vec::new();
    if !context.role.trim().is_empty() {
        parts.push(format!("Role: {}", context.role.trim()));
    }
    if !context.job_description.trim().is_empty() {
        parts.push(format!("Job description: {}", context.job_description.trim()));
    }
    (!parts.is_empty()).then(|| parts.join("\n"))
}

fn spawn_transcript_forwarder(
    controller: &SessionController,
    shared: Arc<RoomShared>,
    cancel: CancellationToken,
) {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(VoiceEvent::Transcript(entry)) => shared.record(entry),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transcript forwarder lagged; voice events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("transcript forwarder finished");
    });
}
