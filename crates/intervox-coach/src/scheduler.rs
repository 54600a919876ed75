//! Debounced, deduplicated suggestion retrieval.
//!
//! Transcript updates are submitted to a background task. After a quiet
//! period with no further updates, the task extracts the latest exchange and,
//! if it differs from the last exchange that produced a suggestion, asks the
//! [`SuggestionSource`] for one. Retrievals run one at a time, so a slow
//! response is never raced by a retrieval for the same exchange.

use crate::client::SuggestionSource;
use crate::config::CoachConfig;
use crate::detector::ExchangeDetector;
use crate::history::SuggestionHistory;
use intervox_types::{CoachSuggestion, SuggestionRequest};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SUGGESTION_BROADCAST_CAPACITY: usize = 64;

/// One change of the accumulated transcript.
#[derive(Debug, Clone)]
pub struct TranscriptUpdate {
    pub transcript: String,
    /// Time since the interview started.
    pub elapsed: Duration,
    /// Optional extra context for the scorer (role, job text).
    pub context: Option<String>,
}

struct Shared {
    history: Mutex<SuggestionHistory>,
    events: broadcast::Sender<CoachSuggestion>,
}

impl Shared {
    fn history(&self) -> MutexGuard<'_, SuggestionHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the suggestion history and the background retrieval task.
pub struct CoachingScheduler {
    updates: mpsc::UnboundedSender<TranscriptUpdate>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CoachingScheduler {
    /// Starts the retrieval task on the current runtime.
    pub fn spawn(config: &CoachConfig, source: Arc<dyn SuggestionSource>) -> Self {
        let (updates, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(SUGGESTION_BROADCAST_CAPACITY);
        let shared = Arc::new(Shared {
            history: Mutex::new(SuggestionHistory::new(config.history_capacity)),
            events,
        });
        let cancel = CancellationToken::new();

        let worker = Worker {
            detector: ExchangeDetector::new(&config.interviewer_label, &config.candidate_label),
            debounce: config.debounce(),
            source,
            shared: Arc::clone(&shared),
            last_processed: None,
        };
        let task = tokio::spawn(worker.run(rx, cancel.clone()));

        Self {
            updates,
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Records a transcript change and restarts the quiet period.
    pub fn submit(&self, transcript: impl Into<String>, elapsed: Duration, context: Option<String>) {
        let update = TranscriptUpdate {
            transcript: transcript.into(),
            elapsed,
            context,
        };
        if self.updates.send(update).is_err() {
            debug!("coaching scheduler stopped; dropping transcript update");
        }
    }

    /// The suggestion history, oldest first.
    pub fn suggestions(&self) -> Vec<CoachSuggestion> {
        self.shared.history().entries()
    }

    /// Removes the suggestion at `index`. Deduplication is unaffected.
    pub fn dismiss(&self, index: usize) -> Option<CoachSuggestion> {
        self.shared.history().dismiss(index)
    }

    /// Receives every suggestion as it is appended.
    pub fn subscribe(&self) -> broadcast::Receiver<CoachSuggestion> {
        self.shared.events.subscribe()
    }

    /// Stops the retrieval task, abandoning any pending or in-flight
    /// retrieval.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "coaching task ended abnormally");
            }
        }
    }
}

impl Drop for CoachingScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    detector: ExchangeDetector,
    debounce: Duration,
    source: Arc<dyn SuggestionSource>,
    shared: Arc<Shared>,
    last_processed: Option<String>,
}

impl Worker {
    async fn run(
        mut self,
        mut updates: mpsc::UnboundedReceiver<TranscriptUpdate>,
        cancel: CancellationToken,
    ) {
        let mut pending: Option<TranscriptUpdate> = None;
        let mut deadline = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => {
                        pending = Some(update);
                        deadline = Instant::now() + self.debounce;
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                    if let Some(update) = pending.take() {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = self.process(update) => {}
                        }
                    }
                }
            }
        }
        debug!("coaching task finished");
    }

    async fn process(&mut self, update: TranscriptUpdate) {
        let Some(exchange) = self.detector.detect(&update.transcript) else {
            debug!("no complete exchange in transcript");
            return;
        };

        if self.last_processed.as_deref() == Some(exchange.as_str()) {
            debug!("exchange already processed; skipping retrieval");
            return;
        }

        let request = SuggestionRequest {
            last_exchange_text: exchange,
            full_transcript: update.transcript,
            elapsed_minutes: update.elapsed.as_secs() / 60,
            context: update.context,
        };

        match self.source.suggest(&request).await {
            Ok(suggestion) => {
                info!(
                    quality = ?suggestion.answer_quality,
                    "coaching suggestion received"
                );
                self.last_processed = Some(request.last_exchange_text);
                self.shared.history().push(suggestion.clone());
                // No subscribers is fine.
                let _ = self.shared.events.send(suggestion);
            }
            Err(e) => {
                // The marker stays put so the same exchange is retried on the
                // next transcript change.
                warn!(error = %e, "coaching suggestion failed");
            }
        }
    }
}
