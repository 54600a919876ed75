//! Arbitration between the human video call and the voice agent.
//!
//! Every real-time session holds an [`EngineLease`] for the call engine it
//! instantiates. The arbiter refuses a lease whose engine family is already
//! held, or that would share the execution context with an engine that does
//! not tolerate other instances. Leases are released on drop.
//!
//! A runtime "duplicate engine" report evicts the most recently acquired
//! lease; its holder observes the eviction through
//! [`EngineLease::eviction_token`] and tears itself down.

use crate::error::VoiceError;
use intervox_types::{EngineFamily, SessionKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The engine a session instantiates and how it tolerates siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    pub family: EngineFamily,
    /// The engine was created in a mode that permits other engine instances
    /// in the same execution context.
    pub allow_multiple_instances: bool,
}

impl EngineProfile {
    pub fn new(family: EngineFamily, allow_multiple_instances: bool) -> Self {
        Self {
            family,
            allow_multiple_instances,
        }
    }

    /// The hosted call engine of the human video session, created with
    /// multiple-instance support enabled.
    pub fn hosted_call() -> Self {
        Self::new(EngineFamily::HostedCall, true)
    }

    /// A bare peer connection; it instantiates no call engine.
    pub fn peer_connection() -> Self {
        Self::new(EngineFamily::PeerConnection, true)
    }
}

#[derive(Debug)]
struct LeaseRecord {
    id: u64,
    kind: SessionKind,
    profile: EngineProfile,
    eviction: CancellationToken,
}

#[derive(Debug, Default)]
struct ArbiterState {
    next_id: u64,
    leases: Vec<LeaseRecord>,
}

/// Grants engine leases and resolves duplicate-engine reports.
#[derive(Debug, Default)]
pub struct ConflictArbiter {
    state: Mutex<ArbiterState>,
}

impl ConflictArbiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks `profile` against every held lease.
    pub fn check(&self, kind: SessionKind, profile: &EngineProfile) -> Result<(), VoiceError> {
        check_against(&self.lock().leases, kind, profile)
    }

    /// Grants a lease for `profile`.
    pub fn acquire(
        self: &Arc<Self>,
        kind: SessionKind,
        profile: EngineProfile,
    ) -> Result<EngineLease, VoiceError> {
        self.acquire_any(kind, std::slice::from_ref(&profile))
            .map(|(_, lease)| lease)
    }

    /// Grants a lease for the first admissible candidate, in preference
    /// order, and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Conflict`] with the reason the last candidate
    /// was refused when none is admissible, or [`VoiceError::Configuration`]
    /// when `candidates` is empty.
    pub fn acquire_any(
        self: &Arc<Self>,
        kind: SessionKind,
        candidates: &[EngineProfile],
    ) -> Result<(usize, EngineLease), VoiceError> {
        let mut state = self.lock();
        let mut refusal = None;

        for (index, profile) in candidates.iter().enumerate() {
            match check_against(&state.leases, kind, profile) {
                Ok(()) => {
                    state.next_id += 1;
                    let id = state.next_id;
                    let eviction = CancellationToken::new();
                    state.leases.push(LeaseRecord {
                        id,
                        kind,
                        profile: profile.clone(),
                        eviction: eviction.clone(),
                    });
                    info!(lease = id, %kind, family = %profile.family, "engine lease granted");
                    return Ok((
                        index,
                        EngineLease {
                            id,
                            kind,
                            profile: profile.clone(),
                            eviction,
                            arbiter: Arc::clone(self),
                        },
                    ));
                }
                Err(e) => refusal = Some(e),
            }
        }

        let err = refusal.unwrap_or_else(|| {
            VoiceError::Configuration("no transport configured for voice session".to_string())
        });
        warn!(%kind, error = %err, "engine lease refused");
        Err(err)
    }

    /// Handles a runtime duplicate-engine signal from either engine.
    ///
    /// The most recently acquired lease is evicted and its session kind
    /// returned. Returns `None` when no lease is held.
    pub fn report_duplicate_engine(&self, reporter: SessionKind) -> Option<SessionKind> {
        let state = self.lock();
        let newest = state
            .leases
            .iter()
            .filter(|lease| !lease.eviction.is_cancelled())
            .max_by_key(|lease| lease.id)?;
        warn!(
            %reporter,
            evicted = %newest.kind,
            lease = newest.id,
            "duplicate call engine reported; evicting later-activated session"
        );
        newest.eviction.cancel();
        Some(newest.kind)
    }

    /// Number of held leases.
    pub fn active_leases(&self) -> usize {
        self.lock().leases.len()
    }

    /// Whether a lease for `kind` is held.
    pub fn holds(&self, kind: SessionKind) -> bool {
        self.lock().leases.iter().any(|lease| lease.kind == kind)
    }

    fn release(&self, id: u64) {
        let mut state = self.lock();
        let before = state.leases.len();
        state.leases.retain(|lease| lease.id != id);
        if state.leases.len() != before {
            info!(lease = id, "engine lease released");
        }
    }
}

fn check_against(
    leases: &[LeaseRecord],
    kind: SessionKind,
    profile: &EngineProfile,
) -> Result<(), VoiceError> {
    for held in leases {
        if held.profile.family == profile.family {
            return Err(VoiceError::Conflict(format!(
                "{kind} session requires the {} engine already held by the {} session",
                profile.family, held.kind
            )));
        }
        if !held.profile.allow_multiple_instances {
            return Err(VoiceError::Conflict(format!(
                "{} session holds an exclusive {} engine",
                held.kind, held.profile.family
            )));
        }
        if !profile.allow_multiple_instances {
            return Err(VoiceError::Conflict(format!(
                "{kind} session requires an exclusive {} engine while the {} session is live",
                profile.family, held.kind
            )));
        }
    }
    Ok(())
}

/// A held call engine. Dropping the lease releases it.
#[derive(Debug)]
pub struct EngineLease {
    id: u64,
    kind: SessionKind,
    profile: EngineProfile,
    eviction: CancellationToken,
    arbiter: Arc<ConflictArbiter>,
}

impl EngineLease {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    /// Cancelled when the arbiter evicts this lease.
    pub fn eviction_token(&self) -> CancellationToken {
        self.eviction.clone()
    }

    pub fn is_evicted(&self) -> bool {
        self.eviction.is_cancelled()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.arbiter.release(self.id);
    }
}
