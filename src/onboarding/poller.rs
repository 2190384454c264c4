use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TransientPollError;
use crate::paxos::VerificationStatus;
use crate::state::AppState;

/// Owns one background poll task. Dropping the handle aborts the task, so a
/// poller can never outlive the context that started it.
pub struct PollerHandle {
    abort: AbortHandle,
}

impl PollerHandle {
    pub fn stop(self) {
        // Drop does the abort.
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Registry of active pollers, at most one per user. Registering a new
/// poller for a user replaces (and stops) the old one.
#[derive(Clone, Default)]
pub struct Pollers {
    inner: Arc<Mutex<HashMap<Uuid, PollerHandle>>>,
}

impl Pollers {
    pub fn register(&self, user_id: Uuid, handle: PollerHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.insert(user_id, handle);
    }

    pub fn stop(&self, user_id: Uuid) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.remove(&user_id);
    }

    pub fn is_active(&self, user_id: Uuid) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.get(&user_id).is_some_and(|h| !h.is_finished())
    }
}

/// Poll the external verification status at a fixed interval until a
/// terminal result. Each tick is an idempotent read; failures are swallowed
/// and retried so a transient outage never interrupts the wait.
pub fn spawn_status_poller(state: AppState, user_id: Uuid, identity_id: String) -> PollerHandle {
    let period = Duration::from_secs(state.config.poll_interval_secs);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; consume it so the
        // first real poll happens one full period after submission.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let status = match state.verification.identity_status(&identity_id).await {
                Ok(status) => status,
                Err(e) => {
                    let err = TransientPollError::from(e);
                    debug!(%user_id, error = %err, "status poll failed; will retry");
                    continue;
                }
            };
            match status.status {
                VerificationStatus::Approved => {
                    info!(%user_id, "verification approved");
                    if let Err(e) = super::complete_approved(&state, user_id).await {
                        warn!(%user_id, error = %e, "failed to record approval");
                    }
                    break;
                }
                VerificationStatus::Denied => {
                    info!(%user_id, reason = ?status.denial_reason, "verification denied");
                    if let Err(e) =
                        super::complete_denied(&state, user_id, status.denial_reason).await
                    {
                        warn!(%user_id, error = %e, "failed to record denial");
                    }
                    break;
                }
                VerificationStatus::Pending | VerificationStatus::Disabled => {
                    debug!(%user_id, status = ?status.status, "still waiting");
                }
            }
        }
    });
    PollerHandle {
        abort: task.abort_handle(),
    }
}
