use axum::{
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use crate::paxos::VerificationStatus;
use crate::state::AppState;
use crate::store::{OnboardingStatus, User, UserPatch};

pub mod draft;
pub mod dto;
pub mod handlers;
pub mod machine;
pub mod poller;

use machine::Step;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/onboarding/draft", get(handlers::get_draft))
        .route("/onboarding/step/:step", put(handlers::put_step))
        .route("/onboarding/back", post(handlers::go_back))
        .route("/onboarding/submit", post(handlers::submit))
        .route("/onboarding/status", get(handlers::check_status))
        .route("/onboarding/sandbox-approve", post(handlers::sandbox_approve))
}

/// Terminal transition on approval: advance the stored status, clear the
/// draft, stop the poller. The caller reissues the session cookie when it
/// has a response to attach it to.
pub(crate) async fn complete_approved(state: &AppState, user_id: Uuid) -> anyhow::Result<User> {
    let user = state
        .store
        .apply(user_id, UserPatch::status(OnboardingStatus::Approved))
        .await?;
    state.store.clear_draft(user_id).await?;
    // Last: when called from the poll task this aborts that task.
    state.pollers.stop(user_id);
    Ok(user)
}

/// Terminal transition on denial: the draft is retained so the user can
/// correct and resubmit from the review step; only the cursor and the
/// denial reason change.
pub(crate) async fn complete_denied(
    state: &AppState,
    user_id: Uuid,
    reason: Option<String>,
) -> anyhow::Result<()> {
    let mut draft = state.store.load_draft(user_id).await?.unwrap_or_default();
    draft.step = Step::Denied;
    draft.verification = VerificationStatus::Denied;
    draft.denial_reason = reason;
    state.store.save_draft(user_id, &draft).await?;
    state.pollers.stop(user_id);
    Ok(())
}
