use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap},
    Json,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::session::{self, CurrentUser},
    error::{ApiError, FieldError},
    onboarding::{
        draft::Draft,
        dto::{guidance_for, StatusResponse, SubmitResponse},
        machine::{self, Step, StepUpdate},
        poller,
    },
    paxos::VerificationStatus,
    state::AppState,
    store::{OnboardingStatus, UserPatch},
};

/// Load the persisted draft, creating the initial one on first visit.
#[instrument(skip(state))]
pub async fn get_draft(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<Draft>, ApiError> {
    match state.store.load_draft(claims.sub).await? {
        Some(draft) => Ok(Json(draft)),
        None => {
            let draft = Draft::default();
            state.store.save_draft(claims.sub, &draft).await?;
            Ok(Json(draft))
        }
    }
}

#[instrument(skip(state, update))]
pub async fn put_step(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(step): Path<String>,
    Json(update): Json<StepUpdate>,
) -> Result<Json<Draft>, ApiError> {
    let step = Step::from_slug(&step).ok_or(ApiError::NotFound)?;

    let mut draft = state.store.load_draft(claims.sub).await?.unwrap_or_default();
    if draft.step == Step::Pending {
        return Err(ApiError::Validation(vec![FieldError::new(
            "step",
            "Your submission is being reviewed and cannot be edited",
        )]));
    }
    // Corrections after a denial re-enter the machine at review.
    if draft.step == Step::Denied {
        draft.step = Step::Review;
    }

    machine::apply_step(&mut draft, step, update).map_err(ApiError::Validation)?;
    state.store.save_draft(claims.sub, &draft).await?;
    Ok(Json(draft))
}

#[instrument(skip(state))]
pub async fn go_back(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<Draft>, ApiError> {
    let mut draft = state.store.load_draft(claims.sub).await?.unwrap_or_default();
    machine::go_back(&mut draft);
    state.store.save_draft(claims.sub, &draft).await?;
    Ok(Json(draft))
}

/// Submit the completed draft: provision identity, account and profile with
/// the upstream API, advance the stored status after each stage, reissue the
/// session, and start the status poller. A stage that already ran (its id is
/// on the record) is skipped, so a mid-chain failure picks up where it left
/// off; a resubmission after denial updates the existing identity with the
/// corrected draft instead.
#[instrument(skip(state))]
pub async fn submit(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<(HeaderMap, Json<SubmitResponse>), ApiError> {
    let draft = state
        .store
        .load_draft(claims.sub)
        .await?
        .ok_or(ApiError::NotFound)?;
    if draft.step != Step::Review && draft.step != Step::Denied {
        return Err(ApiError::Validation(vec![FieldError::new(
            "step",
            "Complete the review step before submitting",
        )]));
    }
    let errors = machine::validate_for_submit(&draft);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let mut user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or(ApiError::NotFound)?;

    let external = |e: anyhow::Error| ApiError::ExternalService {
        status: 502,
        details: e.to_string(),
    };

    // The draft keeps the denied verification result until this submission
    // replaces it, so this flags a resubmission even after corrections moved
    // the cursor back to review.
    let resubmission = draft.verification == VerificationStatus::Denied;

    if user.identity_id.is_none() {
        let identity_id = state
            .verification
            .create_identity(&draft)
            .await
            .map_err(external)?;
        user = state
            .store
            .apply(
                user.id,
                UserPatch {
                    onboarding_status: Some(OnboardingStatus::IdentityCreated),
                    identity_id: Some(identity_id),
                    ..Default::default()
                },
            )
            .await?;
    } else if resubmission {
        // Without this the identity would be re-verified against the
        // originally denied data and the user could never exit denial.
        let identity_id = user.identity_id.clone().expect("set above");
        state
            .verification
            .update_identity(&identity_id, &draft)
            .await
            .map_err(external)?;
    }
    if user.account_id.is_none() {
        let identity_id = user.identity_id.clone().expect("set above");
        let account_id = state
            .verification
            .create_account(&identity_id)
            .await
            .map_err(external)?;
        user = state
            .store
            .apply(
                user.id,
                UserPatch {
                    onboarding_status: Some(OnboardingStatus::AccountCreated),
                    account_id: Some(account_id),
                    ..Default::default()
                },
            )
            .await?;
    }
    // Final stage goes through resync so the gate sees PROFILE_CREATED on
    // the very next request.
    let profile_patch = if user.profile_id.is_none() {
        let account_id = user.account_id.clone().expect("set above");
        let profile_id = state
            .verification
            .create_profile(&account_id)
            .await
            .map_err(external)?;
        UserPatch {
            onboarding_status: Some(OnboardingStatus::ProfileCreated),
            profile_id: Some(profile_id),
            ..Default::default()
        }
    } else {
        UserPatch::default()
    };
    let (user, cookie) = session::resync(&state, user.id, profile_patch).await?;

    let mut draft = draft;
    draft.step = Step::Pending;
    draft.verification = VerificationStatus::Pending;
    draft.denial_reason = None;
    state.store.save_draft(user.id, &draft).await?;

    let identity_id = user.identity_id.clone().expect("set above");
    let handle = poller::spawn_status_poller(state.clone(), user.id, identity_id);
    state.pollers.register(user.id, handle);

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, "onboarding submitted");
    Ok((
        headers,
        Json(SubmitResponse {
            onboarding_status: user.onboarding_status,
            verification: VerificationStatus::Pending,
        }),
    ))
}

/// Manual "check now": one out-of-band poll, identical in effect to a
/// scheduled tick. Failures degrade to PENDING rather than surfacing.
#[instrument(skip(state))]
pub async fn check_status(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<(HeaderMap, Json<StatusResponse>), ApiError> {
    let mut headers = HeaderMap::new();

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or(ApiError::NotFound)?;
    let Some(identity_id) = user.identity_id.clone() else {
        return Ok((headers, Json(StatusResponse::pending())));
    };

    let status = match state.verification.identity_status(&identity_id).await {
        Ok(status) => status,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "status check failed; reporting pending");
            return Ok((headers, Json(StatusResponse::pending())));
        }
    };

    match status.status {
        VerificationStatus::Approved => {
            let user = super::complete_approved(&state, user.id).await?;
            headers.insert(SET_COOKIE, session::reissue(&state, &user)?);
            Ok((
                headers,
                Json(StatusResponse {
                    verification: VerificationStatus::Approved,
                    denial_reason: None,
                    guidance: None,
                }),
            ))
        }
        VerificationStatus::Denied => {
            super::complete_denied(&state, user.id, status.denial_reason.clone()).await?;
            Ok((
                headers,
                Json(StatusResponse {
                    verification: VerificationStatus::Denied,
                    guidance: Some(guidance_for(status.denial_reason.as_deref())),
                    denial_reason: status.denial_reason,
                }),
            ))
        }
        other => Ok((
            headers,
            Json(StatusResponse {
                verification: other,
                denial_reason: None,
                guidance: None,
            }),
        )),
    }
}

/// Operator escape hatch: instant `pending → approved` without waiting for
/// the external process. Hidden unless the sandbox flag is set.
#[instrument(skip(state))]
pub async fn sandbox_approve(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<(HeaderMap, Json<StatusResponse>), ApiError> {
    if !state.config.sandbox_mode {
        return Err(ApiError::NotFound);
    }
    let draft = state
        .store
        .load_draft(claims.sub)
        .await?
        .ok_or(ApiError::NotFound)?;
    if draft.step != Step::Pending {
        return Err(ApiError::Validation(vec![FieldError::new(
            "step",
            "Only a pending submission can be approved",
        )]));
    }

    let user = super::complete_approved(&state, claims.sub).await?;
    info!(user_id = %user.id, "sandbox approval applied");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session::reissue(&state, &user)?);
    Ok((
        headers,
        Json(StatusResponse {
            verification: VerificationStatus::Approved,
            denial_reason: None,
            guidance: None,
        }),
    ))
}
