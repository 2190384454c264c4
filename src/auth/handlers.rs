use axum::{
    extract::{FromRef, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, SignInRequest, SignUpRequest},
        password::{hash_password, verify_password},
        session::{self, SessionKeys},
    },
    error::{ApiError, FieldError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_sign_up(payload: &SignUpRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    if payload.display_name.trim().is_empty() {
        errors.push(FieldError::new("display_name", "Display name is required"));
    }
    if payload.password.len() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if payload.password != payload.confirm_password {
        errors.push(FieldError::new(
            "confirm_password",
            "Passwords do not match",
        ));
    }
    errors
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(mut payload): Json<SignUpRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate_sign_up(&payload);
    if !errors.is_empty() {
        warn!(email = %payload.email, "sign-up validation failed");
        return Err(ApiError::Validation(errors));
    }

    // Duplicate sign-up must not touch the existing record.
    if state.store.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::DuplicateAccount);
    }

    let hash = hash_password(&payload.password)?;
    let user = state
        .store
        .create(&payload.email, payload.display_name.trim(), &hash)
        .await?;

    let cookie = session::reissue(&state, &user)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        headers,
        Json(AuthResponse {
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(mut payload): Json<SignInRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "email",
            "Invalid email",
        )]));
    }

    let user = state
        .store
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "sign-in unknown email");
            ApiError::NoSuchAccount
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "sign-in invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    // Claims reflect the stored status and identifiers at sign-in time.
    let cookie = session::reissue(&state, &user)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok((
        headers,
        Json(AuthResponse {
            user: PublicUser::from(&user),
        }),
    ))
}

/// Clears the cookie and stops any poller the session still owns.
#[instrument(skip(state, headers))]
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let keys = SessionKeys::from_ref(&state);
    if let Some(claims) = session::extract_session_token(&headers)
        .and_then(|token| keys.verify(&token).ok())
    {
        state.pollers.stop(claims.sub);
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = session::clear_session_cookie(state.config.cookie_secure) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Session introspection: 204 when absent or invalid, never an error.
#[instrument(skip(state, headers))]
pub async fn current_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let Some(claims) = session::extract_session_token(&headers)
        .and_then(|token| keys.verify(&token).ok())
    else {
        return StatusCode::NO_CONTENT.into_response();
    };
    (StatusCode::OK, Json(claims)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{OnboardingStatus, UserStore};

    fn sign_up_payload(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            display_name: "Alice".into(),
            password: password.into(),
            confirm_password: password.into(),
        }
    }

    #[tokio::test]
    async fn sign_up_creates_not_started_user_and_sets_cookie() {
        let state = AppState::fake();
        let (headers, Json(body)) = sign_up(
            State(state.clone()),
            Json(sign_up_payload("Alice@Test.com", "Passw0rd!")),
        )
        .await
        .expect("sign up");

        assert_eq!(body.user.email, "alice@test.com");
        assert_eq!(body.user.onboarding_status, OnboardingStatus::NotStarted);
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("vaultbank_session="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn sign_up_rejects_short_password_with_exact_message() {
        let state = AppState::fake();
        let err = sign_up(
            State(state),
            Json(sign_up_payload("alice@test.com", "short")),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                assert!(fields.iter().any(|f| f.field == "password"
                    && f.message == "Password must be at least 8 characters"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_up_rejects_mismatched_confirmation() {
        let state = AppState::fake();
        let mut payload = sign_up_payload("alice@test.com", "Passw0rd!");
        payload.confirm_password = "Different1!".into();
        let err = sign_up(State(state), Json(payload)).await.unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                assert!(fields.iter().any(|f| f.field == "confirm_password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_sign_up_fails_and_leaves_record_alone() {
        let state = AppState::fake();
        sign_up(
            State(state.clone()),
            Json(sign_up_payload("alice@test.com", "Passw0rd!")),
        )
        .await
        .expect("first sign up");
        let original = state
            .store
            .find_by_email("alice@test.com")
            .await
            .unwrap()
            .unwrap();

        let mut second = sign_up_payload("alice@test.com", "An0therPw!");
        second.display_name = "Impostor".into();
        let err = sign_up(State(state.clone()), Json(second)).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAccount));

        let after = state
            .store
            .find_by_email("alice@test.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.display_name, original.display_name);
        assert_eq!(after.password_hash, original.password_hash);
    }

    #[tokio::test]
    async fn sign_in_distinguishes_unknown_email_from_bad_password() {
        let state = AppState::fake();
        sign_up(
            State(state.clone()),
            Json(sign_up_payload("alice@test.com", "Passw0rd!")),
        )
        .await
        .expect("sign up");

        let err = sign_in(
            State(state.clone()),
            Json(SignInRequest {
                email: "nobody@test.com".into(),
                password: "Passw0rd!".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NoSuchAccount));

        let err = sign_in(
            State(state.clone()),
            Json(SignInRequest {
                email: "alice@test.com".into(),
                password: "WrongPass1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));

        let (_, Json(body)) = sign_in(
            State(state),
            Json(SignInRequest {
                email: "alice@test.com".into(),
                password: "Passw0rd!".into(),
            }),
        )
        .await
        .expect("sign in");
        assert_eq!(body.user.email, "alice@test.com");
    }
}
