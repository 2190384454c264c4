use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::state::AppState;
use crate::store::{OnboardingStatus, User};

pub const SESSION_COOKIE_NAME: &str = "vaultbank_session";

/// Session payload: identity plus the onboarding state the gate decides on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub onboarding_status: OnboardingStatus,
    pub identity_id: Option<String>,
    pub account_id: Option<String>,
    pub profile_id: Option<String>,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl SessionKeys {
    /// Mint a token from the stored record. Also the resync path: any flow
    /// that advances onboarding status signs a fresh token from the updated
    /// record so the gate sees the change on the very next request.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            onboarding_status: user.onboarding_status,
            identity_id: user.identity_id.clone(),
            account_id: user.account_id.clone(),
            profile_id: user.profile_id.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, status = user.onboarding_status.as_str(), "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Build the session cookie. Re-issuing after a status change overwrites the
/// cookie under the same name with the same attributes.
pub fn session_cookie(
    token: &str,
    ttl: Duration,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let max_age = ttl.as_secs();
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Sign a fresh token for `user` and wrap it as a Set-Cookie value.
pub fn reissue(state: &AppState, user: &User) -> anyhow::Result<HeaderValue> {
    let keys = SessionKeys::from_ref(state);
    let token = keys.sign(user)?;
    session_cookie(&token, keys.ttl, state.config.cookie_secure)
        .map_err(|e| anyhow::anyhow!("invalid cookie value: {e}"))
}

/// Apply updates to the stored record and immediately re-issue the session
/// cookie, so the gate sees the new status on the very next request instead
/// of at the next sign-in. The gate only ever inspects the token, not the
/// store; skipping this after a status change leaves the session stale.
pub async fn resync(
    state: &AppState,
    user_id: Uuid,
    patch: crate::store::UserPatch,
) -> anyhow::Result<(User, HeaderValue)> {
    let user = state.store.apply(user_id, patch).await?;
    let cookie = reissue(state, &user)?;
    Ok((user, cookie))
}

/// Pull the session token out of the cookie, falling back to a bearer header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(header) = headers.get(COOKIE) {
        if let Ok(value) = header.to_str() {
            for pair in value.split(';') {
                let mut parts = pair.trim().splitn(2, '=');
                let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                    continue;
                };
                if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                    return Some(val.trim().to_string());
                }
            }
        }
    }
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .or_else(|| value.trim().strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Claims placed in request extensions by the gate middleware.
pub struct CurrentUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing session".to_string()))
    }
}
