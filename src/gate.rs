//! Route authorization: one decision function consulted for every request,
//! so onboarding-status semantics live in a single place.

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::session::{extract_session_token, Claims, SessionKeys};
use crate::state::AppState;
use crate::store::OnboardingStatus;

pub const SIGN_IN_PATH: &str = "/auth/sign-in";
pub const ONBOARDING_WELCOME_PATH: &str = "/onboarding/welcome";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    ToSignIn,
    ToOnboarding,
    ToDashboard,
}

fn is_public_path(path: &str) -> bool {
    path == "/health" || path.starts_with("/auth/") || path.starts_with("/api/paxos/")
}

fn is_onboarding_path(path: &str) -> bool {
    path == "/onboarding" || path.starts_with("/onboarding/")
}

/// Pure function of (path, session): the only side effect anywhere is the
/// redirect the caller issues.
pub fn decide(path: &str, claims: Option<&Claims>) -> Decision {
    if is_public_path(path) {
        return Decision::Allow;
    }
    let Some(claims) = claims else {
        return Decision::ToSignIn;
    };
    if is_onboarding_path(path) {
        // Onboarding is complete; no re-entry.
        if claims.onboarding_status == OnboardingStatus::Approved {
            return Decision::ToDashboard;
        }
        return Decision::Allow;
    }
    match claims.onboarding_status {
        OnboardingStatus::ProfileCreated | OnboardingStatus::Approved => Decision::Allow,
        _ => Decision::ToOnboarding,
    }
}

pub async fn gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let keys = SessionKeys::from_ref(&state);
    let claims = extract_session_token(request.headers())
        .and_then(|token| keys.verify(&token).ok());

    match decide(&path, claims.as_ref()) {
        Decision::Allow => {
            if let Some(claims) = claims {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        Decision::ToSignIn => {
            debug!(%path, "no session; redirecting to sign-in");
            Redirect::temporary(SIGN_IN_PATH).into_response()
        }
        Decision::ToOnboarding => {
            debug!(%path, "onboarding incomplete; redirecting to welcome");
            Redirect::temporary(ONBOARDING_WELCOME_PATH).into_response()
        }
        Decision::ToDashboard => {
            debug!(%path, "onboarding already approved; redirecting to dashboard");
            Redirect::temporary(DASHBOARD_PATH).into_response()
        }
    }
}
