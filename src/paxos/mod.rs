use axum::{routing::any, Router};
use axum::async_trait;
use serde::{Deserialize, Serialize};

use crate::onboarding::draft::Draft;
use crate::state::AppState;

mod client;
pub mod proxy;

pub use client::PaxosClient;

/// Outcome of the external KYC process for one identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Denied,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityStatus {
    pub status: VerificationStatus,
    /// Opaque upstream reason code, only present on denial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
}

impl IdentityStatus {
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Pending,
            denial_reason: None,
        }
    }
}

/// The slice of the upstream financial API the onboarding flow depends on.
/// Production uses [`PaxosClient`]; tests inject their own implementation.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// Register the identity described by the draft; returns the identity id.
    async fn create_identity(&self, draft: &Draft) -> anyhow::Result<String>;
    /// Replace the identity's registered data with the corrected draft, so a
    /// resubmission is re-verified against what the user actually fixed.
    async fn update_identity(&self, identity_id: &str, draft: &Draft) -> anyhow::Result<()>;
    async fn create_account(&self, identity_id: &str) -> anyhow::Result<String>;
    async fn create_profile(&self, account_id: &str) -> anyhow::Result<String>;
    async fn identity_status(&self, identity_id: &str) -> anyhow::Result<IdentityStatus>;
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/paxos/*path", any(proxy::forward))
}

#[cfg(test)]
pub mod stub {
    use std::sync::Mutex;

    use super::*;

    /// Scripted verification API for tests: hands out fixed ids and plays
    /// back a queue of status results, repeating the last one.
    pub struct StubApi {
        statuses: Mutex<Vec<IdentityStatus>>,
        pub fail_status_calls: bool,
        /// Drafts received by create/update, in call order.
        pub identity_payloads: Mutex<Vec<Draft>>,
    }

    impl StubApi {
        pub fn with_statuses(statuses: Vec<IdentityStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses),
                fail_status_calls: false,
                identity_payloads: Mutex::new(Vec::new()),
            }
        }

        pub fn always(status: VerificationStatus) -> Self {
            Self::with_statuses(vec![IdentityStatus {
                status,
                denial_reason: None,
            }])
        }

        pub fn denied(reason: &str) -> Self {
            Self::with_statuses(vec![IdentityStatus {
                status: VerificationStatus::Denied,
                denial_reason: Some(reason.to_string()),
            }])
        }
    }

    #[async_trait]
    impl VerificationApi for StubApi {
        async fn create_identity(&self, draft: &Draft) -> anyhow::Result<String> {
            self.identity_payloads
                .lock()
                .expect("stub lock")
                .push(draft.clone());
            Ok("identity-stub".into())
        }

        async fn update_identity(&self, _identity_id: &str, draft: &Draft) -> anyhow::Result<()> {
            self.identity_payloads
                .lock()
                .expect("stub lock")
                .push(draft.clone());
            Ok(())
        }

        async fn create_account(&self, identity_id: &str) -> anyhow::Result<String> {
            Ok(format!("account-for-{identity_id}"))
        }

        async fn create_profile(&self, account_id: &str) -> anyhow::Result<String> {
            Ok(format!("profile-for-{account_id}"))
        }

        async fn identity_status(&self, _identity_id: &str) -> anyhow::Result<IdentityStatus> {
            if self.fail_status_calls {
                anyhow::bail!("connection reset by peer");
            }
            let mut statuses = self.statuses.lock().expect("stub lock");
            if statuses.len() > 1 {
                Ok(statuses.remove(0))
            } else {
                statuses
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("stub exhausted"))
            }
        }
    }
}
