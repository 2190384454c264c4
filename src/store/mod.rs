use axum::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::onboarding::draft::Draft;

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Server-held progress through identity verification and provisioning.
///
/// Only ever advanced; denial is surfaced through the external verification
/// result and never stored here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    NotStarted,
    IdentityCreated,
    AccountCreated,
    ProfileCreated,
    Approved,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::IdentityCreated => "IDENTITY_CREATED",
            Self::AccountCreated => "ACCOUNT_CREATED",
            Self::ProfileCreated => "PROFILE_CREATED",
            Self::Approved => "APPROVED",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IDENTITY_CREATED" => Ok(Self::IdentityCreated),
            "ACCOUNT_CREATED" => Ok(Self::AccountCreated),
            "PROFILE_CREATED" => Ok(Self::ProfileCreated),
            "APPROVED" => Ok(Self::Approved),
            other => anyhow::bail!("unknown onboarding status: {other}"),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::IdentityCreated => 1,
            Self::AccountCreated => 2,
            Self::ProfileCreated => 3,
            Self::Approved => 4,
        }
    }

    /// Monotonic advance: a patch can never move the status backwards.
    pub fn advanced(self, candidate: Self) -> Self {
        if candidate.rank() > self.rank() {
            candidate
        } else {
            self
        }
    }
}

/// User record held by the credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub identity_id: Option<String>,
    pub account_id: Option<String>,
    pub profile_id: Option<String>,
    pub onboarding_status: OnboardingStatus,
    pub created_at: OffsetDateTime,
}

/// Partial update applied by the session issuer and the submission flow.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub onboarding_status: Option<OnboardingStatus>,
    pub identity_id: Option<String>,
    pub account_id: Option<String>,
    pub profile_id: Option<String>,
}

impl UserPatch {
    pub fn status(status: OnboardingStatus) -> Self {
        Self {
            onboarding_status: Some(status),
            ..Default::default()
        }
    }
}

/// Injected credential + draft store so callers never touch the backing
/// storage directly.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User>;
    /// Apply a partial update and return the stored record. The onboarding
    /// status only ever advances.
    async fn apply(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<User>;

    async fn load_draft(&self, user_id: Uuid) -> anyhow::Result<Option<Draft>>;
    async fn save_draft(&self, user_id: Uuid, draft: &Draft) -> anyhow::Result<()>;
    async fn clear_draft(&self, user_id: Uuid) -> anyhow::Result<()>;
}
