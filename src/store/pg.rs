use axum::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{OnboardingStatus, User, UserPatch, UserStore};
use crate::onboarding::draft::Draft;

/// Postgres-backed credential and draft store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Status is stored as TEXT; map it by hand instead of leaning on a DB enum.
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    password_hash: String,
    identity_id: Option<String>,
    account_id: Option<String>,
    profile_id: Option<String>,
    onboarding_status: String,
    created_at: OffsetDateTime,
}

impl FromRow<'_, PgRow> for UserRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            password_hash: row.try_get("password_hash")?,
            identity_id: row.try_get("identity_id")?,
            account_id: row.try_get("account_id")?,
            profile_id: row.try_get("profile_id")?,
            onboarding_status: row.try_get("onboarding_status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl UserRow {
    fn into_user(self) -> anyhow::Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            identity_id: self.identity_id,
            account_id: self.account_id,
            profile_id: self.profile_id,
            onboarding_status: OnboardingStatus::parse(&self.onboarding_status)?,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, display_name, password_hash, identity_id, \
     account_id, profile_id, onboarding_status, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, display_name, password_hash, onboarding_status)
            VALUES ($1, $2, $3, 'NOT_STARTED')
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        row.into_user()
    }

    async fn apply(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<User> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        let status = match patch.onboarding_status {
            Some(next) => current.onboarding_status.advanced(next),
            None => current.onboarding_status,
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET onboarding_status = $2,
                identity_id = COALESCE($3, identity_id),
                account_id = COALESCE($4, account_id),
                profile_id = COALESCE($5, profile_id)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(patch.identity_id)
        .bind(patch.account_id)
        .bind(patch.profile_id)
        .fetch_one(&self.pool)
        .await?;
        row.into_user()
    }

    async fn load_draft(&self, user_id: Uuid) -> anyhow::Result<Option<Draft>> {
        let row = sqlx::query("SELECT data FROM onboarding_drafts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data")?;
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    async fn save_draft(&self, user_id: Uuid, draft: &Draft) -> anyhow::Result<()> {
        let data = serde_json::to_value(draft)?;
        sqlx::query(
            r#"
            INSERT INTO onboarding_drafts (user_id, data, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id) DO UPDATE SET data = $2, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_draft(&self, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM onboarding_drafts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
