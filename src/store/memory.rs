use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{OnboardingStatus, User, UserPatch, UserStore};
use crate::onboarding::draft::Draft;

/// In-memory store backing tests and `AppState::fake()`.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    drafts: Mutex<HashMap<Uuid, Draft>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(&id).cloned())
    }

    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if users.values().any(|u| u.email == email) {
            anyhow::bail!("email already registered: {email}");
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            password_hash: password_hash.to_string(),
            identity_id: None,
            account_id: None,
            profile_id: None,
            onboarding_status: OnboardingStatus::NotStarted,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn apply(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        if let Some(status) = patch.onboarding_status {
            user.onboarding_status = user.onboarding_status.advanced(status);
        }
        if patch.identity_id.is_some() {
            user.identity_id = patch.identity_id;
        }
        if patch.account_id.is_some() {
            user.account_id = patch.account_id;
        }
        if patch.profile_id.is_some() {
            user.profile_id = patch.profile_id;
        }
        Ok(user.clone())
    }

    async fn load_draft(&self, user_id: Uuid) -> anyhow::Result<Option<Draft>> {
        let drafts = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(drafts.get(&user_id).cloned())
    }

    async fn save_draft(&self, user_id: Uuid, draft: &Draft) -> anyhow::Result<()> {
        let mut drafts = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        drafts.insert(user_id, draft.clone());
        Ok(())
    }

    async fn clear_draft(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut drafts = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        drafts.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_find_by_email() {
        let store = MemoryStore::new();
        let user = store.create("alice@test.com", "Alice", "hash").await.unwrap();
        assert_eq!(user.onboarding_status, OnboardingStatus::NotStarted);

        let found = store.find_by_email("alice@test.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.find_by_email("bob@test.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.create("alice@test.com", "Alice", "hash").await.unwrap();
        assert!(store.create("alice@test.com", "Alice2", "hash2").await.is_err());
    }

    #[tokio::test]
    async fn apply_advances_status_and_links_ids() {
        let store = MemoryStore::new();
        let user = store.create("alice@test.com", "Alice", "hash").await.unwrap();

        let patch = UserPatch {
            onboarding_status: Some(OnboardingStatus::IdentityCreated),
            identity_id: Some("id-123".into()),
            ..Default::default()
        };
        let user = store.apply(user.id, patch).await.unwrap();
        assert_eq!(user.onboarding_status, OnboardingStatus::IdentityCreated);
        assert_eq!(user.identity_id.as_deref(), Some("id-123"));

        // A regressing patch leaves the status in place.
        let user = store
            .apply(user.id, UserPatch::status(OnboardingStatus::NotStarted))
            .await
            .unwrap();
        assert_eq!(user.onboarding_status, OnboardingStatus::IdentityCreated);
    }

    #[tokio::test]
    async fn draft_save_load_clear() {
        let store = MemoryStore::new();
        let user = store.create("alice@test.com", "Alice", "hash").await.unwrap();

        assert!(store.load_draft(user.id).await.unwrap().is_none());
        let draft = Draft::default();
        store.save_draft(user.id, &draft).await.unwrap();
        assert!(store.load_draft(user.id).await.unwrap().is_some());
        store.clear_draft(user.id).await.unwrap();
        assert!(store.load_draft(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_recovers_from_a_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.users.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
        store.create("alice@test.com", "Alice", "hash").await.unwrap();
    }
}
