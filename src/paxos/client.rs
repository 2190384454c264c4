use axum::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{IdentityStatus, VerificationApi};
use crate::config::PaxosConfig;
use crate::onboarding::draft::{Draft, IdentityType};

/// Bearer-authenticated client for the upstream financial API.
#[derive(Clone)]
pub struct PaxosClient {
    http: Client,
    base_url: String,
    api_token: String,
}

impl PaxosClient {
    pub fn new(http: Client, config: &PaxosConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    async fn post_json(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("POST {url} failed: {status} {body}");
        }
        Ok(response.json().await?)
    }

    fn extract_id(value: &Value) -> anyhow::Result<String> {
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("upstream response missing id"))
    }
}

fn identity_payload(draft: &Draft) -> Value {
    match draft.identity_type {
        Some(IdentityType::Institution) => json!({
            "identity_type": "INSTITUTION",
            "institution_details": draft.institution,
            "address": draft.address,
            "tax_details": draft.tax,
        }),
        _ => json!({
            "identity_type": "PERSON",
            "person_details": draft.person,
            "address": draft.address,
            "tax_details": draft.tax,
        }),
    }
}

#[async_trait]
impl VerificationApi for PaxosClient {
    #[instrument(skip(self, draft))]
    async fn create_identity(&self, draft: &Draft) -> anyhow::Result<String> {
        let value = self.post_json("identity", identity_payload(draft)).await?;
        let id = Self::extract_id(&value)?;
        debug!(identity_id = %id, "identity created");
        Ok(id)
    }

    #[instrument(skip(self, draft))]
    async fn update_identity(&self, identity_id: &str, draft: &Draft) -> anyhow::Result<()> {
        let url = format!("{}/identity/{identity_id}", self.base_url);
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&identity_payload(draft))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("PUT {url} failed: {status} {body}");
        }
        debug!(%identity_id, "identity updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_account(&self, identity_id: &str) -> anyhow::Result<String> {
        let value = self
            .post_json("accounts", json!({ "identity_id": identity_id }))
            .await?;
        Self::extract_id(&value)
    }

    #[instrument(skip(self))]
    async fn create_profile(&self, account_id: &str) -> anyhow::Result<String> {
        let value = self
            .post_json("profiles", json!({ "account_id": account_id }))
            .await?;
        Self::extract_id(&value)
    }

    #[instrument(skip(self))]
    async fn identity_status(&self, identity_id: &str) -> anyhow::Result<IdentityStatus> {
        let url = format!("{}/identity/{identity_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} failed: {status}");
        }
        let value: Value = response.json().await?;
        let parsed: IdentityStatus = serde_json::from_value(
            value
                .get("summary")
                .cloned()
                .unwrap_or(value),
        )?;
        Ok(parsed)
    }
}
