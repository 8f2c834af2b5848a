//! Webflow CMS user sync via Supabase Edge Functions.
//!
//! TRADE-OFFS
//! ==========
//! CMS records are a downstream mirror of the auth user. Sync runs on a
//! detached task after the auth outcome is decided; failures are logged and
//! dropped. Nothing here can fail a login, registration or onboarding step.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::identity::{Principal, Role};

const CREATE_USER_PATH: &str = "/functions/v1/create-webflow-user";
const UPDATE_ONBOARDING_PATH: &str = "/functions/v1/update-webflow-user-onboarding";
const SYNC_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum CmsSyncError {
    #[error("cms sync request failed: {0}")]
    Request(String),
    #[error("cms sync error: status {status}")]
    Response { status: u16, body: String },
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// The user fields mirrored into the CMS collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmsUser {
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    pub role: Role,
}

impl CmsUser {
    #[must_use]
    pub fn from_principal(principal: &Principal, role: Role) -> Self {
        Self { id: principal.id.clone(), email: principal.email.clone(), name: principal.display_name(), role }
    }
}

#[async_trait::async_trait]
pub trait CmsSync: Send + Sync {
    async fn create_user(&self, user: &CmsUser) -> Result<(), CmsSyncError>;

    async fn update_onboarding(&self, user: &CmsUser) -> Result<(), CmsSyncError>;
}

// =============================================================================
// EDGE FUNCTION CLIENT
// =============================================================================

pub struct EdgeFunctionSync {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl EdgeFunctionSync {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, CmsSyncError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SYNC_TIMEOUT_SECS))
            .build()
            .map_err(|e| CmsSyncError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), anon_key: anon_key.to_owned() })
    }

    async fn invoke(&self, path: &str, body: &serde_json::Value) -> Result<(), CmsSyncError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CmsSyncError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CmsSyncError::Response { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CmsSync for EdgeFunctionSync {
    async fn create_user(&self, user: &CmsUser) -> Result<(), CmsSyncError> {
        self.invoke(CREATE_USER_PATH, &create_user_payload(user)).await
    }

    async fn update_onboarding(&self, user: &CmsUser) -> Result<(), CmsSyncError> {
        self.invoke(UPDATE_ONBOARDING_PATH, &update_onboarding_payload(user)).await
    }
}

fn create_user_payload(user: &CmsUser) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "id": user.id,
            "email": user.email,
            "user_metadata": { "name": user.name },
        },
        "role": user.role,
    })
}

fn update_onboarding_payload(user: &CmsUser) -> serde_json::Value {
    serde_json::json!({
        "userId": user.id,
        "onboardingData": {
            "name": user.name,
            "email": user.email,
            "role": user.role,
            "firebaseUid": user.id,
            "onboardingCompleted": true,
        },
    })
}

/// Sync target used when CMS sync is switched off.
pub struct DisabledSync;

#[async_trait::async_trait]
impl CmsSync for DisabledSync {
    async fn create_user(&self, user: &CmsUser) -> Result<(), CmsSyncError> {
        tracing::debug!(subject_id = %user.id, "cms sync disabled; skipping create");
        Ok(())
    }

    async fn update_onboarding(&self, user: &CmsUser) -> Result<(), CmsSyncError> {
        tracing::debug!(subject_id = %user.id, "cms sync disabled; skipping onboarding update");
        Ok(())
    }
}

// =============================================================================
// BEST-EFFORT DISPATCH
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    CreateUser,
    UpdateOnboarding,
}

impl SyncOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::UpdateOnboarding => "update_onboarding",
        }
    }
}

/// Run one sync operation, logging and swallowing any failure.
/// Returns whether it succeeded, for observability only.
pub async fn sync_best_effort(cms: &dyn CmsSync, op: SyncOp, user: &CmsUser) -> bool {
    let result = match op {
        SyncOp::CreateUser => cms.create_user(user).await,
        SyncOp::UpdateOnboarding => cms.update_onboarding(user).await,
    };
    match result {
        Ok(()) => {
            tracing::info!(op = op.as_str(), subject_id = %user.id, "cms sync complete");
            true
        }
        Err(e) => {
            tracing::warn!(op = op.as_str(), subject_id = %user.id, error = %e, "cms sync failed; continuing");
            false
        }
    }
}

/// Detach a best-effort sync from the caller.
pub fn spawn_sync(cms: Arc<dyn CmsSync>, op: SyncOp, user: CmsUser) -> JoinHandle<bool> {
    tokio::spawn(async move { sync_best_effort(cms.as_ref(), op, &user).await })
}

#[cfg(test)]
#[path = "cms_sync_test.rs"]
mod tests;
