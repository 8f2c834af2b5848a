//! Supabase Auth client.
//!
//! Thin HTTP wrapper over the GoTrue REST endpoints. Response handling lives
//! in pure `parse_*` functions so it can be tested without a server.

use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::identity::{AccountService, IdentityError, IdentityProvider, Principal, Session, SignUpRequest, role_from_claims};

const USER_PATH: &str = "/auth/v1/user";
const SIGN_IN_PATH: &str = "/auth/v1/token?grant_type=password";
const REFRESH_PATH: &str = "/auth/v1/token?grant_type=refresh_token";
const SIGN_UP_PATH: &str = "/auth/v1/signup";
const SIGN_OUT_PATH: &str = "/auth/v1/logout";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Connection settings for a Supabase project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL without trailing slash, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key, sent as `apikey` on every request.
    pub anon_key: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.url.trim_end_matches('/').to_owned(), anon_key: config.anon_key.clone() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), IdentityError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseClient {
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        let (status, body) = self
            .send(self.http.get(self.url(USER_PATH)).bearer_auth(token))
            .await?;
        check_token_status(status, body).and_then(|body| parse_user(&body))
    }
}

#[async_trait::async_trait]
impl AccountService for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let request = self
            .http
            .post(self.url(SIGN_IN_PATH))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        check_rejection(status, body).and_then(|body| parse_session(&body))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Principal, IdentityError> {
        let role = request.role.as_str();
        let http_request = self
            .http
            .post(self.url(SIGN_UP_PATH))
            .query(&[("redirect_to", request.redirect_to.as_str())])
            .json(&serde_json::json!({
                "email": request.email,
                "password": request.password,
                "data": { "name": request.name, "user_type": role, "role": role },
            }));
        let (status, body) = self.send(http_request).await?;
        check_rejection(status, body).and_then(|body| parse_sign_up(&body))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let request = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let (status, body) = self.send(request).await?;
        check_rejection(status, body).and_then(|body| parse_session(&body))
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let (status, body) = self
            .send(self.http.post(self.url(SIGN_OUT_PATH)).bearer_auth(token))
            .await?;
        check_token_status(status, body).map(|_| ())
    }

    async fn mark_onboarding_completed(&self, token: &str) -> Result<Principal, IdentityError> {
        let completed_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| IdentityError::Parse(e.to_string()))?;
        let request = self
            .http
            .put(self.url(USER_PATH))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "data": { "onboarding_completed": true, "onboarding_date": completed_at },
            }));
        let (status, body) = self.send(request).await?;
        check_token_status(status, body).and_then(|body| parse_user(&body))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    user_type: Option<String>,
    role: Option<String>,
    name: Option<String>,
    onboarding_completed: Option<bool>,
}

impl From<UserRecord> for Principal {
    fn from(user: UserRecord) -> Self {
        let meta = user.user_metadata;
        Self {
            role: role_from_claims(meta.user_type.as_deref(), meta.role.as_deref()),
            id: user.id,
            email: user.email,
            name: meta.name,
            onboarding_completed: meta.onboarding_completed.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    user: UserRecord,
}

// =============================================================================
// PARSING
// =============================================================================

/// Token-bearing endpoints: 401/403/404 mean the token (or its user) is gone.
fn check_token_status(status: u16, body: String) -> Result<String, IdentityError> {
    match status {
        200..=299 => Ok(body),
        401 | 403 | 404 => Err(IdentityError::InvalidToken),
        _ => Err(IdentityError::Response { status, body }),
    }
}

/// Credential endpoints: 4xx carries a user-facing message.
fn check_rejection(status: u16, body: String) -> Result<String, IdentityError> {
    match status {
        200..=299 => Ok(body),
        400..=499 => Err(IdentityError::Rejected(error_message(&body))),
        _ => Err(IdentityError::Response { status, body }),
    }
}

/// Extract the human message from a GoTrue error body.
#[must_use]
pub fn error_message(body: &str) -> String {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(serde_json::Value::as_str))
        .map_or_else(|| "request rejected".to_owned(), str::to_owned)
}

pub(crate) fn parse_user(body: &str) -> Result<Principal, IdentityError> {
    serde_json::from_str::<UserRecord>(body)
        .map(Principal::from)
        .map_err(|e| IdentityError::Parse(e.to_string()))
}

pub(crate) fn parse_session(body: &str) -> Result<Session, IdentityError> {
    let resp: TokenResponse = serde_json::from_str(body).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(Session {
        access_token: resp.access_token,
        refresh_token: resp.refresh_token,
        expires_in: resp.expires_in,
        principal: resp.user.into(),
    })
}

/// Sign-up answers with the bare user when confirmation is pending, or with a
/// session wrapping it when autoconfirm is on.
pub(crate) fn parse_sign_up(body: &str) -> Result<Principal, IdentityError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| IdentityError::Parse(e.to_string()))?;
    let user = value.get("user").filter(|u| !u.is_null()).cloned().unwrap_or(value);
    serde_json::from_value::<UserRecord>(user)
        .map(Principal::from)
        .map_err(|e| IdentityError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
