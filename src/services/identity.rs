//! Identity provider boundary.
//!
//! DESIGN
//! ======
//! The provider is ground truth for who a bearer token belongs to. Locally we
//! only ever hold the token as an opaque string; `IdentityProvider::resolve`
//! turns it into a `Principal` or an explicit `InvalidToken` signal.
//! `AccountService` adds the account flows (sign-in, sign-up, refresh,
//! sign-out, onboarding flag) that mint or destroy tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// ROLE
// =============================================================================

/// Closed set of role tags asserted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Retailer,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Customer, Role::Retailer];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Retailer => "retailer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "retailer" => Ok(Self::Retailer),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// Resolve the role claim from user metadata.
///
/// `user_type` wins over `role`; blank values are skipped. A missing claim
/// means `customer`, an unrecognized one yields `None`.
#[must_use]
pub fn role_from_claims(user_type: Option<&str>, role: Option<&str>) -> Option<Role> {
    let claim = [user_type, role]
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty());
    match claim {
        None => Some(Role::Customer),
        Some(raw) => raw.parse().ok(),
    }
}

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The authenticated entity a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Stable provider-assigned identifier.
    pub id: String,
    /// Role claim; `None` when the provider asserts a role outside the closed set.
    pub role: Option<Role>,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Sole input for onboarding routing.
    pub onboarding_completed: bool,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role: Some(role), email: None, name: None, onboarding_completed: false }
    }

    /// Display name: explicit name, else the email local part, else `"User"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_owned();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_owned()
    }
}

/// A freshly issued provider session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub principal: Principal,
}

/// Registration input, already validated by the caller.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    /// Absolute URL the confirmation email links back to.
    pub redirect_to: String,
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider does not recognize the token (unknown, expired, revoked).
    #[error("token rejected by identity provider")]
    InvalidToken,

    /// The provider refused the operation with a user-facing message.
    #[error("identity provider rejected request: {0}")]
    Rejected(String),

    #[error("identity provider request failed: {0}")]
    Request(String),

    #[error("identity provider error: status {status}")]
    Response { status: u16, body: String },

    #[error("identity provider response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// TRAITS
// =============================================================================

/// Resolves bearer tokens to principals.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token` to the principal it was issued to.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidToken` when the provider reports the token
    /// unknown or expired; other variants for transport or parse failures.
    async fn resolve(&self, token: &str) -> Result<Principal, IdentityError>;
}

/// Account flows on top of token resolution.
#[async_trait::async_trait]
pub trait AccountService: IdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Principal, IdentityError>;

    /// Exchange a refresh token for a new session. The old refresh token is spent.
    async fn refresh(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    /// Set `onboarding_completed` on the token's user and return the updated principal.
    async fn mark_onboarding_completed(&self, token: &str) -> Result<Principal, IdentityError>;
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
