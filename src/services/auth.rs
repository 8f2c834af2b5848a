//! Account flows: login, registration, email confirmation, session refresh,
//! logout and onboarding completion.
//!
//! DESIGN
//! ======
//! Each flow talks to the `AccountService` first and only then touches the
//! auth cache, so a failed provider call never leaves a half-written triple.
//! CMS sync is dispatched after the auth outcome is decided and is never
//! awaited by the flow itself.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::cache::{AuthCache, CacheError, token_fingerprint};
use super::cms_sync::{CmsSync, CmsUser, SyncOp, spawn_sync};
use super::cookie_store::CookieStore;
use super::identity::{AccountService, IdentityError, Principal, Role, Session, SignUpRequest};
use super::redirect::RouteTable;

const MIN_PASSWORD_LEN: usize = 8;
const SIGNUP_CALLBACK: &str = "signup";

#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least 8 characters with upper case, lower case and a digit")]
    WeakPassword,
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("account has no recognized role")]
    UnknownRole,
    #[error("unsupported confirmation type: {0}")]
    UnsupportedCallback(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// =============================================================================
// INPUT VALIDATION
// =============================================================================

/// Trim and lowercase an address shaped like `local@domain.tld`.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    if host.is_empty() || tld.is_empty() {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn password_is_strong(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

// =============================================================================
// FLOW RESULTS
// =============================================================================

/// A fresh sign-in that has been committed to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub principal: Principal,
    pub role: Role,
    pub redirect: String,
    /// Access token lifetime in seconds, when the provider reports one.
    pub expires_in: Option<u64>,
}

/// Registration input from the sign-up form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct Registered {
    pub principal: Principal,
    /// Detached CMS create; callers may drop it.
    pub cms_sync: JoinHandle<bool>,
}

#[derive(Debug)]
pub struct Onboarded {
    pub principal: Principal,
    pub redirect: String,
    /// Detached CMS update; callers may drop it.
    pub cms_sync: JoinHandle<bool>,
}

fn commit_signed_in<S: CookieStore>(
    cache: &mut AuthCache<S>,
    routes: &RouteTable,
    token: &str,
    principal: Principal,
) -> Result<SignedIn, AuthFlowError> {
    let role = principal.role.ok_or(AuthFlowError::UnknownRole)?;
    cache.commit(token, &principal.id, role)?;
    let redirect = routes.after_sign_in(&principal, role);
    Ok(SignedIn { principal, role, redirect, expires_in: None })
}

/// Commit the access triple, then the refresh token when the session has one.
fn commit_session<S: CookieStore>(
    cache: &mut AuthCache<S>,
    routes: &RouteTable,
    session: Session,
) -> Result<SignedIn, AuthFlowError> {
    let mut signed_in = commit_signed_in(cache, routes, &session.access_token, session.principal)?;
    if let Some(refresh_token) = session.refresh_token.as_deref().filter(|t| !t.trim().is_empty()) {
        cache.commit_refresh_token(refresh_token)?;
    }
    signed_in.expires_in = session.expires_in;
    Ok(signed_in)
}

/// Provider outages leave the cache alone; everything else means the
/// refresh token is unusable.
fn is_transient(err: &AuthFlowError) -> bool {
    matches!(err, AuthFlowError::Identity(IdentityError::Request(_) | IdentityError::Response { .. }))
}

// =============================================================================
// FLOWS
// =============================================================================

/// Password sign-in, then commit the issued session.
///
/// # Errors
///
/// Validation errors before any provider call; provider errors as
/// `AuthFlowError::Identity`.
pub async fn login<S, A>(
    cache: &mut AuthCache<S>,
    accounts: &A,
    routes: &RouteTable,
    email: &str,
    password: &str,
) -> Result<SignedIn, AuthFlowError>
where
    S: CookieStore,
    A: AccountService + ?Sized,
{
    let email = normalize_email(email).ok_or(AuthFlowError::InvalidEmail)?;
    if password.is_empty() {
        return Err(AuthFlowError::MissingField("password"));
    }

    let session = accounts.sign_in(&email, password).await?;
    let token = token_fingerprint(&session.access_token);
    let signed_in = commit_session(cache, routes, session)?;
    tracing::info!(
        subject_id = %signed_in.principal.id,
        role = %signed_in.role,
        %token,
        "login succeeded"
    );
    Ok(signed_in)
}

/// Create the account and mirror it into the CMS in the background.
///
/// The confirmation email links back to the role's onboarding page. The CMS
/// create can fail without affecting the result.
///
/// # Errors
///
/// Validation errors, or the provider's sign-up error.
pub async fn register<A>(
    accounts: &A,
    cms: Arc<dyn CmsSync>,
    routes: &RouteTable,
    form: Registration,
) -> Result<Registered, AuthFlowError>
where
    A: AccountService + ?Sized,
{
    let email = normalize_email(&form.email).ok_or(AuthFlowError::InvalidEmail)?;
    if !password_is_strong(&form.password) {
        return Err(AuthFlowError::WeakPassword);
    }
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AuthFlowError::MissingField("name"));
    }

    let request = SignUpRequest {
        email,
        password: form.password,
        name: name.to_owned(),
        role: form.role,
        redirect_to: routes.absolute(routes.onboarding_for(form.role)),
    };
    let mut principal = accounts.sign_up(&request).await?;
    if principal.name.is_none() {
        principal.name = Some(request.name.clone());
    }
    tracing::info!(subject_id = %principal.id, role = %form.role, "account registered");

    let cms_sync = spawn_sync(cms, SyncOp::CreateUser, CmsUser::from_principal(&principal, form.role));
    Ok(Registered { principal, cms_sync })
}

/// Handle the email confirmation link: resolve the token, then commit it
/// along with the link's refresh token, if any.
///
/// # Errors
///
/// `UnsupportedCallback` for anything but a sign-up confirmation;
/// `MissingField` without a token; provider errors otherwise.
pub async fn confirm_email<S, A>(
    cache: &mut AuthCache<S>,
    accounts: &A,
    routes: &RouteTable,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    kind: Option<&str>,
) -> Result<SignedIn, AuthFlowError>
where
    S: CookieStore,
    A: AccountService + ?Sized,
{
    match kind {
        Some(SIGNUP_CALLBACK) => {}
        other => return Err(AuthFlowError::UnsupportedCallback(other.unwrap_or_default().to_owned())),
    }
    let token = access_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthFlowError::MissingField("access token"))?;

    let principal = accounts.resolve(token).await?;
    let session = Session {
        access_token: token.to_owned(),
        refresh_token: refresh_token.map(str::to_owned),
        expires_in: None,
        principal,
    };
    let signed_in = commit_session(cache, routes, session)?;
    tracing::info!(subject_id = %signed_in.principal.id, "email confirmed");
    Ok(signed_in)
}

/// Exchange the stored refresh token for a new session and re-commit.
///
/// A missing, spent or rejected refresh token evicts the whole auth state.
/// Provider outages leave the cookies as they were so the client can retry.
///
/// # Errors
///
/// `MissingField` without a stored refresh token; provider errors otherwise.
pub async fn refresh<S, A>(
    cache: &mut AuthCache<S>,
    accounts: &A,
    routes: &RouteTable,
) -> Result<SignedIn, AuthFlowError>
where
    S: CookieStore,
    A: AccountService + ?Sized,
{
    let Some(refresh_token) = cache.refresh_token() else {
        if cache.has_fragments() {
            cache.evict();
        }
        return Err(AuthFlowError::MissingField("refresh token"));
    };

    let result = match accounts.refresh(&refresh_token).await {
        Ok(session) => commit_session(cache, routes, session),
        Err(e) => Err(e.into()),
    };
    match &result {
        Ok(signed_in) => tracing::info!(subject_id = %signed_in.principal.id, "session refreshed"),
        Err(e) if is_transient(e) => tracing::warn!(error = %e, "session refresh unavailable"),
        Err(e) => {
            tracing::info!(reason = %e, token = %token_fingerprint(&refresh_token), "session refresh rejected; evicting");
            cache.evict();
        }
    }
    result
}

/// Sign out at the provider, then evict. Eviction always happens.
///
/// Returns the login page URL.
pub async fn logout<S, A>(cache: &mut AuthCache<S>, accounts: &A, routes: &RouteTable) -> String
where
    S: CookieStore,
    A: AccountService + ?Sized,
{
    let token_name = cache.policy().names.token.clone();
    if let Some(token) = cache.store().get(&token_name).filter(|t| !t.is_empty()) {
        if let Err(e) = accounts.sign_out(&token).await {
            tracing::warn!(error = %e, token = %token_fingerprint(&token), "provider sign-out failed; evicting anyway");
        }
    }
    cache.evict();
    routes.login.clone()
}

/// Record onboarding completion for an authenticated principal.
///
/// # Errors
///
/// The provider's error if the flag could not be set. CMS failures never
/// surface here.
pub async fn complete_onboarding<A>(
    accounts: &A,
    cms: Arc<dyn CmsSync>,
    routes: &RouteTable,
    token: &str,
    role: Role,
) -> Result<Onboarded, AuthFlowError>
where
    A: AccountService + ?Sized,
{
    let principal = accounts.mark_onboarding_completed(token).await?;
    tracing::info!(subject_id = %principal.id, %role, "onboarding completed");

    let cms_sync = spawn_sync(cms, SyncOp::UpdateOnboarding, CmsUser::from_principal(&principal, role));
    Ok(Onboarded { principal, redirect: routes.dashboard_for(role).to_owned(), cms_sync })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
