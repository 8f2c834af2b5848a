//! Authentication state cache.
//!
//! ARCHITECTURE
//! ============
//! A validated `(token, subject_id, role)` triple lives in three cookies and
//! acts as a fast local copy of the identity provider's session state.
//! `peek` answers "who is this" without I/O and is only good for instant UI
//! decisions; `revalidate` asks the provider and is the access-control answer.
//!
//! INVARIANTS
//! ==========
//! - All three fields present or the entry reads as absent.
//! - Any failed revalidation evicts the whole entry before the caller acts.
//! - Eviction covers every scope a fragment may have been written under.

use std::collections::BTreeSet;
use std::fmt::Write;

use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use super::cookie_store::CookieStore;
use super::identity::{IdentityError, IdentityProvider, Principal, Role};

/// Default retention window for auth cookies.
pub const DEFAULT_MAX_AGE: Duration = Duration::days(7);

/// Default bound on one provider round-trip during revalidation.
pub const DEFAULT_CHECK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

// =============================================================================
// ENTRY + POLICY
// =============================================================================

/// A complete cached triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCacheEntry {
    /// Opaque bearer credential. Never parsed locally.
    pub token: String,
    pub subject_id: String,
    pub role: Role,
}

/// Cookie names holding the triple, plus the provider refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieNames {
    pub token: String,
    pub subject_id: String,
    pub role: String,
    pub refresh_token: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            token: "c.token".into(),
            subject_id: "uid".into(),
            role: "user_type".into(),
            refresh_token: "c.refresh".into(),
        }
    }
}

impl CookieNames {
    /// Every cookie owned by the cache.
    fn owned(&self) -> [&str; 4] {
        [&self.token, &self.subject_id, &self.role, &self.refresh_token]
    }
}

/// How auth cookies are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub names: CookieNames,
    pub max_age: Duration,
    pub path: String,
    /// Explicit `Domain` attribute; host-only cookies when `None`.
    pub domain: Option<String>,
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self { names: CookieNames::default(), max_age: DEFAULT_MAX_AGE, path: "/".into(), domain: None, secure: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cannot cache an empty {0}")]
    EmptyField(&'static str),
}

// =============================================================================
// REVALIDATION OUTCOME
// =============================================================================

/// Why a cached entry failed revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Missing,
    BadToken,
    IdentityMismatch,
    RoleMismatch,
    Timeout,
    ProviderUnavailable,
}

impl InvalidReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::BadToken => "bad_token",
            Self::IdentityMismatch => "identity_mismatch",
            Self::RoleMismatch => "role_mismatch",
            Self::Timeout => "timeout",
            Self::ProviderUnavailable => "provider_unavailable",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    Valid(Principal),
    Invalid(InvalidReason),
}

impl Revalidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Valid(p) => Some(p),
            Self::Invalid(_) => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(r) => Some(*r),
        }
    }
}

/// Short SHA-256 fingerprint for correlating a token in logs without leaking it.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut s = String::with_capacity(12);
    for b in &digest[..6] {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Check `entry` against the identity provider. First failure wins.
///
/// Does not touch storage; callers must evict on `Invalid`. See
/// [`AuthCache::check`] for the packaged fail-closed variant.
pub async fn revalidate<P>(provider: &P, entry: Option<&AuthCacheEntry>, timeout: std::time::Duration) -> Revalidation
where
    P: IdentityProvider + ?Sized,
{
    let Some(entry) = entry else {
        return Revalidation::Invalid(InvalidReason::Missing);
    };
    let fingerprint = token_fingerprint(&entry.token);

    let principal = match tokio::time::timeout(timeout, provider.resolve(&entry.token)).await {
        Ok(Ok(principal)) => principal,
        Ok(Err(IdentityError::InvalidToken)) => return Revalidation::Invalid(InvalidReason::BadToken),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, token = %fingerprint, "identity provider unavailable during revalidation");
            return Revalidation::Invalid(InvalidReason::ProviderUnavailable);
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis(), token = %fingerprint, "revalidation timed out");
            return Revalidation::Invalid(InvalidReason::Timeout);
        }
    };

    if principal.id != entry.subject_id {
        return Revalidation::Invalid(InvalidReason::IdentityMismatch);
    }
    if principal.role != Some(entry.role) {
        return Revalidation::Invalid(InvalidReason::RoleMismatch);
    }
    Revalidation::Valid(principal)
}

// =============================================================================
// CACHE
// =============================================================================

/// Cookie-backed cache of the authenticated triple.
#[derive(Debug)]
pub struct AuthCache<S> {
    store: S,
    policy: CookiePolicy,
}

impl<S: CookieStore> AuthCache<S> {
    #[must_use]
    pub fn new(store: S, policy: CookiePolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub fn policy(&self) -> &CookiePolicy {
        &self.policy
    }

    /// Persist the triple for the configured retention window.
    ///
    /// # Errors
    ///
    /// `CacheError::EmptyField` if `token` or `subject_id` is blank; nothing
    /// is written in that case.
    pub fn commit(&mut self, token: &str, subject_id: &str, role: Role) -> Result<(), CacheError> {
        if token.trim().is_empty() {
            return Err(CacheError::EmptyField("token"));
        }
        if subject_id.trim().is_empty() {
            return Err(CacheError::EmptyField("subject id"));
        }

        let names = self.policy.names.clone();
        self.write(&names.token, token);
        self.write(&names.subject_id, subject_id);
        self.write(&names.role, role.as_str());

        tracing::debug!(subject_id, %role, token = %token_fingerprint(token), "auth cache committed");
        Ok(())
    }

    /// Persist the provider refresh token next to the triple, on the same
    /// retention window. Evicted with the rest.
    ///
    /// # Errors
    ///
    /// `CacheError::EmptyField` if `refresh_token` is blank.
    pub fn commit_refresh_token(&mut self, refresh_token: &str) -> Result<(), CacheError> {
        if refresh_token.trim().is_empty() {
            return Err(CacheError::EmptyField("refresh token"));
        }
        let name = self.policy.names.refresh_token.clone();
        self.write(&name, refresh_token);
        Ok(())
    }

    /// Stored refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.store
            .get(&self.policy.names.refresh_token)
            .filter(|v| !v.is_empty())
    }

    fn write(&mut self, name: &str, value: &str) {
        let mut cookie = Cookie::build((name.to_owned(), value.to_owned()))
            .path(self.policy.path.clone())
            .max_age(self.policy.max_age)
            .secure(self.policy.secure)
            .same_site(SameSite::Lax);
        if let Some(domain) = &self.policy.domain {
            cookie = cookie.domain(domain.clone());
        }
        self.store.set(cookie.build());
    }

    /// Local read. `Some` only if all three fields are present and well-formed.
    #[must_use]
    pub fn peek(&self) -> Option<AuthCacheEntry> {
        let names = &self.policy.names;
        let token = self.store.get(&names.token).filter(|v| !v.is_empty())?;
        let subject_id = self.store.get(&names.subject_id).filter(|v| !v.is_empty())?;
        let role = self.store.get(&names.role)?.parse::<Role>().ok()?;
        Some(AuthCacheEntry { token, subject_id, role })
    }

    /// Whether any auth cookie is visible, complete or not.
    #[must_use]
    pub fn has_fragments(&self) -> bool {
        self.policy
            .names
            .owned()
            .iter()
            .any(|name| self.store.get(name).is_some())
    }

    /// Clear the entry under every plausible path and domain scope.
    pub fn evict(&mut self) {
        let mut paths: Vec<Option<String>> = vec![Some("/".into()), None, Some(self.policy.path.clone())];
        paths.push(Some(self.store.request_path().to_owned()));

        let mut domains: Vec<Option<String>> = vec![None];
        if let Some(host) = self.store.request_host() {
            domains.push(Some(host.to_owned()));
            domains.push(Some(format!(".{host}")));
        }
        if let Some(domain) = &self.policy.domain {
            domains.push(Some(domain.clone()));
        }

        let names: Vec<String> = self.policy.names.owned().iter().map(|n| (*n).to_owned()).collect();
        let mut seen = BTreeSet::new();
        for name in &names {
            for path in &paths {
                for domain in &domains {
                    let mut cookie = Cookie::build((name.clone(), String::new()))
                        .max_age(Duration::ZERO)
                        .expires(OffsetDateTime::UNIX_EPOCH);
                    if let Some(path) = path {
                        cookie = cookie.path(path.clone());
                    }
                    if let Some(domain) = domain {
                        cookie = cookie.domain(domain.clone());
                    }
                    let cookie = cookie.build();
                    if seen.insert(cookie.to_string()) {
                        self.store.set(cookie);
                    }
                }
            }
        }
        tracing::debug!(scopes = seen.len(), "auth cache evicted");
    }

    /// Peek, revalidate, and evict on any failure.
    ///
    /// An anonymous visitor with no auth cookies at all gets `Missing`
    /// without any storage writes.
    pub async fn check<P>(&mut self, provider: &P, timeout: std::time::Duration) -> Revalidation
    where
        P: IdentityProvider + ?Sized,
    {
        let entry = self.peek();
        let outcome = revalidate(provider, entry.as_ref(), timeout).await;

        match &outcome {
            Revalidation::Valid(principal) => {
                tracing::debug!(subject_id = %principal.id, "auth cache revalidated");
            }
            Revalidation::Invalid(InvalidReason::Missing) if !self.has_fragments() => {}
            Revalidation::Invalid(reason) => {
                tracing::info!(%reason, "auth cache rejected; evicting");
                self.evict();
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
