//! Per-request auth guard.
//!
//! One `PageGuard` serves one page load. The first call to `outcome()` runs
//! the fail-closed check against the identity provider; every other caller,
//! concurrent or later, awaits and reads that same result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};

use super::cache::{AuthCache, AuthCacheEntry, Revalidation};
use super::cookie_store::CookieStore;
use super::identity::IdentityProvider;

pub struct PageGuard<S, P: ?Sized> {
    cache: Mutex<AuthCache<S>>,
    provider: Arc<P>,
    timeout: Duration,
    outcome: OnceCell<Revalidation>,
}

impl<S, P> PageGuard<S, P>
where
    S: CookieStore,
    P: IdentityProvider + ?Sized,
{
    #[must_use]
    pub fn new(cache: AuthCache<S>, provider: Arc<P>, timeout: Duration) -> Self {
        Self { cache: Mutex::new(cache), provider, timeout, outcome: OnceCell::new() }
    }

    /// The memoized revalidation outcome for this page.
    pub async fn outcome(&self) -> &Revalidation {
        self.outcome
            .get_or_init(|| async {
                let mut cache = self.cache.lock().await;
                cache.check(self.provider.as_ref(), self.timeout).await
            })
            .await
    }

    /// Whether the check has already run.
    #[cfg(test)]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outcome.initialized()
    }

    /// The cached triple, only when the check succeeded.
    pub async fn verified_entry(&self) -> Option<AuthCacheEntry> {
        if !self.outcome().await.is_valid() {
            return None;
        }
        self.cache.lock().await.peek()
    }

    /// Run `f` with exclusive access to the underlying cache.
    #[cfg(test)]
    pub async fn with_cache<R>(&self, f: impl FnOnce(&mut AuthCache<S>) -> R) -> R {
        let mut cache = self.cache.lock().await;
        f(&mut cache)
    }

    #[must_use]
    pub fn into_cache(self) -> AuthCache<S> {
        self.cache.into_inner()
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
