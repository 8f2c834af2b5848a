//! Client-side cookie storage.
//!
//! ARCHITECTURE
//! ============
//! `CookieStore` is the storage layer under the auth cache. Writes are
//! `Set-Cookie` shaped (`Cookie` with path/domain/max-age), reads are by name
//! as a browser would present them for the current page.
//!
//! - `HeaderCookieStore` serves one HTTP request: reads come from the
//!   request's `Cookie` header, writes queue outgoing `Set-Cookie` headers.
//! - `MemoryCookieStore` is a browser jar keyed by (name, domain, path). It
//!   keeps cookies written under different scopes apart, which is exactly how
//!   stale fragments survive a root-path clear.

use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::{Duration, OffsetDateTime};

/// Storage for auth cookies as seen from one page.
pub trait CookieStore: Send {
    /// Value of the cookie `name` visible to the current page, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Apply a `Set-Cookie`. Zero max-age or past expiry deletes.
    fn set(&mut self, cookie: Cookie<'static>);

    /// Path of the page the cookies are read for.
    fn request_path(&self) -> &str;

    /// Host of the page, without port.
    fn request_host(&self) -> Option<&str>;
}

fn is_removal(cookie: &Cookie<'_>, now: OffsetDateTime) -> bool {
    if let Some(max_age) = cookie.max_age() {
        return max_age <= Duration::ZERO;
    }
    cookie.expires_datetime().is_some_and(|at| at <= now)
}

/// Strip the port from a `Host` header value.
fn host_without_port(raw: &str) -> &str {
    if raw.starts_with('[') {
        return raw.find(']').map_or(raw, |end| &raw[..=end]);
    }
    raw.split(':').next().unwrap_or(raw)
}

// =============================================================================
// HEADER STORE
// =============================================================================

/// Per-request store over the `Cookie` request header.
#[derive(Debug, Default)]
pub struct HeaderCookieStore {
    incoming: HashMap<String, String>,
    pending: Vec<Cookie<'static>>,
    path: String,
    host: Option<String>,
}

impl HeaderCookieStore {
    /// Build from request headers. `path` is the page path the request acts for.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, path: &str) -> Self {
        let jar = CookieJar::from_headers(headers);
        let incoming = jar
            .iter()
            .map(|c| (c.name().to_owned(), c.value().to_owned()))
            .collect();
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| host_without_port(h).to_ascii_lowercase())
            .filter(|h| !h.is_empty());
        let path = if path.starts_with('/') { path.to_owned() } else { "/".to_owned() };
        Self { incoming, pending: Vec::new(), path, host }
    }

    /// Drain queued writes as `Set-Cookie` header values, in write order.
    pub fn take_set_cookies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Number of queued `Set-Cookie` writes.
    #[cfg(test)]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl CookieStore for HeaderCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        // The latest write for this name in the response wins over the request.
        if let Some(written) = self.pending.iter().rev().find(|c| c.name() == name) {
            if is_removal(written, OffsetDateTime::now_utc()) {
                return None;
            }
            return Some(written.value().to_owned());
        }
        self.incoming.get(name).cloned()
    }

    fn set(&mut self, cookie: Cookie<'static>) {
        self.pending.push(cookie);
    }

    fn request_path(&self) -> &str {
        &self.path
    }

    fn request_host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CookieKey {
    name: String,
    /// `None` for host-only cookies.
    domain: Option<String>,
    path: String,
}

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    expires_at: Option<OffsetDateTime>,
}

/// In-memory browser cookie jar for a single host and page.
#[derive(Debug, Clone)]
pub struct MemoryCookieStore {
    host: String,
    page_path: String,
    cookies: BTreeMap<CookieKey, StoredCookie>,
    clock_offset: Duration,
}

impl MemoryCookieStore {
    #[must_use]
    pub fn new(host: impl Into<String>, page_path: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            page_path: page_path.into(),
            cookies: BTreeMap::new(),
            clock_offset: Duration::ZERO,
        }
    }

    /// Navigate to another page on the same host. Cookies are kept.
    pub fn navigate(&mut self, page_path: impl Into<String>) {
        self.page_path = page_path.into();
    }

    /// Move the jar's clock forward to simulate elapsed retention time.
    pub fn advance(&mut self, by: Duration) {
        self.clock_offset += by;
    }

    /// Number of unexpired cookies in the jar, across all scopes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let now = self.now();
        self.cookies.values().filter(|c| !is_expired(c, now)).count()
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + self.clock_offset
    }
}

fn is_expired(cookie: &StoredCookie, now: OffsetDateTime) -> bool {
    cookie.expires_at.is_some_and(|at| at <= now)
}

/// Default cookie path for a page (RFC 6265 §5.1.4).
fn default_path(page_path: &str) -> String {
    if !page_path.starts_with('/') {
        return "/".to_owned();
    }
    match page_path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(idx) => page_path[..idx].to_owned(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        let now = self.now();
        self.cookies
            .iter()
            .filter(|(key, stored)| {
                key.name == name && !is_expired(stored, now) && path_matches(&self.page_path, &key.path)
            })
            // Longer paths are more specific and come first, as in a browser.
            .max_by_key(|(key, _)| key.path.len())
            .map(|(_, stored)| stored.value.clone())
    }

    fn set(&mut self, cookie: Cookie<'static>) {
        let domain = cookie.domain().map(str::to_ascii_lowercase);
        if let Some(domain) = domain.as_deref() {
            if !domain_matches(&self.host, domain) {
                tracing::debug!(name = cookie.name(), domain, host = %self.host, "cookie domain rejected");
                return;
            }
        }

        let key = CookieKey {
            name: cookie.name().to_owned(),
            domain,
            path: cookie
                .path()
                .map_or_else(|| default_path(&self.page_path), str::to_owned),
        };

        let now = self.now();
        if is_removal(&cookie, now) {
            self.cookies.remove(&key);
            return;
        }

        let expires_at = match cookie.max_age() {
            Some(max_age) => Some(now + max_age),
            None => cookie.expires_datetime(),
        };
        self.cookies.insert(key, StoredCookie { value: cookie.value().to_owned(), expires_at });
    }

    fn request_path(&self) -> &str {
        &self.page_path
    }

    fn request_host(&self) -> Option<&str> {
        Some(&self.host)
    }
}

#[cfg(test)]
#[path = "cookie_store_test.rs"]
mod tests;
