//! Service configuration parsed from environment variables.
//!
//! Required:
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`
//!
//! Optional:
//! - `PORT`: default 3000
//! - `SITE_URL`: public origin used in confirmation links
//! - `COOKIE_SECURE`: env bool; defaults to `false` only for an `http://` `SITE_URL`
//! - `COOKIE_DOMAIN`: host-only cookies when absent
//! - `COOKIE_MAX_AGE_SECS`: default 604800 (7 days), must be positive
//! - `AUTH_CHECK_TIMEOUT_MS`: default 5000, must be positive
//! - `ROUTE_LOGIN`, `ROUTE_CUSTOMER_ONBOARDING`, `ROUTE_RETAILER_ONBOARDING`,
//!   `ROUTE_CUSTOMER_DASHBOARD`, `ROUTE_RETAILER_DASHBOARD`
//! - `PROTECTED_PREFIXES`: comma-separated path prefixes
//! - `CMS_SYNC_ENABLED`: env bool, default true
//! - `SUPABASE_REQUEST_TIMEOUT_SECS`, `SUPABASE_CONNECT_TIMEOUT_SECS`: positive

use std::time::Duration;

use crate::services::cache::{CookiePolicy, DEFAULT_CHECK_TIMEOUT, DEFAULT_MAX_AGE};
use crate::services::redirect::RouteTable;
use crate::services::supabase::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, SupabaseConfig};

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub supabase: SupabaseConfig,
    pub cookie: CookiePolicy,
    pub check_timeout: Duration,
    pub routes: RouteTable,
    pub cms_sync_enabled: bool,
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` for an absent required variable,
    /// `ConfigError::Invalid` for a present but unparseable one, or a zero or
    /// negative duration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let supabase = SupabaseConfig {
            url: env.required("SUPABASE_URL")?.trim_end_matches('/').to_owned(),
            anon_key: env.required("SUPABASE_ANON_KEY")?,
            request_timeout_secs: env.positive("SUPABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_timeout_secs: env.positive("SUPABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let site_url = env.optional("SITE_URL").map(|s| s.trim_end_matches('/').to_owned());
        let secure = match env.bool("COOKIE_SECURE")? {
            Some(value) => value,
            None => !site_url.as_deref().is_some_and(|s| s.starts_with("http://")),
        };
        let max_age_secs = env.positive("COOKIE_MAX_AGE_SECS", DEFAULT_MAX_AGE.whole_seconds())?;
        let cookie = CookiePolicy {
            max_age: time::Duration::seconds(max_age_secs),
            domain: env.optional("COOKIE_DOMAIN"),
            secure,
            ..CookiePolicy::default()
        };

        let defaults = RouteTable::default();
        let protected_prefixes = match env.optional("PROTECTED_PREFIXES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            None => defaults.protected_prefixes,
        };
        let routes = RouteTable {
            login: env.optional("ROUTE_LOGIN").unwrap_or(defaults.login),
            customer_onboarding: env
                .optional("ROUTE_CUSTOMER_ONBOARDING")
                .unwrap_or(defaults.customer_onboarding),
            retailer_onboarding: env
                .optional("ROUTE_RETAILER_ONBOARDING")
                .unwrap_or(defaults.retailer_onboarding),
            customer_dashboard: env
                .optional("ROUTE_CUSTOMER_DASHBOARD")
                .unwrap_or(defaults.customer_dashboard),
            retailer_dashboard: env
                .optional("ROUTE_RETAILER_DASHBOARD")
                .unwrap_or(defaults.retailer_dashboard),
            protected_prefixes,
            site_url,
        };

        let timeout_ms = env.positive("AUTH_CHECK_TIMEOUT_MS", duration_ms(DEFAULT_CHECK_TIMEOUT))?;

        Ok(Self {
            port: env.parse("PORT", DEFAULT_PORT)?,
            supabase,
            cookie,
            check_timeout: Duration::from_millis(timeout_ms),
            routes,
            cms_sync_enabled: env.bool("CMS_SYNC_ENABLED")?.unwrap_or(true),
        })
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing { var: key })
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { var: key, value: raw }),
        }
    }

    /// Like `parse`, but zero and negative values are invalid.
    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + PartialOrd + Default,
    {
        let value = self.parse(key, default)?;
        if value > T::default() {
            return Ok(value);
        }
        Err(ConfigError::Invalid { var: key, value: self.optional(key).unwrap_or_default() })
    }

    fn bool(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        match self.optional(key) {
            None => Ok(None),
            Some(raw) => parse_bool(&raw)
                .map(Some)
                .ok_or(ConfigError::Invalid { var: key, value: raw }),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
