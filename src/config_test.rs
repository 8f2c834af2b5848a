use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

const REQUIRED: [(&str, &str); 2] = [("SUPABASE_URL", "https://xyz.supabase.co/"), ("SUPABASE_ANON_KEY", "anon")];

fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let map = lookup(pairs);
    AppConfig::from_lookup(|key| map.get(key).cloned())
}

fn config(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let mut map = lookup(&REQUIRED);
    map.extend(lookup(extra));
    AppConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn defaults_with_only_required_vars() {
    let cfg = config(&[]).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.supabase.url, "https://xyz.supabase.co");
    assert_eq!(cfg.supabase.anon_key, "anon");
    assert_eq!(cfg.cookie, CookiePolicy::default());
    assert_eq!(cfg.check_timeout, Duration::from_secs(5));
    assert_eq!(cfg.routes, RouteTable::default());
    assert!(cfg.cms_sync_enabled);
}

#[test]
fn missing_required_var() {
    let err = from_pairs(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "SUPABASE_ANON_KEY" });
}

#[test]
fn blank_required_var_counts_as_missing() {
    let err = from_pairs(&[("SUPABASE_URL", "  "), ("SUPABASE_ANON_KEY", "k")]).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "SUPABASE_URL" });
}

#[test]
fn invalid_number_is_reported() {
    let err = config(&[("PORT", "eighty")]).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "eighty".into() });
}

#[test]
fn zero_or_negative_durations_are_invalid() {
    for var in ["COOKIE_MAX_AGE_SECS", "AUTH_CHECK_TIMEOUT_MS", "SUPABASE_REQUEST_TIMEOUT_SECS"] {
        for raw in ["0", "-60"] {
            let err = config(&[(var, raw)]).unwrap_err();
            assert_eq!(err, ConfigError::Invalid { var, value: raw.into() }, "{var}={raw}");
        }
    }
}

#[test]
fn positive_durations_are_accepted() {
    let cfg = config(&[("COOKIE_MAX_AGE_SECS", "60"), ("AUTH_CHECK_TIMEOUT_MS", "1")]).unwrap();
    assert_eq!(cfg.cookie.max_age, time::Duration::seconds(60));
    assert_eq!(cfg.check_timeout, Duration::from_millis(1));
}

#[test]
fn invalid_bool_is_reported() {
    let err = config(&[("CMS_SYNC_ENABLED", "maybe")]).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "CMS_SYNC_ENABLED", .. }));
}

#[test]
fn bool_variants() {
    for (raw, expected) in [("1", true), ("YES", true), (" on ", true), ("0", false), ("False", false), ("off", false)] {
        assert_eq!(parse_bool(raw), Some(expected), "{raw:?}");
    }
    assert_eq!(parse_bool(""), None);
}

#[test]
fn cookie_settings() {
    let cfg = config(&[("COOKIE_DOMAIN", ".nikobathrooms.ie"), ("COOKIE_MAX_AGE_SECS", "3600")]).unwrap();
    assert_eq!(cfg.cookie.domain.as_deref(), Some(".nikobathrooms.ie"));
    assert_eq!(cfg.cookie.max_age, time::Duration::hours(1));
    assert!(cfg.cookie.secure);
}

#[test]
fn cookie_secure_inferred_from_http_site_url() {
    let cfg = config(&[("SITE_URL", "http://localhost:3000/")]).unwrap();
    assert!(!cfg.cookie.secure);
    assert_eq!(cfg.routes.site_url.as_deref(), Some("http://localhost:3000"));

    let cfg = config(&[("SITE_URL", "http://localhost:3000"), ("COOKIE_SECURE", "true")]).unwrap();
    assert!(cfg.cookie.secure);
}

#[test]
fn route_overrides() {
    let cfg = config(&[
        ("ROUTE_LOGIN", "/app/auth/log-in"),
        ("ROUTE_RETAILER_DASHBOARD", "/app/retailer/dashboard"),
        ("PROTECTED_PREFIXES", "/app/customer/, ,/app/retailer/"),
        ("AUTH_CHECK_TIMEOUT_MS", "250"),
        ("CMS_SYNC_ENABLED", "false"),
    ])
    .unwrap();
    assert_eq!(cfg.routes.login, "/app/auth/log-in");
    assert_eq!(cfg.routes.retailer_dashboard, "/app/retailer/dashboard");
    assert_eq!(cfg.routes.customer_dashboard, RouteTable::default().customer_dashboard);
    assert_eq!(cfg.routes.protected_prefixes, vec!["/app/customer/".to_owned(), "/app/retailer/".to_owned()]);
    assert_eq!(cfg.check_timeout, Duration::from_millis(250));
    assert!(!cfg.cms_sync_enabled);
}
