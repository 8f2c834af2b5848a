//! Redirect decisions.
//!
//! All URLs are configuration. The only inputs are the page path, the
//! revalidation outcome and the principal's `onboarding_completed` flag.

use serde::Serialize;

use super::cache::Revalidation;
use super::identity::{Principal, Role};

/// Externally configured entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub login: String,
    pub customer_onboarding: String,
    pub retailer_onboarding: String,
    pub customer_dashboard: String,
    pub retailer_dashboard: String,
    /// Path prefixes that require a valid auth state.
    pub protected_prefixes: Vec<String>,
    /// Site origin for absolute links in emails, e.g. `https://nikobathrooms.ie`.
    pub site_url: Option<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            login: "/dev/app/auth/log-in".into(),
            customer_onboarding: "/dev/app/customer/onboarding".into(),
            retailer_onboarding: "/dev/app/retailer/onboarding".into(),
            customer_dashboard: "/dev/app/customer/dashboard".into(),
            retailer_dashboard: "/dev/app/retailer/dashboard".into(),
            protected_prefixes: vec!["/dev/app/customer/".into(), "/dev/app/retailer/".into()],
            site_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Public,
    Protected,
    Onboarding(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum Decision {
    Stay,
    Redirect(String),
}

#[cfg(test)]
impl Decision {
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Stay => None,
            Self::Redirect(to) => Some(to),
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

impl RouteTable {
    #[must_use]
    pub fn onboarding_for(&self, role: Role) -> &str {
        match role {
            Role::Customer => &self.customer_onboarding,
            Role::Retailer => &self.retailer_onboarding,
        }
    }

    #[must_use]
    pub fn dashboard_for(&self, role: Role) -> &str {
        match role {
            Role::Customer => &self.customer_dashboard,
            Role::Retailer => &self.retailer_dashboard,
        }
    }

    /// Join `path` onto the configured site origin, if any.
    #[must_use]
    pub fn absolute(&self, path: &str) -> String {
        match &self.site_url {
            Some(site) => format!("{}{path}", site.trim_end_matches('/')),
            None => path.to_owned(),
        }
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> PageKind {
        let path = normalize(path);
        for role in Role::ALL {
            if path == normalize(self.onboarding_for(role)) {
                return PageKind::Onboarding(role);
            }
        }
        let with_slash = format!("{path}/");
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| with_slash.starts_with(prefix.as_str()))
        {
            return PageKind::Protected;
        }
        PageKind::Public
    }

    /// Where a visitor to `path` should be, given their auth outcome.
    #[must_use]
    pub fn decide(&self, path: &str, outcome: &Revalidation) -> Decision {
        let kind = self.classify(path);
        if kind == PageKind::Public {
            return Decision::Stay;
        }

        let Some((principal, role)) = outcome.principal().and_then(|p| p.role.map(|r| (p, r))) else {
            return Decision::Redirect(self.login.clone());
        };

        match kind {
            PageKind::Onboarding(page_role) if page_role != role => {
                Decision::Redirect(self.onboarding_for(role).to_owned())
            }
            PageKind::Protected if !principal.onboarding_completed => {
                Decision::Redirect(self.onboarding_for(role).to_owned())
            }
            _ => Decision::Stay,
        }
    }

    /// Landing page right after a fresh sign-in or email confirmation.
    #[must_use]
    pub fn after_sign_in(&self, principal: &Principal, role: Role) -> String {
        if principal.onboarding_completed {
            self.dashboard_for(role).to_owned()
        } else {
            self.onboarding_for(role).to_owned()
        }
    }
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
