//! Auth state cache and page gating for the Niko Bathrooms site.
//!
//! ARCHITECTURE
//! ============
//! - `services::cache` keeps the `(token, subject_id, role)` triple in cookies
//!   and revalidates it against the identity provider, failing closed.
//! - `services::guard` memoizes that check for one page load.
//! - `services::gating` and `services::redirect` turn the outcome into what
//!   the page shows and where it sends the visitor.
//! - `routes` exposes all of it over HTTP.

pub mod config;
pub mod routes;
pub mod services;
pub mod state;
