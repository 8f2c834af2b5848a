//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON endpoints for the site's auth pages plus the confirmation-link
//! landing route. Each page load makes one call: `/api/content/gate` when the
//! page has gated content, `/api/auth/check` otherwise. Both revalidate once
//! and return the same auth outcome and redirect decision. Clients call
//! `/api/auth/refresh` before the access token's `expires_in` runs out.

pub mod auth;
pub mod content;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/check", get(auth::check))
        .route("/auth/confirm", get(auth::confirm))
        .route("/api/onboarding/complete", post(auth::complete_onboarding))
        .route("/api/content/gate", post(content::gate))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
