//! Auth routes: login, registration, email confirmation, session refresh,
//! logout, the per-page auth check and onboarding completion.
//!
//! Every handler that touches the auth cache drains its queued `Set-Cookie`
//! writes into the response, including on failure, so evictions always reach
//! the browser.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};

use crate::services::auth::{self as auth_svc, AuthFlowError, Registration};
use crate::services::cache::{AuthCache, InvalidReason};
use crate::services::cookie_store::HeaderCookieStore;
use crate::services::guard::PageGuard;
use crate::services::identity::{AccountService, IdentityError, Principal, Role};
use crate::services::redirect::{Decision, RouteTable};
use crate::state::AppState;

// =============================================================================
// EXTRACTORS
// =============================================================================

#[derive(Deserialize)]
struct PageQuery {
    path: Option<String>,
}

/// Page path the request acts for: `?path=` when given, else the request path.
fn page_path(parts: &Parts) -> String {
    Query::<PageQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.path)
        .filter(|p| p.starts_with('/'))
        .unwrap_or_else(|| parts.uri.path().to_owned())
}

/// Cookie store over the request's `Cookie` header.
pub struct RequestCookies(pub HeaderCookieStore);

impl<S> FromRequestParts<S> for RequestCookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(HeaderCookieStore::from_headers(&parts.headers, &page_path(parts))))
    }
}

/// Page guard for the request. Nothing is checked until a handler asks.
pub struct AuthGuard {
    pub guard: PageGuard<HeaderCookieStore, dyn AccountService>,
    pub path: String,
}

impl<S> FromRequestParts<S> for AuthGuard
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let path = page_path(parts);
        let store = HeaderCookieStore::from_headers(&parts.headers, &path);
        let cache = AuthCache::new(store, app_state.config.cookie.clone());
        let guard = PageGuard::new(cache, app_state.accounts.clone(), app_state.config.check_timeout);
        Ok(Self { guard, path })
    }
}

impl AuthGuard {
    /// Consume the guard, returning its queued `Set-Cookie` values.
    #[must_use]
    pub fn into_set_cookies(self) -> Vec<String> {
        self.guard.into_cache().into_store().take_set_cookies()
    }
}

/// Attach `Set-Cookie` headers to a response.
pub(crate) fn with_cookies(set_cookies: Vec<String>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    for value in set_cookies {
        match HeaderValue::from_str(&value) {
            Ok(v) => {
                response.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => tracing::warn!(error = %e, "dropping unencodable set-cookie"),
        }
    }
    response
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub(crate) fn flow_error_to_status(err: &AuthFlowError) -> StatusCode {
    match err {
        AuthFlowError::InvalidEmail
        | AuthFlowError::WeakPassword
        | AuthFlowError::MissingField(_)
        | AuthFlowError::UnsupportedCallback(_)
        | AuthFlowError::Identity(IdentityError::Rejected(_)) => StatusCode::BAD_REQUEST,
        AuthFlowError::Identity(IdentityError::InvalidToken) => StatusCode::UNAUTHORIZED,
        AuthFlowError::UnknownRole => StatusCode::FORBIDDEN,
        AuthFlowError::Identity(_) | AuthFlowError::Cache(_) => StatusCode::BAD_GATEWAY,
    }
}

fn flow_error_response(err: &AuthFlowError) -> Response {
    let status = flow_error_to_status(err);
    let error = match err {
        AuthFlowError::Identity(IdentityError::Rejected(message)) => message.clone(),
        _ if status.is_server_error() => {
            tracing::error!(error = %err, "auth flow failed");
            "identity provider unavailable".to_owned()
        }
        _ => err.to_string(),
    };
    (status, Json(ErrorBody { error })).into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SignedInResponse {
    user_id: String,
    role: Role,
    redirect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

impl From<auth_svc::SignedIn> for SignedInResponse {
    fn from(signed_in: auth_svc::SignedIn) -> Self {
        Self {
            user_id: signed_in.principal.id,
            role: signed_in.role,
            redirect: signed_in.redirect,
            expires_in: signed_in.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
struct RedirectResponse {
    redirect: String,
}

/// `POST /api/auth/login`: password sign-in; sets the auth cookies.
pub async fn login(
    State(state): State<AppState>,
    RequestCookies(store): RequestCookies,
    Json(body): Json<LoginRequest>,
) -> Response {
    let mut cache = AuthCache::new(store, state.config.cookie.clone());
    let result =
        auth_svc::login(&mut cache, state.accounts.as_ref(), &state.config.routes, &body.email, &body.password).await;
    let cookies = cache.into_store().take_set_cookies();

    match result {
        Ok(signed_in) => with_cookies(cookies, Json(SignedInResponse::from(signed_in))),
        Err(e) => with_cookies(cookies, flow_error_response(&e)),
    }
}

/// `POST /api/auth/refresh`: trade the refresh cookie for a new session.
///
/// Any refusal evicts and answers 401; provider outages answer 502 and keep
/// the cookies.
pub async fn refresh(State(state): State<AppState>, RequestCookies(store): RequestCookies) -> Response {
    let mut cache = AuthCache::new(store, state.config.cookie.clone());
    let result = auth_svc::refresh(&mut cache, state.accounts.as_ref(), &state.config.routes).await;
    let cookies = cache.into_store().take_set_cookies();

    match result {
        Ok(signed_in) => with_cookies(cookies, Json(SignedInResponse::from(signed_in))),
        Err(e) => {
            let mut response = flow_error_response(&e);
            if response.status().is_client_error() {
                *response.status_mut() = StatusCode::UNAUTHORIZED;
            }
            with_cookies(cookies, response)
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    role: String,
}

#[derive(Debug, Serialize)]
struct RegisteredResponse {
    user_id: String,
}

/// `POST /api/auth/register`: create the account; CMS sync runs detached.
pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> Response {
    let role = match body.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorBody { error: e.to_string() })).into_response();
        }
    };
    let form = Registration { email: body.email, password: body.password, name: body.name, role };

    match auth_svc::register(state.accounts.as_ref(), state.cms.clone(), &state.config.routes, form).await {
        Ok(registered) => {
            (StatusCode::CREATED, Json(RegisteredResponse { user_id: registered.principal.id })).into_response()
        }
        Err(e) => flow_error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// `GET /auth/confirm`: email confirmation landing; redirects onward.
pub async fn confirm(
    State(state): State<AppState>,
    RequestCookies(store): RequestCookies,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    let routes = &state.config.routes;
    let mut cache = AuthCache::new(store, state.config.cookie.clone());
    let result = auth_svc::confirm_email(
        &mut cache,
        state.accounts.as_ref(),
        routes,
        query.access_token.as_deref(),
        query.refresh_token.as_deref(),
        query.kind.as_deref(),
    )
    .await;
    let cookies = cache.into_store().take_set_cookies();

    match result {
        Ok(signed_in) => with_cookies(cookies, Redirect::to(&signed_in.redirect)),
        Err(e) => {
            tracing::warn!(error = %e, "email confirmation failed");
            with_cookies(cookies, Redirect::to(&routes.login))
        }
    }
}

/// `POST /api/auth/logout`: provider sign-out, then evict.
pub async fn logout(State(state): State<AppState>, RequestCookies(store): RequestCookies) -> Response {
    let mut cache = AuthCache::new(store, state.config.cookie.clone());
    let redirect = auth_svc::logout(&mut cache, state.accounts.as_ref(), &state.config.routes).await;
    with_cookies(cache.into_store().take_set_cookies(), Json(RedirectResponse { redirect }))
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<InvalidReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Principal>,
    decision: Decision,
}

impl CheckResponse {
    /// Run the guard's one check for the page and decide where it goes.
    pub(crate) async fn for_page(routes: &RouteTable, auth: &AuthGuard) -> Self {
        let outcome = auth.guard.outcome().await;
        let decision = routes.decide(&auth.path, outcome);
        tracing::debug!(path = %auth.path, ?decision, "page checked");

        Self {
            authenticated: outcome.is_valid(),
            reason: outcome.reason(),
            user: outcome.principal().cloned(),
            decision,
        }
    }

    /// Role of a revalidated viewer; `None` for anyone else.
    pub(crate) fn role(&self) -> Option<Role> {
        self.user.as_ref().and_then(|p| p.role)
    }
}

/// `GET /api/auth/check?path=`: revalidate and decide where the page goes.
///
/// Pages that also gate content should call `POST /api/content/gate` alone;
/// its response carries these same fields.
pub async fn check(State(state): State<AppState>, auth: AuthGuard) -> Response {
    let body = CheckResponse::for_page(&state.config.routes, &auth).await;
    with_cookies(auth.into_set_cookies(), Json(body))
}

/// `POST /api/onboarding/complete`: requires a valid auth state.
pub async fn complete_onboarding(State(state): State<AppState>, auth: AuthGuard) -> Response {
    let routes = &state.config.routes;
    let entry = auth.guard.verified_entry().await;
    let Some(entry) = entry else {
        let body = ErrorBody { error: "authentication required".into() };
        return with_cookies(auth.into_set_cookies(), (StatusCode::UNAUTHORIZED, Json(body)));
    };

    let result =
        auth_svc::complete_onboarding(state.accounts.as_ref(), state.cms.clone(), routes, &entry.token, entry.role)
            .await;
    let cookies = auth.into_set_cookies();
    match result {
        Ok(done) => with_cookies(cookies, Json(RedirectResponse { redirect: done.redirect })),
        Err(e) => with_cookies(cookies, flow_error_response(&e)),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
