//! Content gating route.

use axum::extract::State;
use axum::response::{Json, Response};
use serde::{Deserialize, Serialize};

use super::auth::{AuthGuard, CheckResponse, with_cookies};
use crate::services::gating::{ContentNode, GatingReport};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GateRequest {
    #[serde(default)]
    nodes: Vec<ContentNode>,
}

#[derive(Debug, Serialize)]
struct GateResponse {
    #[serde(flatten)]
    auth: CheckResponse,
    nodes: Vec<ContentNode>,
    report: GatingReport,
}

/// `POST /api/content/gate?path=`: the per-page entry point.
///
/// Revalidates once, decides the page's redirect and strips content the
/// viewer may not see, all from the same outcome. The role comes from a
/// revalidated auth state only; an invalid or missing state gates as
/// unauthenticated.
pub async fn gate(State(state): State<AppState>, auth: AuthGuard, Json(body): Json<GateRequest>) -> Response {
    let check = CheckResponse::for_page(&state.config.routes, &auth).await;
    let mut nodes = body.nodes;
    let report = state.policy.apply(&mut nodes, check.role());
    with_cookies(auth.into_set_cookies(), Json(GateResponse { auth: check, nodes, report }))
}

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;
