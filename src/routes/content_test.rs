use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::FromRequestParts;
use axum::http::{Request, StatusCode, header};

use super::*;
use crate::services::identity::{Principal, Role};
use crate::state::test_helpers::{MockAccounts, MockCms, test_app_state_with};

fn request_body() -> GateRequest {
    serde_json::from_value(serde_json::json!({
        "nodes": [
            {"id": "hero", "text": "Bathrooms"},
            {"id": "price", "tag": "trade-pricing", "children": [{"id": "discount"}]},
            {"id": "wishlist", "tag": "wishlist-button"},
            {"id": "offer", "niko-role": "customer"}
        ]
    }))
    .unwrap()
}

async fn gate_page(state: AppState, path: &str, cookie: Option<&str>) -> serde_json::Value {
    let mut builder = Request::builder().uri(format!("/api/content/gate?path={path}"));
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let mut parts = builder.body(()).unwrap().into_parts().0;
    let auth = AuthGuard::from_request_parts(&mut parts, &state).await.unwrap();

    let response = gate(State(state), auth, Json(request_body())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn gated_ids(state: AppState, cookie: Option<&str>) -> (Vec<String>, serde_json::Value) {
    let body = gate_page(state, "/products", cookie).await;
    let ids = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_owned())
        .collect();
    (ids, body["report"].clone())
}

#[tokio::test]
async fn anonymous_viewer_sees_public_content_only() {
    let state = test_app_state_with(Arc::new(MockAccounts::new()), Arc::new(MockCms::default()));
    let (ids, report) = gated_ids(state, None).await;
    assert_eq!(ids, vec!["hero"]);
    assert_eq!(report["removed"], 3);
}

#[tokio::test]
async fn retailer_sees_trade_pricing() {
    let accounts = MockAccounts::new().with_token("abc", Principal::new("u1", Role::Retailer));
    let state = test_app_state_with(Arc::new(accounts), Arc::new(MockCms::default()));
    let (ids, _) = gated_ids(state, Some("c.token=abc; uid=u1; user_type=retailer")).await;
    assert_eq!(ids, vec!["hero", "price", "wishlist"]);
}

#[tokio::test]
async fn revoked_session_gates_as_unauthenticated() {
    let state = test_app_state_with(Arc::new(MockAccounts::new()), Arc::new(MockCms::default()));
    let (ids, _) = gated_ids(state, Some("c.token=abc; uid=u1; user_type=customer")).await;
    assert_eq!(ids, vec!["hero"]);
}

#[tokio::test]
async fn gate_decides_and_gates_from_one_provider_call() {
    let mut principal = Principal::new("u1", Role::Retailer);
    principal.onboarding_completed = true;
    let accounts = Arc::new(MockAccounts::new().with_token("abc", principal));
    let state = test_app_state_with(accounts.clone(), Arc::new(MockCms::default()));

    let body = gate_page(state, "/dev/app/retailer/dashboard", Some("c.token=abc; uid=u1; user_type=retailer")).await;
    assert_eq!(accounts.resolve_calls(), 1);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["id"], "u1");
    assert_eq!(body["decision"], serde_json::json!({"action": "stay"}));
    assert_eq!(body["nodes"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn gate_on_protected_page_redirects_anonymous_viewer() {
    let accounts = Arc::new(MockAccounts::new());
    let state = test_app_state_with(accounts.clone(), Arc::new(MockCms::default()));

    let body = gate_page(state, "/dev/app/retailer/dashboard", None).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["reason"], "missing");
    assert_eq!(body["decision"]["to"], "/dev/app/auth/log-in");
    assert_eq!(accounts.resolve_calls(), 0);
}
