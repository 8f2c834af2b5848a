use super::*;
use crate::state::test_helpers::MockCms;

fn user() -> CmsUser {
    let mut principal = Principal::new("u1", Role::Retailer);
    principal.email = Some("shop@example.com".into());
    CmsUser::from_principal(&principal, Role::Retailer)
}

#[test]
fn cms_user_uses_display_name() {
    let u = user();
    assert_eq!(u.name, "shop");
    assert_eq!(u.role, Role::Retailer);
}

#[test]
fn create_payload_links_by_user_id() {
    let payload = create_user_payload(&user());
    assert_eq!(payload["user"]["id"], "u1");
    assert_eq!(payload["user"]["user_metadata"]["name"], "shop");
    assert_eq!(payload["role"], "retailer");
}

#[test]
fn onboarding_payload_marks_completed() {
    let payload = update_onboarding_payload(&user());
    assert_eq!(payload["userId"], "u1");
    assert_eq!(payload["onboardingData"]["firebaseUid"], "u1");
    assert_eq!(payload["onboardingData"]["onboardingCompleted"], true);
}

#[tokio::test]
async fn best_effort_reports_success() {
    let cms = MockCms::default();
    assert!(sync_best_effort(&cms, SyncOp::CreateUser, &user()).await);
    assert_eq!(cms.created(), vec![user()]);
}

#[tokio::test]
async fn best_effort_swallows_failure() {
    let cms = MockCms::failing();
    assert!(!sync_best_effort(&cms, SyncOp::UpdateOnboarding, &user()).await);
    assert!(cms.updated().is_empty());
}

#[tokio::test]
async fn spawned_sync_runs_detached() {
    let cms = Arc::new(MockCms::default());
    let handle = spawn_sync(cms.clone(), SyncOp::UpdateOnboarding, user());
    assert!(handle.await.unwrap());
    assert_eq!(cms.updated().len(), 1);
}

#[tokio::test]
async fn disabled_sync_is_a_successful_no_op() {
    assert!(sync_best_effort(&DisabledSync, SyncOp::CreateUser, &user()).await);
}
