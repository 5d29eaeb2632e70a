//! Partner webhook: POST /webhook/referrals/:referral_id

mod common;

use axum_test::TestServer;
use common::{
    create_company, create_test_server, register, register_admin, rotate_secret,
    submit_referral, with_api_key, MockNotifier, Session,
};
use miliare_core::ReferralStatus;
use miliare_server::Notice;
use serde_json::{json, Value};

struct Fixture {
    server: TestServer,
    notifier: MockNotifier,
    admin: Session,
    agent: Session,
    acme: String,
    acme_key: String,
    globex: String,
    globex_key: String,
    referral: String,
}

async fn setup() -> Fixture {
    let (server, notifier) = create_test_server();
    let admin = register_admin(&server).await;
    let agent = register(&server, "agent@example.com").await;

    let acme = create_company(&server, &admin, "Acme").await;
    let acme_key = rotate_secret(&server, &admin, &acme).await;
    let globex = create_company(&server, &admin, "Globex").await;
    let globex_key = rotate_secret(&server, &admin, &globex).await;

    let referral = submit_referral(&server, &agent, &acme).await;

    Fixture {
        server,
        notifier,
        admin,
        agent,
        acme,
        acme_key,
        globex,
        globex_key,
        referral,
    }
}

async fn referral_status(f: &Fixture) -> String {
    let response = f
        .server
        .get(&format!("/api/referrals/{}", f.referral))
        .add_cookie(f.admin.cookie())
        .await;
    let body: Value = response.json();
    body["referral"]["status"].as_str().unwrap().to_string()
}

// =============================================================================
// Success
// =============================================================================

/// Test: a valid key moves its own company's referral forward
#[tokio::test]
async fn test_valid_key_transitions_referral() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.acme_key,
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "IN_REVIEW");
    assert_eq!(body["version"], 1);

    assert_eq!(referral_status(&f).await, "IN_REVIEW");
}

/// Test: the submitter is notified of a webhook status change
#[tokio::test]
async fn test_status_change_notifies_submitter() {
    let f = setup().await;

    with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.acme_key,
    )
    .json(&json!({ "status": "REJECTED" }))
    .await;

    let notices = f.notifier.notices_for(&f.agent.principal_id);
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        Notice::StatusChanged { status: ReferralStatus::Rejected, .. }
    ));
}

/// Test: an amount in the body is assigned in the same write as PAID
#[tokio::test]
async fn test_paid_with_amount_computes_split() {
    let f = setup().await;
    let path = format!("/webhook/referrals/{}", f.referral);

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "PAID", "amount": 10000 }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = f
        .server
        .get(&format!("/api/referrals/{}", f.referral))
        .add_cookie(f.admin.cookie())
        .await;
    let body: Value = response.json();
    let split = &body["referral"]["perRoleAmounts"];
    assert_eq!(body["referral"]["amount"], 10000);
    assert_eq!(split["agent"], 4500);
    assert_eq!(split["teamLead"], 800);
    assert_eq!(split["orgLead"], 500);
    assert_eq!(split["bonusPool"], 1500);
    assert_eq!(split["contractor"], 700);
    assert_eq!(split["mrn"], 2000);
}

/// Test: a deactivated company's partner system can still update its referrals
#[tokio::test]
async fn test_inactive_company_key_still_accepted() {
    let f = setup().await;

    let response = f
        .server
        .put(&format!("/api/companies/{}/status", f.acme))
        .add_cookie(f.admin.cookie())
        .json(&json!({ "status": "INACTIVE" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.acme_key,
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;
    assert_eq!(response.status_code(), 200);
}

/// Test: the company-qualified route accepts the matching key
#[tokio::test]
async fn test_company_route_accepts_matching_key() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!(
            "/webhook/companies/{}/referrals/{}",
            f.acme, f.referral
        )),
        &f.acme_key,
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;
    assert_eq!(response.status_code(), 200);
}

// =============================================================================
// Rejections
// =============================================================================

/// Test: no key is 401
#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let f = setup().await;

    let response = f
        .server
        .post(&format!("/webhook/referrals/{}", f.referral))
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "unauthorized");
}

/// Test: an unknown key is 401
#[tokio::test]
async fn test_invalid_key_is_unauthorized() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        "mlr_not-a-real-key",
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(referral_status(&f).await, "IN_PROGRESS");
}

/// Test: credentials are checked before the body
#[tokio::test]
async fn test_bad_key_with_bad_body_is_unauthorized() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        "wrong",
    )
    .text("not json")
    .await;

    assert_eq!(response.status_code(), 401);
}

/// Test: rotating the secret retires the old one
#[tokio::test]
async fn test_rotated_key_is_rejected() {
    let f = setup().await;
    let new_key = rotate_secret(&f.server, &f.admin, &f.acme).await;
    assert_ne!(new_key, f.acme_key);

    let path = format!("/webhook/referrals/{}", f.referral);
    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;
    assert_eq!(response.status_code(), 401);

    let response = with_api_key(f.server.post(&path), &new_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;
    assert_eq!(response.status_code(), 200);
}

/// Test: an unknown status value is 400
#[tokio::test]
async fn test_invalid_status_value() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.acme_key,
    )
    .json(&json!({ "status": "DONE" }))
    .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["reason"], "invalid_status");
}

/// Test: a body without a status is 400
#[tokio::test]
async fn test_malformed_body() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.acme_key,
    )
    .json(&json!({ "state": "IN_REVIEW" }))
    .await;

    assert_eq!(response.status_code(), 400);
}

/// Test: an unknown referral is 404
#[tokio::test]
async fn test_unknown_referral_not_found() {
    let f = setup().await;

    let response = with_api_key(f.server.post("/webhook/referrals/no-such-referral"), &f.acme_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["reason"], "not_found");
}

/// Test: a valid key for another company cannot touch this referral
#[tokio::test]
async fn test_cross_company_key_forbidden() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!("/webhook/referrals/{}", f.referral)),
        &f.globex_key,
    )
    .json(&json!({ "status": "REJECTED" }))
    .await;

    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["reason"], "forbidden");
    assert_eq!(referral_status(&f).await, "IN_PROGRESS");
}

/// Test: the company-qualified route rejects another company's key
#[tokio::test]
async fn test_company_route_rejects_other_key() {
    let f = setup().await;

    let response = with_api_key(
        f.server.post(&format!(
            "/webhook/companies/{}/referrals/{}",
            f.acme, f.referral
        )),
        &f.globex_key,
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;
    assert_eq!(response.status_code(), 401);

    // Authenticated as Globex, but the referral is Acme's
    let response = with_api_key(
        f.server.post(&format!(
            "/webhook/companies/{}/referrals/{}",
            f.globex, f.referral
        )),
        &f.globex_key,
    )
    .json(&json!({ "status": "IN_REVIEW" }))
    .await;
    assert_eq!(response.status_code(), 403);
}

/// Test: state-machine violations are 409 and leave the referral unchanged
#[tokio::test]
async fn test_invalid_transition_conflict() {
    let f = setup().await;
    let path = format!("/webhook/referrals/{}", f.referral);

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "PAID", "amount": 500 }))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["reason"], "invalid_transition");

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "REJECTED" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(referral_status(&f).await, "REJECTED");
}

/// Test: PAID without an amount is 400
#[tokio::test]
async fn test_paid_without_amount() {
    let f = setup().await;
    let path = format!("/webhook/referrals/{}", f.referral);

    with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "IN_REVIEW" }))
        .await;

    let response = with_api_key(f.server.post(&path), &f.acme_key)
        .json(&json!({ "status": "PAID" }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["reason"], "missing_amount");
    assert_eq!(referral_status(&f).await, "IN_REVIEW");
}
