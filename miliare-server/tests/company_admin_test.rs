//! Company and group administration

mod common;

use common::{
    affiliate, company_c_compensation, create_company, create_test_server, grant, register,
    register_admin, register_with, rotate_secret,
};
use serde_json::{json, Value};

/// Test: only admins create companies
#[tokio::test]
async fn test_create_company_requires_admin() {
    let (server, _) = create_test_server();
    let agent = register(&server, "agent@example.com").await;

    let response = server
        .post("/api/companies")
        .add_cookie(agent.cookie())
        .json(&json!({
            "name": "Acme",
            "contactEmail": "partners@acme.test",
            "compensation": company_c_compensation(),
        }))
        .await;

    assert_eq!(response.status_code(), 403);
}

/// Test: a new company starts active and never exposes a webhook hash
#[tokio::test]
async fn test_created_company_is_active() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let id = create_company(&server, &admin, "Acme").await;
    rotate_secret(&server, &admin, &id).await;

    let response = server
        .get(&format!("/api/companies/{}", id))
        .add_cookie(admin.cookie())
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["company"]["status"], "ACTIVE");
    assert_eq!(body["company"]["compensation"]["agentBps"], 4500);
    assert!(body["company"].get("webhookSecretHash").is_none());
}

/// Test: shares above 100% are rejected
#[tokio::test]
async fn test_compensation_over_full_share_rejected() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;

    let response = server
        .post("/api/companies")
        .add_cookie(admin.cookie())
        .json(&json!({
            "name": "Greedy",
            "contactEmail": "partners@greedy.test",
            "compensation": {
                "agentBps": 6000,
                "teamLeadBps": 2000,
                "orgLeadBps": 1000,
                "bonusPoolBps": 1000,
                "mrnBps": 500,
                "contractorBps": 0,
            },
        }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["reason"], "invalid_compensation");
    assert!(body["detail"].is_string());
}

/// Test: status toggles and rejects unknown values
#[tokio::test]
async fn test_toggle_company_status() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let id = create_company(&server, &admin, "Acme").await;
    let path = format!("/api/companies/{}/status", id);

    let response = server
        .put(&path)
        .add_cookie(admin.cookie())
        .json(&json!({ "status": "INACTIVE" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["company"]["status"], "INACTIVE");

    let response = server
        .put(&path)
        .add_cookie(admin.cookie())
        .json(&json!({ "status": "PAUSED" }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .put("/api/companies/missing/status")
        .add_cookie(admin.cookie())
        .json(&json!({ "status": "ACTIVE" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

/// Test: a company admin may rotate their own company's secret only
#[tokio::test]
async fn test_company_admin_rotates_own_secret() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let acme = create_company(&server, &admin, "Acme").await;
    let globex = create_company(&server, &admin, "Globex").await;

    let operator = register(&server, "ops@acme.test").await;
    affiliate(&server, &admin, &operator, json!({ "companyId": acme })).await;
    grant(&server, &admin, &operator, &["companyAdmin"]).await;

    let response = server
        .post(&format!("/api/companies/{}/webhook_secret", acme))
        .add_cookie(operator.cookie())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["secret"].as_str().unwrap().starts_with("mlr_"));

    let response = server
        .post(&format!("/api/companies/{}/webhook_secret", globex))
        .add_cookie(operator.cookie())
        .await;
    assert_eq!(response.status_code(), 403);
}

/// Test: any signed-in principal can list companies
#[tokio::test]
async fn test_list_companies() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    create_company(&server, &admin, "Globex").await;
    create_company(&server, &admin, "Acme").await;
    let agent = register(&server, "agent@example.com").await;

    let response = server.get("/api/companies").add_cookie(agent.cookie()).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let names: Vec<&str> = body["companies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Acme", "Globex"]);

    let response = server.get("/api/companies").await;
    assert_eq!(response.status_code(), 401);
}

// =============================================================================
// Groups
// =============================================================================

/// Test: group changes apply on the next request
#[tokio::test]
async fn test_set_groups_takes_effect() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let user = register(&server, "user@example.com").await;

    grant(&server, &admin, &user, &["teamLead", "auditor"]).await;

    let response = server.get("/api/session").add_cookie(user.cookie()).await;
    let body: Value = response.json();
    let groups = body["principal"]["groups"].as_array().unwrap();
    assert!(groups.contains(&json!("teamLead")));
    assert!(groups.contains(&json!("auditor")));
}

/// Test: only admin-equivalent principals change groups
#[tokio::test]
async fn test_set_groups_requires_admin() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let lead = register(&server, "lead@example.com").await;
    grant(&server, &admin, &lead, &["teamLead"]).await;

    let response = server
        .put(&format!("/api/principals/{}/groups", lead.principal_id))
        .add_cookie(lead.cookie())
        .json(&json!({ "groups": ["admin"] }))
        .await;
    assert_eq!(response.status_code(), 403);

    // siteAdmin is admin-equivalent for group management
    let site = register(&server, "site@example.com").await;
    grant(&server, &admin, &site, &["siteAdmin"]).await;
    let response = server
        .put(&format!("/api/principals/{}/groups", lead.principal_id))
        .add_cookie(site.cookie())
        .json(&json!({ "groups": [] }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = server
        .put("/api/principals/nobody/groups")
        .add_cookie(admin.cookie())
        .json(&json!({ "groups": ["teamLead"] }))
        .await;
    assert_eq!(response.status_code(), 404);
}

/// Test: a site admin cannot grant themselves admin
#[tokio::test]
async fn test_site_admin_cannot_self_grant_admin() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let site = register(&server, "site@example.com").await;
    grant(&server, &admin, &site, &["siteAdmin"]).await;

    let response = server
        .put(&format!("/api/principals/{}/groups", site.principal_id))
        .add_cookie(site.cookie())
        .json(&json!({ "groups": ["siteAdmin", "admin"] }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server.get("/api/session").add_cookie(site.cookie()).await;
    let body: Value = response.json();
    assert_eq!(body["principal"]["groups"], json!(["siteAdmin"]));
}

/// Test: admin membership is granted and revoked by admins only
#[tokio::test]
async fn test_admin_membership_needs_admin() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let site = register(&server, "site@example.com").await;
    grant(&server, &admin, &site, &["siteAdmin"]).await;
    let user = register(&server, "user@example.com").await;

    // A site admin neither grants admin nor strips it from an admin
    let response = server
        .put(&format!("/api/principals/{}/groups", user.principal_id))
        .add_cookie(site.cookie())
        .json(&json!({ "groups": ["admin"] }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .put(&format!("/api/principals/{}/groups", admin.principal_id))
        .add_cookie(site.cookie())
        .json(&json!({ "groups": [] }))
        .await;
    assert_eq!(response.status_code(), 403);

    // An admin grants it to someone else
    grant(&server, &admin, &user, &["admin"]).await;
    let response = server.get("/api/session").add_cookie(user.cookie()).await;
    let body: Value = response.json();
    assert_eq!(body["isAdmin"], true);
}

// =============================================================================
// Affiliation
// =============================================================================

/// Test: registration does not accept a self-declared company
#[tokio::test]
async fn test_register_ignores_company_id() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let acme = create_company(&server, &admin, "Acme").await;

    let user = register_with(
        &server,
        "ops@acme.test",
        json!({ "companyId": acme, "teamLeadId": admin.principal_id }),
    )
    .await;

    let response = server.get("/api/session").add_cookie(user.cookie()).await;
    let body: Value = response.json();
    assert!(body["principal"].get("companyId").map_or(true, Value::is_null));
    assert!(body["principal"].get("teamLeadId").map_or(true, Value::is_null));

    // Without an assigned company, companyAdmin grants nothing over Acme
    grant(&server, &admin, &user, &["companyAdmin"]).await;
    let response = server
        .post(&format!("/api/companies/{}/webhook_secret", acme))
        .add_cookie(user.cookie())
        .await;
    assert_eq!(response.status_code(), 403);
}

/// Test: admins assign company and upline
#[tokio::test]
async fn test_set_affiliation() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let acme = create_company(&server, &admin, "Acme").await;
    let lead = register(&server, "lead@example.com").await;
    let user = register(&server, "user@example.com").await;

    let response = server
        .put(&format!("/api/principals/{}/affiliation", user.principal_id))
        .add_cookie(admin.cookie())
        .json(&json!({ "companyId": acme, "teamLeadId": lead.principal_id }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["affiliation"]["companyId"], acme.as_str());

    let response = server.get("/api/session").add_cookie(user.cookie()).await;
    let body: Value = response.json();
    assert_eq!(body["principal"]["companyId"], acme.as_str());
    assert_eq!(body["principal"]["teamLeadId"], lead.principal_id.as_str());
}

/// Test: affiliation changes need an admin and existing references
#[tokio::test]
async fn test_set_affiliation_rejections() {
    let (server, _) = create_test_server();
    let admin = register_admin(&server).await;
    let acme = create_company(&server, &admin, "Acme").await;
    let user = register(&server, "user@example.com").await;

    let path = format!("/api/principals/{}/affiliation", user.principal_id);

    let response = server
        .put(&path)
        .add_cookie(user.cookie())
        .json(&json!({ "companyId": acme }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .put(&path)
        .add_cookie(admin.cookie())
        .json(&json!({ "companyId": "no-such-company" }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .put(&path)
        .add_cookie(admin.cookie())
        .json(&json!({ "teamLeadId": "nobody" }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .put(&path)
        .add_cookie(admin.cookie())
        .json(&json!({ "orgLeadId": user.principal_id }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .put("/api/principals/nobody/affiliation")
        .add_cookie(admin.cookie())
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), 404);
}
