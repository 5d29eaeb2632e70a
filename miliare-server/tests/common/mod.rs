//! Common test utilities for server integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::RwLock;

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use miliare_core::PrincipalId;
use miliare_server::{
    routes, AppState, Config, InMemoryDataStore, InMemorySessionStore, Notice, Notifier,
};
use serde_json::{json, Value};

pub const ADMIN_EMAIL: &str = "root@miliare.test";

/// Mock notifier that captures every notice
#[derive(Default, Clone)]
pub struct MockNotifier {
    /// Captured (recipient, notice) pairs
    pub sent: Arc<RwLock<Vec<(PrincipalId, Notice)>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Notices delivered to one principal, oldest first
    pub fn notices_for(&self, principal_id: &str) -> Vec<Notice> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.as_str() == principal_id)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, recipient: &PrincipalId, notice: &Notice) -> Result<(), String> {
        self.sent
            .write()
            .unwrap()
            .push((recipient.clone(), notice.clone()));
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        ..Config::default()
    }
}

/// Create a test server with in-memory stores and a mock notifier
pub fn create_test_server() -> (TestServer, MockNotifier) {
    let notifier = MockNotifier::new();

    let state = Arc::new(AppState::new(
        InMemoryDataStore::new(),
        InMemorySessionStore::new(),
        notifier.clone(),
        test_config(),
    ));

    let app = routes::create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, notifier)
}

/// A signed-in principal
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub principal_id: String,
}

impl Session {
    pub fn cookie(&self) -> cookie::Cookie<'static> {
        cookie::Cookie::new("miliare_session", self.token.clone())
    }
}

/// Register a principal via the development endpoint; `extra` is merged into the body
pub async fn register_with(server: &TestServer, email: &str, extra: Value) -> Session {
    let mut body = json!({ "email": email });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }

    let response = server.post("/api/register").json(&body).await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let cookie = response
        .maybe_cookie("miliare_session")
        .expect("No session cookie");
    let body: Value = response.json();

    Session {
        token: cookie.value().to_string(),
        principal_id: body["principal"]["id"].as_str().unwrap().to_string(),
    }
}

pub async fn register(server: &TestServer, email: &str) -> Session {
    register_with(server, email, json!({})).await
}

/// Register the bootstrap admin
pub async fn register_admin(server: &TestServer) -> Session {
    register(server, ADMIN_EMAIL).await
}

/// Replace a principal's groups as the admin
pub async fn grant(server: &TestServer, admin: &Session, principal: &Session, groups: &[&str]) {
    let response = server
        .put(&format!("/api/principals/{}/groups", principal.principal_id))
        .add_cookie(admin.cookie())
        .json(&json!({ "groups": groups }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
}

/// Assign company and upline as the admin; `affiliation` is the request body
pub async fn affiliate(server: &TestServer, admin: &Session, principal: &Session, affiliation: Value) {
    let response = server
        .put(&format!("/api/principals/{}/affiliation", principal.principal_id))
        .add_cookie(admin.cookie())
        .json(&affiliation)
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
}

/// Company C from the commission example: 45/8/5/15/20/7
pub fn company_c_compensation() -> Value {
    json!({
        "agentBps": 4500,
        "teamLeadBps": 800,
        "orgLeadBps": 500,
        "bonusPoolBps": 1500,
        "mrnBps": 2000,
        "contractorBps": 700,
    })
}

/// Create a company as the admin and return its id
pub async fn create_company(server: &TestServer, admin: &Session, name: &str) -> String {
    let response = server
        .post("/api/companies")
        .add_cookie(admin.cookie())
        .json(&json!({
            "name": name,
            "contactEmail": format!("partners@{}.test", name.to_lowercase()),
            "compensation": company_c_compensation(),
        }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: Value = response.json();
    body["company"]["id"].as_str().unwrap().to_string()
}

/// Rotate a company's webhook secret as the admin and return the raw secret
pub async fn rotate_secret(server: &TestServer, admin: &Session, company_id: &str) -> String {
    let response = server
        .post(&format!("/api/companies/{}/webhook_secret", company_id))
        .add_cookie(admin.cookie())
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: Value = response.json();
    body["secret"].as_str().unwrap().to_string()
}

/// Submit a referral and return its id
pub async fn submit_referral(server: &TestServer, agent: &Session, company_id: &str) -> String {
    let response = server
        .post("/api/referrals")
        .add_cookie(agent.cookie())
        .json(&json!({
            "companyId": company_id,
            "clientName": "Jordan Client",
            "clientContact": "jordan@client.test",
            "approximateValue": 25000,
        }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: Value = response.json();
    body["referral"]["id"].as_str().unwrap().to_string()
}

/// Attach the webhook key header
pub fn with_api_key(request: TestRequest, key: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_str(key).unwrap(),
    )
}
