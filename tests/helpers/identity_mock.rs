//! Mock identity provider and image host
//!
//! Wiremock servers speaking the `accounts:*` and upload endpoints, plus an
//! in-process provider for tests that never touch HTTP.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use ClubHub::services::{Identity, IdentityProvider};
use ClubHub::utils::errors::{ClubError, Result};

pub const TEST_API_KEY: &str = "test-api-key";

/// Mock identity provider REST server
pub struct IdentityMockServer {
    pub server: MockServer,
}

impl IdentityMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Endpoint to configure `AuthConfig::endpoint` with
    pub fn endpoint(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    pub async fn mock_password_sign_in(&self, uid: &str, email: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": uid,
                "email": email,
                "idToken": format!("token-{}", uid),
                "refreshToken": "refresh",
                "expiresIn": "3600"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_password_rejected(&self, code: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": code }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_anonymous_sign_up(&self, uid: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .and(query_param("key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": uid,
                "idToken": format!("token-{}", uid)
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_outage(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.server)
            .await;
    }
}

/// Mock image host upload endpoint
pub struct ImageHostMockServer {
    pub server: MockServer,
}

impl ImageHostMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{}/v1_1/clubhub/image/upload", self.server.uri())
    }

    pub async fn mock_upload(&self, secure_url: &str) {
        Mock::given(method("POST"))
            .and(path("/v1_1/clubhub/image/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "gallery/abc123",
                "secure_url": secure_url
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1_1/clubhub/image/upload"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}

/// In-process provider: accepts registered email/password pairs and hands
/// out sequential anonymous ids
#[derive(Default)]
pub struct StaticIdentityProvider {
    accounts: Mutex<HashMap<String, (String, String)>>,
    anonymous: Mutex<u32>,
}

impl StaticIdentityProvider {
    pub fn add_account(&self, uid: &str, email: &str, password: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (uid.to_string(), password.to_string()));
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some((uid, expected)) if expected == password => Ok(Identity {
                uid: uid.clone(),
                email: Some(email.to_string()),
                id_token: format!("token-{}", uid),
            }),
            _ => Err(ClubError::Authentication("Invalid email or password".to_string())),
        }
    }

    async fn sign_in_anonymously(&self) -> Result<Identity> {
        let mut counter = self.anonymous.lock().unwrap();
        *counter += 1;
        Ok(Identity {
            uid: format!("anon-{}", counter),
            email: None,
            id_token: format!("anon-token-{}", counter),
        })
    }
}
