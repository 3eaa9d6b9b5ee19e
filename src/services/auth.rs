//! Authentication service implementation
//!
//! Sign-in goes through an external identity provider; the member profile
//! and role come from the users collection. Session changes are published
//! on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

use crate::config::settings::AuthConfig;
use crate::database::repositories::UserRepository;
use crate::middleware::rate_limit::SignInRateLimiter;
use crate::models::user::UserProfile;
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, Result};
use crate::utils::helpers::is_valid_email;
use crate::utils::logging::{log_api_error, log_auth_event};

/// Identity issued by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_in_anonymously(&self) -> Result<Identity>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// REST identity provider speaking the `accounts:*` endpoints
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("ClubHub/1.0")
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<Identity> {
        let url = format!("{}/accounts:{}", self.endpoint, method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log_api_error("identity", &e.to_string(), Some(method));
                if e.is_timeout() {
                    ClubError::ServiceUnavailable("Identity provider timed out".to_string())
                } else {
                    ClubError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            debug!(method, status = %status, message = %message, "Identity provider rejected request");
            return Err(ClubError::Authentication(describe_provider_error(&message)));
        }
        if !status.is_success() {
            log_api_error("identity", &status.to_string(), Some(method));
            return Err(ClubError::ServiceUnavailable(format!(
                "Identity provider returned {}",
                status
            )));
        }

        let body: SignInResponse = response.json().await?;
        Ok(Identity {
            uid: body.local_id,
            email: body.email,
            id_token: body.id_token,
        })
    }
}

fn describe_provider_error(code: &str) -> String {
    let code = code.split(':').next().unwrap_or(code).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Too many attempts, please wait a minute and try again".to_string()
        }
        "ADMIN_ONLY_OPERATION" | "OPERATION_NOT_ALLOWED" => {
            "This sign-in method is not enabled".to_string()
        }
        other => format!("Sign-in failed ({})", other),
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        self.call(
            "signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_in_anonymously(&self) -> Result<Identity> {
        self.call("signUp", json!({ "returnSecureToken": true }))
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    SignedOut,
    SignedIn(UserProfile),
}

impl AuthState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthState::SignedIn(profile) => Some(profile),
            AuthState::SignedOut => None,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    users: UserRepository,
    clock: Arc<dyn Clock>,
    limiter: Arc<SignInRateLimiter>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: UserRepository,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self {
            provider,
            users,
            clock,
            limiter: Arc::new(SignInRateLimiter::new(config.sign_in_attempts_per_minute)),
            state: Arc::new(state),
        }
    }

    /// Password sign-in. The account must have an active member profile.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ClubError::Validation(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        if password.is_empty() {
            return Err(ClubError::Validation("Password is required".to_string()));
        }
        self.limiter.check(email)?;

        let identity = match self.provider.sign_in_with_password(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                log_auth_event(None, "sign_in", false);
                return Err(e);
            }
        };

        let profile = match self.users.find_by_id(&identity.uid).await? {
            Some(profile) => profile,
            None => {
                log_auth_event(Some(&identity.uid), "sign_in", false);
                return Err(ClubError::Authentication(
                    "No member profile exists for this account".to_string(),
                ));
            }
        };
        if !profile.is_active {
            log_auth_event(Some(&profile.uid), "sign_in", false);
            return Err(ClubError::Authentication(
                "This account has been deactivated".to_string(),
            ));
        }

        log_auth_event(Some(&profile.uid), "sign_in", true);
        self.state.send_replace(AuthState::SignedIn(profile.clone()));
        Ok(profile)
    }

    /// Anonymous read-only session
    pub async fn sign_in_as_guest(&self) -> Result<UserProfile> {
        let identity = self.provider.sign_in_anonymously().await?;
        let profile = UserProfile::guest(identity.uid, self.clock.now_utc());

        log_auth_event(Some(&profile.uid), "sign_in_guest", true);
        self.state.send_replace(AuthState::SignedIn(profile.clone()));
        Ok(profile)
    }

    pub fn sign_out(&self) {
        let previous = self.state.send_replace(AuthState::SignedOut);
        if let AuthState::SignedIn(profile) = previous {
            log_auth_event(Some(&profile.uid), "sign_out", true);
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    /// Subscribe to session changes; dropping the receiver unsubscribes
    pub fn on_auth_state_changed(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}
