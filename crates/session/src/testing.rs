//! Scripted backend for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use panel_auth::TokenData;
use serde_json::json;

use crate::backend::{
    AuthBackend, AuthPayload, LoginCredentials, RegisterData, ResetPasswordRequest,
    ResetTokenCheck,
};
use crate::http::{BackendError, MessageEnvelope};

pub(crate) fn mint_token(id: u64, role: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": id.to_string(),
            "id": id,
            "name": format!("user-{id}"),
            "email": format!("user{id}@example.com"),
            "rol": role,
        }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("failed to encode jwt")
}

pub(crate) fn payload(access_token: String, user: Option<serde_json::Value>) -> AuthPayload {
    AuthPayload {
        authorization: TokenData {
            access_token,
            token_type: Some("bearer".to_string()),
            expires_in: 3600,
        },
        user,
    }
}

pub(crate) struct ScriptedBackend {
    auth: Result<AuthPayload, BackendError>,
    auth_delay: Option<Duration>,
    access: Result<bool, BackendError>,
    profile: Result<serde_json::Value, BackendError>,
    logout: Result<(), BackendError>,
    logout_delay: Option<Duration>,
    calls: Mutex<Vec<&'static str>>,
    logged_out: Mutex<Vec<String>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            auth: Err(BackendError::Network("not scripted".to_string())),
            auth_delay: None,
            access: Ok(true),
            profile: Err(BackendError::Network("not scripted".to_string())),
            logout: Ok(()),
            logout_delay: None,
            calls: Mutex::new(Vec::new()),
            logged_out: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedBackend {
    pub(crate) fn accepting(payload: AuthPayload) -> Self {
        Self {
            auth: Ok(payload),
            ..Self::default()
        }
    }

    pub(crate) fn failing_auth(err: BackendError) -> Self {
        Self {
            auth: Err(err),
            ..Self::default()
        }
    }

    pub(crate) fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = Some(delay);
        self
    }

    pub(crate) fn denying_access(self) -> Self {
        self.with_access(Ok(false))
    }

    pub(crate) fn with_access(mut self, access: Result<bool, BackendError>) -> Self {
        self.access = access;
        self
    }

    pub(crate) fn with_profile(mut self, profile: Result<serde_json::Value, BackendError>) -> Self {
        self.profile = profile;
        self
    }

    pub(crate) fn with_logout(mut self, logout: Result<(), BackendError>) -> Self {
        self.logout = logout;
        self
    }

    pub(crate) fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| **c == name).count()
    }

    /// Tokens passed to `logout`, in call order.
    pub(crate) fn logged_out(&self) -> Vec<String> {
        self.logged_out.lock().unwrap().clone()
    }

    async fn authenticate(&self, name: &'static str) -> Result<AuthPayload, BackendError> {
        self.record(name);
        if let Some(delay) = self.auth_delay {
            tokio::time::sleep(delay).await;
        }
        self.auth.clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn ok_message() -> MessageEnvelope {
        serde_json::from_value(json!({ "status": "success", "message": "ok" })).unwrap()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<AuthPayload, BackendError> {
        self.authenticate("login").await
    }

    async fn register(&self, _data: &RegisterData) -> Result<AuthPayload, BackendError> {
        self.authenticate("register").await
    }

    async fn refresh(&self) -> Result<AuthPayload, BackendError> {
        self.authenticate("refresh").await
    }

    async fn check_admin_access(&self) -> Result<bool, BackendError> {
        self.record("check_admin_access");
        self.access.clone()
    }

    async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        self.record("logout");
        self.logged_out.lock().unwrap().push(access_token.to_string());
        if let Some(delay) = self.logout_delay {
            tokio::time::sleep(delay).await;
        }
        self.logout.clone()
    }

    async fn profile(&self) -> Result<serde_json::Value, BackendError> {
        self.record("profile");
        self.profile.clone()
    }

    async fn forgot_password(&self, _email: &str) -> Result<MessageEnvelope, BackendError> {
        self.record("forgot_password");
        Ok(Self::ok_message())
    }

    async fn validate_reset_token(
        &self,
        _check: &ResetTokenCheck,
    ) -> Result<MessageEnvelope, BackendError> {
        self.record("validate_reset_token");
        Ok(Self::ok_message())
    }

    async fn reset_password(
        &self,
        _request: &ResetPasswordRequest,
    ) -> Result<MessageEnvelope, BackendError> {
        self.record("reset_password");
        Ok(Self::ok_message())
    }
}
