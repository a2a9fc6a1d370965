//! Authentication contract of the backend API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use panel_auth::{Role, TokenData};

use crate::http::{ApiClient, BackendError, Envelope, MessageEnvelope};

#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub rol: Role,
}

impl core::fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterData")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("rol", &self.rol)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetTokenCheck {
    pub token: String,
    pub email: String,
}

#[derive(Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

impl core::fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// `data` of a login/register/refresh response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthPayload {
    pub authorization: TokenData,
    /// Backend user object; kept raw so that an incomplete user does not
    /// fail the whole response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfilePayload {
    user: Option<serde_json::Value>,
}

/// Backend calls the session manager depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthPayload, BackendError>;

    async fn register(&self, data: &RegisterData) -> Result<AuthPayload, BackendError>;

    async fn refresh(&self) -> Result<AuthPayload, BackendError>;

    /// Server-side entitlement check for the currently attached credential.
    async fn check_admin_access(&self) -> Result<bool, BackendError>;

    /// Invalidate `access_token` server-side.
    async fn logout(&self, access_token: &str) -> Result<(), BackendError>;

    /// Raw user object of the current profile.
    async fn profile(&self) -> Result<serde_json::Value, BackendError>;

    async fn forgot_password(&self, email: &str) -> Result<MessageEnvelope, BackendError>;

    async fn validate_reset_token(
        &self,
        check: &ResetTokenCheck,
    ) -> Result<MessageEnvelope, BackendError>;

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageEnvelope, BackendError>;
}

/// [`AuthBackend`] over the REST API.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    api: ApiClient,
}

impl HttpAuthBackend {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthPayload, BackendError> {
        let resp: Envelope<AuthPayload> = self.api.post("auth/login", credentials).await?;
        resp.into_data()
    }

    async fn register(&self, data: &RegisterData) -> Result<AuthPayload, BackendError> {
        let resp: Envelope<AuthPayload> = self.api.post("auth/register", data).await?;
        resp.into_data()
    }

    async fn refresh(&self) -> Result<AuthPayload, BackendError> {
        let resp: Envelope<AuthPayload> =
            self.api.post("auth/refresh", &serde_json::json!({})).await?;
        resp.into_data()
    }

    async fn check_admin_access(&self) -> Result<bool, BackendError> {
        let resp: MessageEnvelope = self.api.get("auth/check-admin-access").await?;
        Ok(resp.is_success())
    }

    async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        let _: serde_json::Value = self
            .api
            .post_as("auth/logout", &serde_json::json!({}), access_token)
            .await?;
        Ok(())
    }

    async fn profile(&self) -> Result<serde_json::Value, BackendError> {
        let resp: Envelope<ProfilePayload> = self.api.get("auth/profile").await?;
        resp.into_data()?
            .user
            .ok_or_else(|| BackendError::Parse("profile response carried no user".to_string()))
    }

    async fn forgot_password(&self, email: &str) -> Result<MessageEnvelope, BackendError> {
        self.api
            .post("auth/forgot-password", &serde_json::json!({ "email": email }))
            .await
    }

    async fn validate_reset_token(
        &self,
        check: &ResetTokenCheck,
    ) -> Result<MessageEnvelope, BackendError> {
        self.api.post("auth/validate-reset-token", check).await
    }

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageEnvelope, BackendError> {
        self.api.post("auth/reset-password", request).await
    }
}
