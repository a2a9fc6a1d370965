//! Outbound HTTP plumbing: every call goes through [`RequestAuthenticator`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::CredentialStore;

/// Endpoints reachable without a session; no bearer is attached to them.
pub const PUBLIC_PATHS: &[&str] = &[
    "auth/login",
    "auth/register",
    "auth/forgot-password",
    "auth/validate-reset-token",
    "auth/reset-password",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response whose envelope reports a non-success status.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// `{status, message, data}` wrapper used by every backend response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Unwrap `data` of a successful envelope.
    pub fn into_data(self) -> Result<T, BackendError> {
        if !self.is_success() {
            return Err(BackendError::Rejected(
                self.message.unwrap_or_else(|| format!("status '{}'", self.status)),
            ));
        }
        self.data
            .ok_or_else(|| BackendError::Parse("successful response carried no data".to_string()))
    }
}

/// Message-only response (password recovery endpoints, logout).
pub type MessageEnvelope = Envelope<serde_json::Value>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Attaches the stored credential to outbound requests.
///
/// Holds no state of its own and never changes the session: an expired or
/// missing credential simply means the request goes out unauthenticated.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    store: CredentialStore,
}

impl RequestAuthenticator {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Bearer token to attach for a call to `path` at `now`, if any.
    pub fn bearer_for(&self, path: &str, now: DateTime<Utc>) -> Option<String> {
        if is_public(path) {
            return None;
        }
        let bundle = self.store.load()?;
        if bundle.is_expired(now) {
            tracing::debug!(path, "stored credential expired; sending request unauthenticated");
            return None;
        }
        Some(bundle.access_token().to_string())
    }

    pub fn authorize(&self, request: RequestBuilder, path: &str) -> RequestBuilder {
        match self.bearer_for(path, Utc::now()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn is_public(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    let path = path.split('?').next().unwrap_or_default();
    PUBLIC_PATHS.contains(&path)
}

/// JSON client for the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    auth: RequestAuthenticator,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        store: CredentialStore,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth: RequestAuthenticator::new(store),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.auth
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.send(Method::GET, path, None::<&()>, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body), None).await
    }

    /// POST carrying `bearer` instead of the stored credential, for calls
    /// made on behalf of a session that has already been cleared locally.
    pub async fn post_as<B, T>(&self, path: &str, body: &B, bearer: &str) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body), Some(bearer)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body), None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.send(Method::DELETE, path, None::<&()>, None).await
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut req = self.http.request(method.clone(), &url).header(ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        let req = match bearer {
            Some(token) => req.bearer_auth(token),
            None => self.auth.authorize(req, path),
        };

        tracing::debug!(%method, path, "backend request");
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }

        resp.json().await.map_err(|e| BackendError::Parse(e.to_string()))
    }
}

fn error_message(text: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ErrorBody>(text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}
