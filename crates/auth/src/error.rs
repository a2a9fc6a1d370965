//! Session error taxonomy.

use thiserror::Error;

/// Failure of a session operation, classified so callers can tell a bad
/// password from a missing entitlement from an unreachable backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Backend rejected the credentials. Local state is left untouched.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Authenticated, but the role/entitlement check failed. The local
    /// session is always cleared.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Backend refused the submitted data (HTTP 422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport failure or unexpected backend response. Never grants access.
    #[error("network or server failure: {0}")]
    NetworkOrServer(String),

    /// A persisted record could not be read back; treated as no session.
    #[error("malformed local state: {0}")]
    MalformedLocalState(String),

    /// The stored credential is past its expiry.
    #[error("credential has expired")]
    ExpiredCredential,

    /// The operation needs a session and there is none.
    #[error("no active session")]
    NotAuthenticated,

    /// The credential could not be persisted.
    #[error("local storage failure: {0}")]
    LocalStorage(String),
}

impl SessionError {
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkOrServer(msg.into())
    }

    /// Errors of this class end the local session.
    pub fn clears_session(&self) -> bool {
        matches!(
            self,
            SessionError::AccessDenied(_)
                | SessionError::ExpiredCredential
                | SessionError::MalformedLocalState(_)
        )
    }
}

/// Result type used by session operations.
pub type SessionResult<T> = Result<T, SessionError>;
