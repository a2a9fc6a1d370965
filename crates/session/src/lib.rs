//! `panel-session`
//!
//! **Responsibility:** client-side session for the admin panel.
//!
//! This crate provides:
//! - Local persistence of the credential and identity snapshot
//! - The login/verify protocol against the backend API
//! - Observable session state for the view layer
//! - Route guarding on navigation
//!
//! The backend stays the authority: every session transition that grants
//! access is confirmed by a server-side entitlement check.

pub mod backend;
pub mod config;
pub mod http;
pub mod manager;
pub mod navigation;
pub mod store;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use backend::{
    AuthBackend, AuthPayload, HttpAuthBackend, LoginCredentials, RegisterData,
    ResetPasswordRequest, ResetTokenCheck,
};
pub use config::SessionConfig;
pub use http::{ApiClient, BackendError, Envelope, MessageEnvelope, RequestAuthenticator};
pub use manager::SessionManager;
pub use navigation::NavigationGate;
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, StoreError};
pub use verifier::AccessVerifier;
