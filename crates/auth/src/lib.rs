//! `panel-auth`: pure session/authorization boundary of the admin panel.
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! identity and credential models, token claims decoding, and the guard
//! decisions consulted before navigation.

pub mod claims;
pub mod credential;
pub mod error;
pub mod guard;
pub mod identity;
pub mod roles;
pub mod routes;
pub mod session;

pub use claims::{ClaimsError, decode, decode_claims};
pub use credential::{CredentialBundle, TokenData, TokenValidationError};
pub use error::{SessionError, SessionResult};
pub use guard::{
    BaselineGuard, DenialKind, Guard, GuardOutcome, GuardPaths, Redirect, RoleGuard,
    PANEL_ACCESS_DENIED, SECTION_ACCESS_DENIED,
};
pub use identity::{Identity, IdentityId};
pub use roles::{AllowedRoles, Role};
pub use routes::{RouteGuard, RouteTable};
pub use session::{SessionPhase, SessionState};
