//! Pre-navigation guards.
//!
//! Guards are synchronous and pure: they read a [`SessionState`] snapshot and
//! return a decision. The only side effect a guard may request is ending the
//! session (`end_session`), which the caller carries out.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{AllowedRoles, Role, SessionState};

pub const RETURN_URL_PARAM: &str = "returnUrl";
pub const ERROR_PARAM: &str = "error";

pub const PANEL_ACCESS_DENIED: &str =
    "access denied: your role is not permitted in the admin panel";
pub const SECTION_ACCESS_DENIED: &str =
    "access denied: your role is not permitted in this section";

/// Where guards send denied navigations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPaths {
    pub login: String,
    /// Default in-area landing page for sessions lacking a sub-area role.
    pub landing: String,
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            landing: "/admin/dashboard".to_string(),
        }
    }
}

/// Redirect target produced by a denied guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub path: String,
    pub return_url: Option<String>,
    pub error: Option<String>,
}

impl Redirect {
    pub fn to_login(paths: &GuardPaths, target: &str) -> Self {
        Self {
            path: paths.login.clone(),
            return_url: Some(target.to_string()),
            error: None,
        }
    }

    pub fn with_error(path: &str, message: &str) -> Self {
        Self {
            path: path.to_string(),
            return_url: None,
            error: Some(message.to_string()),
        }
    }

    /// Render as a location with percent-encoded query parameters.
    pub fn location(&self) -> String {
        let params: Vec<String> = [
            (RETURN_URL_PARAM, self.return_url.as_deref()),
            (ERROR_PARAM, self.error.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={}", urlencoding::encode(v))))
        .collect();

        if params.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, params.join("&"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotAuthenticated,
    /// Session role missing or outside the allowed role set.
    RoleNotAllowed,
    /// Valid session, but not for this sub-area.
    RoleNotPermittedHere,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    Allow,
    Deny {
        kind: DenialKind,
        redirect: Redirect,
        /// The caller must end the session before following the redirect.
        end_session: bool,
    },
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GuardOutcome::Allow => None,
            GuardOutcome::Deny { redirect, .. } => Some(redirect),
        }
    }

    fn not_authenticated(paths: &GuardPaths, target: &str) -> Self {
        GuardOutcome::Deny {
            kind: DenialKind::NotAuthenticated,
            redirect: Redirect::to_login(paths, target),
            end_session: false,
        }
    }
}

/// A synchronous pre-navigation decision.
pub trait Guard: core::fmt::Debug + Send + Sync {
    /// Decide whether navigating to `target` may proceed.
    ///
    /// - No IO
    /// - No panics
    fn check(&self, session: &SessionState, target: &str) -> GuardOutcome;
}

/// "Is a session active and role-eligible."
#[derive(Debug, Clone)]
pub struct BaselineGuard {
    allowed: AllowedRoles,
    paths: GuardPaths,
}

impl BaselineGuard {
    pub fn new(allowed: AllowedRoles, paths: GuardPaths) -> Self {
        Self { allowed, paths }
    }
}

impl Default for BaselineGuard {
    fn default() -> Self {
        Self::new(AllowedRoles::default(), GuardPaths::default())
    }
}

impl Guard for BaselineGuard {
    fn check(&self, session: &SessionState, target: &str) -> GuardOutcome {
        if !session.is_authenticated() {
            return GuardOutcome::not_authenticated(&self.paths, target);
        }

        if self.allowed.admits(session.role()) {
            GuardOutcome::Allow
        } else {
            GuardOutcome::Deny {
                kind: DenialKind::RoleNotAllowed,
                redirect: Redirect::with_error(&self.paths.login, PANEL_ACCESS_DENIED),
                end_session: true,
            }
        }
    }
}

/// "Does the session hold one of these specific roles."
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: BTreeSet<Role>,
    paths: GuardPaths,
}

impl RoleGuard {
    pub fn new(allowed: impl IntoIterator<Item = Role>, paths: GuardPaths) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            paths,
        }
    }

    pub fn only(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self::new(allowed, GuardPaths::default())
    }

    pub fn allowed(&self) -> impl Iterator<Item = &Role> {
        self.allowed.iter()
    }
}

impl Guard for RoleGuard {
    fn check(&self, session: &SessionState, target: &str) -> GuardOutcome {
        if !session.is_authenticated() {
            return GuardOutcome::not_authenticated(&self.paths, target);
        }

        match session.role() {
            Some(role) if self.allowed.contains(role) => GuardOutcome::Allow,
            _ => GuardOutcome::Deny {
                kind: DenialKind::RoleNotPermittedHere,
                redirect: Redirect::with_error(&self.paths.landing, SECTION_ACCESS_DENIED),
                end_session: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Identity, IdentityId};

    fn session_with(role: &'static str) -> SessionState {
        SessionState::authenticated(Identity {
            id: IdentityId::from(9),
            name: "Test".into(),
            email: "test@example.com".into(),
            role: Role::from(role),
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    #[test]
    fn anonymous_is_sent_to_login_with_return_url() {
        let outcome = RoleGuard::only([Role::ADMINISTRATOR])
            .check(&SessionState::anonymous(), "/admin/usuarios");

        let GuardOutcome::Deny { kind, redirect, end_session } = outcome else {
            panic!("expected deny");
        };
        assert_eq!(kind, DenialKind::NotAuthenticated);
        assert!(!end_session);
        assert_eq!(redirect.path, "/auth/login");
        assert_eq!(redirect.return_url.as_deref(), Some("/admin/usuarios"));
        assert_eq!(redirect.location(), "/auth/login?returnUrl=%2Fadmin%2Fusuarios");
    }

    #[test]
    fn author_passes_baseline_but_not_admin_section() {
        let session = session_with("autor");

        assert!(BaselineGuard::default().check(&session, "/admin/usuarios").is_allowed());

        let outcome = RoleGuard::only([Role::ADMINISTRATOR]).check(&session, "/admin/usuarios");
        let GuardOutcome::Deny { kind, redirect, end_session } = outcome else {
            panic!("expected deny");
        };
        assert_eq!(kind, DenialKind::RoleNotPermittedHere);
        assert!(!end_session);
        assert_eq!(redirect.path, "/admin/dashboard");
        assert_eq!(redirect.error.as_deref(), Some(SECTION_ACCESS_DENIED));
    }

    #[test]
    fn baseline_ends_session_for_foreign_role() {
        let outcome = BaselineGuard::default().check(&session_with("cliente"), "/admin");

        let GuardOutcome::Deny { kind, redirect, end_session } = outcome else {
            panic!("expected deny");
        };
        assert_eq!(kind, DenialKind::RoleNotAllowed);
        assert!(end_session);
        assert_eq!(redirect.path, "/auth/login");
        assert!(redirect.return_url.is_none());
        assert!(redirect.location().starts_with("/auth/login?error=access%20denied"));
    }

    #[test]
    fn admin_passes_both() {
        let session = session_with("administrador");
        assert!(BaselineGuard::default().check(&session, "/admin").is_allowed());
        assert!(
            RoleGuard::only([Role::ADMINISTRATOR])
                .check(&session, "/admin/banners")
                .is_allowed()
        );
    }
}
