use serde::Serialize;

use crate::{Identity, Role};

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    /// Backend accepted the credentials but the entitlement check failed.
    /// Transient: always followed by `Anonymous`.
    Rejected,
}

/// Observable session snapshot.
///
/// Values are only built through the constructors below, so
/// `is_authenticated` and `current_identity` always agree; consumers see a
/// whole snapshot or the next one, never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    version: u64,
    phase: SessionPhase,
    is_authenticated: bool,
    current_identity: Option<Identity>,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self {
            version: 0,
            phase: SessionPhase::Anonymous,
            is_authenticated: false,
            current_identity: None,
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            version: 0,
            phase: SessionPhase::Authenticated,
            is_authenticated: true,
            current_identity: Some(identity),
        }
    }

    pub fn rejected() -> Self {
        Self {
            phase: SessionPhase::Rejected,
            ..Self::anonymous()
        }
    }

    /// Login/refresh in flight. A session that already exists stays visible
    /// until the operation settles.
    pub fn authenticating(previous: &SessionState) -> Self {
        Self {
            phase: SessionPhase::Authenticating,
            ..previous.clone()
        }
    }

    /// Stamp this snapshot as the successor of `previous`.
    pub fn succeeding(mut self, previous: &SessionState) -> Self {
        self.version = previous.version.wrapping_add(1);
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn current_identity(&self) -> Option<&Identity> {
        self.current_identity.as_ref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.current_identity.as_ref().map(|i| &i.role)
    }

    /// Whether the session holder carries one of `roles`; used to show or
    /// hide role-restricted elements.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(role))
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::anonymous()
    }
}
