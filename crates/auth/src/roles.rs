use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role identifier as issued by the backend (`administrador`, `autor`, ...).
///
/// Roles are opaque strings at this layer; which roles may enter which part
/// of the panel is decided by [`AllowedRoles`] and the route guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMINISTRATOR: Role = Role(Cow::Borrowed("administrador"));
    pub const AUTHOR: Role = Role(Cow::Borrowed("autor"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Roles permitted to hold a session in the admin area at all.
///
/// This is the coarse gate checked on every session transition. Narrower,
/// per-route role lists are enforced by [`crate::RoleGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(BTreeSet<Role>);

impl AllowedRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// Membership check for a role that may be missing altogether.
    pub fn admits(&self, role: Option<&Role>) -> bool {
        role.is_some_and(|r| self.contains(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl Default for AllowedRoles {
    fn default() -> Self {
        Self::new([Role::ADMINISTRATOR, Role::AUTHOR])
    }
}
