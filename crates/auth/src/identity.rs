use serde::{Deserialize, Deserializer, Serialize};

use crate::Role;

/// Identifier of an authenticated user as issued by the backend.
///
/// The backend emits numeric ids while tokens may carry strings; both are
/// normalised to their decimal/string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for IdentityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for IdentityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Identity of the session holder.
///
/// Produced either by decoding the access token ([`crate::claims::decode`])
/// or from the user object the backend returns next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub email: String,
    #[serde(alias = "rol")]
    pub role: Role,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub created_at: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub updated_at: String,
}

impl Identity {
    /// Lenient conversion from a backend user object.
    ///
    /// Returns `None` when the object lacks a required field, so the caller
    /// can fall back to another identity source.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let identity = Self::deserialize(value).ok()?;
        identity.is_complete().then_some(identity)
    }

    /// All required fields carry a non-empty value.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty()
            && !self.name.is_empty()
            && !self.email.is_empty()
            && !self.role.as_str().is_empty()
    }
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
