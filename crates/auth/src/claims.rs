//! Identity claims embedded in a self-contained access token.
//!
//! The payload segment is read without checking the signature. The token is
//! only ever obtained from the issuing backend over an authenticated channel,
//! and the backend re-checks every request it receives; the client keeps no
//! verification key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use thiserror::Error;

use crate::{Identity, IdentityId, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not a compact JWS (expected three segments)")]
    Malformed,

    #[error("payload segment is not valid base64url")]
    Encoding,

    #[error("payload is not a JSON object: {0}")]
    Payload(String),

    #[error("required claim '{0}' is missing or empty")]
    MissingClaim(&'static str),
}

/// Raw payload shape. Every field is optional so that a missing claim is
/// reported by name instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
struct RawClaims {
    id: Option<IdentityId>,
    name: Option<String>,
    email: Option<String>,
    #[serde(alias = "role")]
    rol: Option<String>,
    created_at: Option<serde_json::Value>,
    updated_at: Option<serde_json::Value>,
}

/// Decode the identity claims of `token`, reporting why decoding failed.
pub fn decode_claims(token: &str) -> Result<Identity, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| ClaimsError::Encoding)?;

    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Payload(e.to_string()))?;

    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ClaimsError::MissingClaim("id"))?;
    let email = non_empty(raw.email).ok_or(ClaimsError::MissingClaim("email"))?;
    let name = non_empty(raw.name).ok_or(ClaimsError::MissingClaim("name"))?;
    let role = non_empty(raw.rol).ok_or(ClaimsError::MissingClaim("rol"))?;

    Ok(Identity {
        id,
        name,
        email,
        role: Role::from(role),
        created_at: timestamp_text(raw.created_at),
        updated_at: timestamp_text(raw.updated_at),
    })
}

/// Decode the identity claims of `token`.
///
/// Returns `None` on any failure; callers fall back to another identity
/// source rather than treating this as fatal.
pub fn decode(token: &str) -> Option<Identity> {
    match decode_claims(token) {
        Ok(identity) => Some(identity),
        Err(err) => {
            tracing::debug!(error = %err, "token carries no usable identity claims");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn timestamp_text(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    fn mint(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"issuer-secret"),
        )
        .expect("failed to encode jwt")
    }

    #[test]
    fn decodes_backend_token_without_key() {
        let token = mint(json!({
            "sub": "42",
            "id": 42,
            "name": "Marta",
            "email": "marta@example.com",
            "rol": "administrador",
            "created_at": "2024-01-01T00:00:00Z",
            "exp": 4_102_444_800u64
        }));

        let identity = decode(&token).unwrap();
        assert_eq!(identity.id.as_str(), "42");
        assert_eq!(identity.role, Role::ADMINISTRATOR);
        assert_eq!(identity.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(identity.updated_at, "");
    }

    #[test]
    fn missing_required_claim_is_named() {
        let token = mint(json!({ "id": 1, "name": "Marta", "rol": "autor" }));
        assert_eq!(decode_claims(&token), Err(ClaimsError::MissingClaim("email")));
        assert!(decode(&token).is_none());
    }

    #[test]
    fn accepts_role_spelling_and_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(
            br#"{"id":"u-1","name":"Leo","email":"leo@example.com","role":"autor"}"#,
        );
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig");

        let identity = decode_claims(&token).unwrap();
        assert_eq!(identity.role, Role::AUTHOR);
    }

    #[test]
    fn garbage_tokens_decode_to_none() {
        assert_eq!(decode_claims("opaque-token"), Err(ClaimsError::Malformed));
        assert_eq!(decode_claims("a.b.c.d"), Err(ClaimsError::Malformed));
        assert_eq!(decode_claims("a.!!!.c"), Err(ClaimsError::Encoding));
        assert!(matches!(
            decode_claims(&format!("a.{}.c", URL_SAFE_NO_PAD.encode(b"[1,2]"))),
            Err(ClaimsError::Payload(_))
        ));
    }
}
