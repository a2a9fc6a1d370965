use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token data as returned by the backend under `data.authorization`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub expires_in: u64,
}

impl core::fmt::Debug for TokenData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenData")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Access token plus its expiry metadata, as persisted locally.
///
/// Only [`CredentialBundle::issue`] builds a bundle: `expires_at` is always
/// derived from the local clock at write time, never taken from the backend.
/// Timestamps are persisted as epoch milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    expires_in: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("credential has expired")]
    Expired,

    #[error("invalid credential time window (expires_at < issued_at)")]
    InvalidTimeWindow,
}

impl CredentialBundle {
    pub fn issue(token: TokenData, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(token.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let expires_at = now
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            issued_at: now,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A bundle whose `expires_at` is at or before `now` is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Deterministically validate the bundle's time window against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
        if self.expires_at < self.issued_at {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if self.is_expired(now) {
            return Err(TokenValidationError::Expired);
        }
        Ok(())
    }
}

impl core::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn token(expires_in: u64) -> TokenData {
        TokenData {
            access_token: "header.payload.signature".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in,
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn expiry_is_derived_at_issue_time() {
        let now = at(1_700_000_000_123);
        let bundle = CredentialBundle::issue(token(3600), now);

        assert_eq!(bundle.issued_at(), now);
        assert_eq!(bundle.expires_at(), at(1_700_000_000_123 + 3_600_000));
        assert!(bundle.validate(now).is_ok());
        assert_eq!(
            bundle.validate(bundle.expires_at()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn persisted_layout_uses_epoch_millis() {
        let bundle = CredentialBundle::issue(token(60), at(1_000));
        let value = serde_json::to_value(&bundle).unwrap();

        assert_eq!(value["access_token"], "header.payload.signature");
        assert_eq!(value["expires_in"], 60);
        assert_eq!(value["issued_at"], 1_000);
        assert_eq!(value["expires_at"], 61_000);
    }

    #[test]
    fn huge_lifetime_saturates() {
        let bundle = CredentialBundle::issue(token(u64::MAX), at(0));
        assert_eq!(bundle.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!bundle.is_expired(Utc::now()));
    }

    #[test]
    fn debug_output_redacts_token() {
        let bundle = CredentialBundle::issue(token(60), at(0));
        let debug = format!("{bundle:?}");
        assert!(!debug.contains("header.payload.signature"));
    }

    proptest! {
        #[test]
        fn expired_whenever_expiry_not_after_now(
            issued in 0i64..4_000_000_000_000,
            lifetime in 0u64..10_000_000,
            elapsed in 0i64..20_000_000_000,
        ) {
            let bundle = CredentialBundle::issue(token(lifetime), at(issued));
            let now = at(issued + elapsed);
            let expected = bundle.expires_at() <= now;
            prop_assert_eq!(bundle.is_expired(now), expected);
            prop_assert_eq!(bundle.validate(now).is_err(), expected);
        }

        #[test]
        fn round_trip_keeps_expiry_relation(
            issued in 0i64..4_000_000_000_000,
            lifetime in 0u64..100_000_000,
        ) {
            let bundle = CredentialBundle::issue(token(lifetime), at(issued));
            let json = serde_json::to_string(&bundle).unwrap();
            let back: CredentialBundle = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(
                back.expires_at().timestamp_millis(),
                back.issued_at().timestamp_millis() + lifetime as i64 * 1000
            );
        }
    }
}
