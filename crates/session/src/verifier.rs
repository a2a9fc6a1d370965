use std::sync::Arc;

use crate::backend::AuthBackend;

/// Authoritative server-side entitlement check.
///
/// Client-side role checks are only a fast path; this call decides. Any
/// failure counts as "not entitled".
#[derive(Clone)]
pub struct AccessVerifier {
    backend: Arc<dyn AuthBackend>,
}

impl AccessVerifier {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }

    pub async fn verify(&self) -> bool {
        match self.backend.check_admin_access().await {
            Ok(granted) => {
                if !granted {
                    tracing::info!("backend denied admin access");
                }
                granted
            }
            Err(err) => {
                tracing::warn!(error = %err, "admin access check failed; denying");
                false
            }
        }
    }
}

impl core::fmt::Debug for AccessVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessVerifier").finish_non_exhaustive()
    }
}
