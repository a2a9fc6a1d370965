//! Session state machine.
//!
//! ```text
//! ANONYMOUS ──login/register──▶ AUTHENTICATING ──accepted + verified──▶ AUTHENTICATED
//!                                   │      └──accepted, not entitled──▶ REJECTED ──▶ ANONYMOUS
//!                                   └──rejected──▶ previous state
//! AUTHENTICATED ──logout / expiry / role revoked──▶ ANONYMOUS
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};

use panel_auth::{
    AllowedRoles, CredentialBundle, Identity, PANEL_ACCESS_DENIED, SessionError, SessionPhase,
    SessionResult, SessionState,
};

use crate::backend::{
    AuthBackend, AuthPayload, HttpAuthBackend, LoginCredentials, RegisterData,
    ResetPasswordRequest, ResetTokenCheck,
};
use crate::config::SessionConfig;
use crate::http::{ApiClient, BackendError, MessageEnvelope};
use crate::store::CredentialStore;
use crate::verifier::AccessVerifier;

pub const DEFAULT_LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Login,
    Register,
    Refresh,
    Profile,
    Recovery,
}

/// Owns the credential store and the observable session state.
///
/// Transition-performing operations are serialised by an internal lock;
/// readers never block on it.
pub struct SessionManager {
    store: CredentialStore,
    backend: Arc<dyn AuthBackend>,
    verifier: AccessVerifier,
    allowed: AllowedRoles,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
    logout_timeout: Duration,
}

impl SessionManager {
    /// Build the manager and seed the session from local storage only.
    pub fn new(store: CredentialStore, backend: Arc<dyn AuthBackend>, allowed: AllowedRoles) -> Self {
        let initial = match stored_identity(&store, &allowed, Utc::now()) {
            Some(identity) => {
                tracing::info!(user_id = %identity.id, role = %identity.role, "restored session from local storage");
                SessionState::authenticated(identity)
            }
            None => SessionState::anonymous(),
        };

        let (state, _) = watch::channel(initial);
        Self {
            verifier: AccessVerifier::new(backend.clone()),
            store,
            backend,
            allowed,
            state,
            op_lock: Mutex::new(()),
            logout_timeout: DEFAULT_LOGOUT_TIMEOUT,
        }
    }

    /// File-backed store and HTTP backend as described by `config`.
    pub fn from_config(config: &SessionConfig) -> anyhow::Result<Self> {
        let store = CredentialStore::open(&config.data_dir)?;
        let api = ApiClient::new(&config.api_url, config.request_timeout, store.clone())?;
        let backend = Arc::new(HttpAuthBackend::new(api));
        Ok(Self::new(store, backend, AllowedRoles::default()).with_logout_timeout(config.logout_timeout))
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn allowed_roles(&self) -> &AllowedRoles {
        &self.allowed
    }

    pub fn verifier(&self) -> &AccessVerifier {
        &self.verifier
    }

    /// Latest session snapshot.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Observe every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Local-only credential check: present, unexpired, role-eligible.
    ///
    /// An invalid credential is cleared and an authenticated session is
    /// reset, without any network call.
    pub fn has_valid_credential(&self) -> bool {
        self.has_valid_credential_at(Utc::now())
    }

    /// While a transition holds the op lock this only reports; the
    /// transition publishes its own outcome.
    pub fn has_valid_credential_at(&self, now: DateTime<Utc>) -> bool {
        let Ok(_op) = self.op_lock.try_lock() else {
            return inspect_stored(&self.store, &self.allowed, now).is_some();
        };

        let valid = stored_identity(&self.store, &self.allowed, now).is_some();
        if !valid && self.is_authenticated() {
            self.publish(SessionState::anonymous());
        }
        valid
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> SessionResult<Identity> {
        let _op = self.op_lock.lock().await;
        tracing::info!(email = %credentials.email, "login requested");

        let previous = self.begin_authenticating();
        let response = self.backend.login(credentials).await;
        self.establish(Flow::Login, response, previous).await
    }

    pub async fn register(&self, data: &RegisterData) -> SessionResult<Identity> {
        let _op = self.op_lock.lock().await;
        tracing::info!(email = %data.email, role = %data.rol, "registration requested");

        let previous = self.begin_authenticating();
        let response = self.backend.register(data).await;
        self.establish(Flow::Register, response, previous).await
    }

    /// Re-issue the credential. A refreshed token still has to pass the
    /// entitlement check.
    pub async fn refresh(&self) -> SessionResult<Identity> {
        let _op = self.op_lock.lock().await;
        if self.store.load().is_none() {
            return Err(SessionError::NotAuthenticated);
        }

        let previous = self.begin_authenticating();
        let response = self.backend.refresh().await;
        self.establish(Flow::Refresh, response, previous).await
    }

    /// End the session. Always succeeds locally.
    ///
    /// The backend is asked to invalidate the credential first (bounded by
    /// the logout timeout); its outcome is ignored. Local state is cleared
    /// even if the caller abandons this future.
    pub async fn logout(&self) {
        let _op = self.op_lock.lock().await;
        let _clear = ClearOnDrop(self);

        if let Some(token) = self.live_token() {
            invalidate(&*self.backend, &token, self.logout_timeout).await;
        }
    }

    /// Clear the session synchronously. For callers that cannot await, such
    /// as navigation guards.
    ///
    /// Only the backend invalidation of the cleared token runs in the
    /// background; it never touches local state, so a session established
    /// afterwards is unaffected.
    pub fn end_session(&self) {
        let token = self.live_token();
        self.reset();

        let Some(token) = token else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = Arc::clone(&self.backend);
                let timeout = self.logout_timeout;
                handle.spawn(async move { invalidate(&*backend, &token, timeout).await });
            }
            Err(_) => tracing::debug!("no async runtime; skipping backend logout"),
        }
    }

    /// Reload the backend profile. A role that is no longer allowed ends the
    /// session even though no logout was requested.
    pub async fn load_profile(&self) -> SessionResult<Identity> {
        let _op = self.op_lock.lock().await;
        if !self.is_authenticated() || self.store.load().is_none() {
            return Err(SessionError::NotAuthenticated);
        }

        let user = match self.backend.profile().await {
            Ok(user) => user,
            Err(err) => {
                let err = classify(Flow::Profile, err);
                if err.clears_session() {
                    self.reset();
                }
                return Err(err);
            }
        };

        let identity = Identity::from_value(&user)
            .ok_or_else(|| SessionError::network("profile response carried an incomplete user"))?;

        if !self.allowed.contains(&identity.role) {
            tracing::warn!(user_id = %identity.id, role = %identity.role, "role revoked server-side; ending session");
            self.reset();
            return Err(SessionError::access_denied(PANEL_ACCESS_DENIED));
        }

        self.remember(&identity);
        self.publish(SessionState::authenticated(identity.clone()));
        Ok(identity)
    }

    pub async fn forgot_password(&self, email: &str) -> SessionResult<MessageEnvelope> {
        recovery(self.backend.forgot_password(email).await)
    }

    pub async fn validate_reset_token(&self, check: &ResetTokenCheck) -> SessionResult<MessageEnvelope> {
        recovery(self.backend.validate_reset_token(check).await)
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> SessionResult<MessageEnvelope> {
        recovery(self.backend.reset_password(request).await)
    }

    fn begin_authenticating(&self) -> SessionState {
        let previous = self.current();
        self.publish(SessionState::authenticating(&previous));
        previous
    }

    async fn establish(
        &self,
        flow: Flow,
        response: Result<AuthPayload, BackendError>,
        previous: SessionState,
    ) -> SessionResult<Identity> {
        let payload = match response {
            Ok(payload) => payload,
            Err(err) => {
                let err = classify(flow, err);
                tracing::info!(?flow, error = %err, "authentication failed");
                if err.clears_session() {
                    self.reset();
                } else {
                    self.publish(previous);
                }
                return Err(err);
            }
        };

        let bundle = CredentialBundle::issue(payload.authorization, Utc::now());
        if let Err(err) = self.store.save(&bundle) {
            tracing::error!(error = %err, "failed to persist credential");
            self.reset();
            return Err(SessionError::LocalStorage(err.to_string()));
        }

        if !self.verifier.verify().await {
            self.reject();
            return Err(SessionError::access_denied(PANEL_ACCESS_DENIED));
        }

        let identity = panel_auth::decode(bundle.access_token())
            .or_else(|| payload.user.as_ref().and_then(Identity::from_value))
            .or_else(|| match flow {
                Flow::Refresh => previous.current_identity().cloned().or_else(|| self.store.load_identity()),
                _ => None,
            });

        let Some(identity) = identity else {
            tracing::warn!(?flow, "neither token nor response carried a usable identity");
            self.reset();
            return Err(SessionError::network("response carried no usable identity"));
        };

        if !self.allowed.contains(&identity.role) {
            tracing::warn!(user_id = %identity.id, role = %identity.role, "role not allowed in the admin panel");
            self.reject();
            return Err(SessionError::access_denied(PANEL_ACCESS_DENIED));
        }

        self.remember(&identity);
        tracing::info!(?flow, user_id = %identity.id, role = %identity.role, "session established");
        self.publish(SessionState::authenticated(identity.clone()));
        Ok(identity)
    }

    fn live_token(&self) -> Option<String> {
        self.store
            .load()
            .filter(|bundle| !bundle.is_expired(Utc::now()))
            .map(|bundle| bundle.access_token().to_string())
    }

    fn remember(&self, identity: &Identity) {
        if let Err(err) = self.store.save_identity(identity) {
            tracing::warn!(error = %err, "failed to persist identity snapshot");
        }
    }

    /// Accepted by the backend but not entitled.
    fn reject(&self) {
        self.store.clear();
        self.publish(SessionState::rejected());
        self.publish(SessionState::anonymous());
    }

    fn reset(&self) {
        self.store.clear();
        self.publish(SessionState::anonymous());
    }

    fn publish(&self, next: SessionState) {
        self.state.send_modify(|current| *current = next.succeeding(current));
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.state.borrow())
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

struct ClearOnDrop<'a>(&'a SessionManager);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

async fn invalidate(backend: &dyn AuthBackend, token: &str, timeout: Duration) {
    match tokio::time::timeout(timeout, backend.logout(token)).await {
        Ok(Ok(())) => tracing::debug!("backend session invalidated"),
        Ok(Err(err)) => tracing::warn!(error = %err, "backend logout failed; local session cleared anyway"),
        Err(_) => tracing::warn!("backend logout timed out; local session cleared anyway"),
    }
}

/// Identity of a stored, unexpired, role-eligible credential. Anything else
/// clears the store.
fn stored_identity(store: &CredentialStore, allowed: &AllowedRoles, now: DateTime<Utc>) -> Option<Identity> {
    let identity = inspect_stored(store, allowed, now);
    if identity.is_none() {
        store.clear();
    }
    identity
}

fn inspect_stored(store: &CredentialStore, allowed: &AllowedRoles, now: DateTime<Utc>) -> Option<Identity> {
    let bundle = store.load()?;

    if let Err(err) = bundle.validate(now) {
        tracing::info!(error = %err, "stored credential rejected");
        return None;
    }

    let Some(identity) = panel_auth::decode(bundle.access_token()).or_else(|| store.load_identity()) else {
        tracing::warn!("stored credential has no identity");
        return None;
    };

    if !allowed.contains(&identity.role) {
        tracing::warn!(user_id = %identity.id, role = %identity.role, "stored role not allowed");
        return None;
    }

    Some(identity)
}

fn classify(flow: Flow, err: BackendError) -> SessionError {
    let credential_flow = matches!(flow, Flow::Login | Flow::Register);
    match err {
        BackendError::Api { status: 401, message } if credential_flow => {
            SessionError::InvalidCredentials(message)
        }
        BackendError::Api { status: 401, .. } if flow != Flow::Recovery => {
            SessionError::ExpiredCredential
        }
        BackendError::Api { status: 403, message } => SessionError::AccessDenied(message),
        BackendError::Api { status: 422, message } => SessionError::Validation(message),
        BackendError::Rejected(message) if credential_flow => SessionError::InvalidCredentials(message),
        BackendError::Rejected(message) if flow == Flow::Recovery => SessionError::Validation(message),
        other => SessionError::NetworkOrServer(other.to_string()),
    }
}

fn recovery(response: Result<MessageEnvelope, BackendError>) -> SessionResult<MessageEnvelope> {
    let envelope = response.map_err(|err| classify(Flow::Recovery, err))?;
    if envelope.is_success() {
        Ok(envelope)
    } else {
        Err(SessionError::Validation(
            envelope.message.unwrap_or_else(|| format!("status '{}'", envelope.status)),
        ))
    }
}
