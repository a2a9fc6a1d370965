//! Route guarding on navigation.

use std::sync::Arc;

use panel_auth::{GuardOutcome, GuardPaths, RouteTable};

use crate::manager::SessionManager;

/// Consulted by the router before every navigation.
///
/// Evaluation is synchronous and reads the cached session snapshot only;
/// when a guard asks for the session to end, the gate ends it.
#[derive(Debug, Clone)]
pub struct NavigationGate {
    session: Arc<SessionManager>,
    routes: RouteTable,
}

impl NavigationGate {
    pub fn new(session: Arc<SessionManager>, routes: RouteTable) -> Self {
        Self { session, routes }
    }

    /// Gate for the admin panel routes, sharing the manager's role set.
    pub fn admin_panel(session: Arc<SessionManager>) -> Self {
        let routes = RouteTable::admin_panel(session.allowed_roles().clone(), GuardPaths::default());
        Self::new(session, routes)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn navigate(&self, target: &str) -> GuardOutcome {
        let snapshot = self.session.current();
        let outcome = self.routes.check(&snapshot, target);

        if let GuardOutcome::Deny { kind, redirect, end_session } = &outcome {
            tracing::info!(path = target, ?kind, redirect = %redirect.location(), "navigation denied");
            if *end_session {
                self.session.end_session();
            }
        }

        outcome
    }
}
