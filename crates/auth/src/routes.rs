use crate::{
    AllowedRoles, BaselineGuard, Guard, GuardOutcome, GuardPaths, Role, RoleGuard, SessionState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// Guard attached to a route rule.
#[derive(Debug, Clone)]
pub enum RouteGuard {
    Baseline(BaselineGuard),
    Role(RoleGuard),
}

impl Guard for RouteGuard {
    fn check(&self, session: &SessionState, target: &str) -> GuardOutcome {
        match self {
            RouteGuard::Baseline(g) => g.check(session, target),
            RouteGuard::Role(g) => g.check(session, target),
        }
    }
}

#[derive(Debug, Clone)]
struct RouteRule {
    pattern: Vec<Segment>,
    guards: Vec<RouteGuard>,
}

impl RouteRule {
    /// A rule covers its own path and everything below it.
    fn covers(&self, path: &[&str]) -> bool {
        self.pattern.len() <= path.len()
            && self.pattern.iter().zip(path).all(|(seg, part)| match seg {
                Segment::Literal(lit) => lit == part,
                Segment::Param => !part.is_empty(),
            })
    }
}

/// Ordered mapping from navigation paths to the guards protecting them.
///
/// Rules are evaluated from the least to the most specific one covering the
/// path, so an area-wide guard runs before a section guard.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `guard` to `pattern` (e.g. `/admin/banners/editar/:id`).
    pub fn guard(mut self, pattern: &str, guard: RouteGuard) -> Self {
        let pattern = parse_pattern(pattern);
        match self.rules.iter_mut().find(|r| r.pattern == pattern) {
            Some(rule) => rule.guards.push(guard),
            None => {
                self.rules.push(RouteRule {
                    pattern,
                    guards: vec![guard],
                });
                self.rules.sort_by_key(|r| r.pattern.len());
            }
        }
        self
    }

    /// The admin panel: every page needs a role-eligible session, management
    /// sections additionally need `administrador`.
    pub fn admin_panel(allowed: AllowedRoles, paths: GuardPaths) -> Self {
        let admin_only = || RouteGuard::Role(RoleGuard::new([Role::ADMINISTRATOR], paths.clone()));

        Self::new()
            .guard("/admin", RouteGuard::Baseline(BaselineGuard::new(allowed, paths.clone())))
            .guard("/admin/usuarios", admin_only())
            .guard("/admin/configuraciones", admin_only())
            .guard("/admin/banners", admin_only())
            .guard("/admin/banners/crear", admin_only())
            .guard("/admin/banners/editar/:id", admin_only())
            .guard("/admin/register", admin_only())
    }

    /// Run every guard covering `target` in order; the first denial wins.
    pub fn check(&self, session: &SessionState, target: &str) -> GuardOutcome {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for rule in self.rules.iter().filter(|r| r.covers(&parts)) {
            for guard in &rule.guards {
                let outcome = guard.check(session, target);
                if !outcome.is_allowed() {
                    return outcome;
                }
            }
        }

        GuardOutcome::Allow
    }

    /// Whether any guard protects `target`.
    pub fn is_protected(&self, target: &str) -> bool {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.rules.iter().any(|r| r.covers(&parts))
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix(':') {
            Some(_) => Segment::Param,
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}
