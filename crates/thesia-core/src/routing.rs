//! Navigation: the two application routes, the guard in front of the protected
//! one, and a history stack that applies the guard's redirects.

use strum::IntoEnumIterator;
use tokio::sync::watch;

use crate::session_store::SessionState;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr, strum::EnumIter,
)]
pub enum Route {
    /// Public landing page with the sign-in button.
    #[strum(serialize = "/")]
    Landing,
    #[strum(serialize = "/dashboard")]
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        self.into()
    }

    /// Matches a path, ignoring any query string, fragment or trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');

        Route::iter().find(|route| route.path().trim_end_matches('/') == trimmed)
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The initial session check is still running; show a loading indicator.
    Loading,
    /// Leave the protected view. `replace` drops it from history.
    Redirect { to: Route, replace: bool },
    Render,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
    landing: Route,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            landing: Route::Landing,
        }
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&self, state: &SessionState) -> GuardDecision {
        if state.loading {
            return GuardDecision::Loading;
        }

        match state.session {
            Some(_) => GuardDecision::Render,
            None => GuardDecision::Redirect {
                to: self.landing,
                replace: true,
            },
        }
    }

    /// Waits until the session check has resolved and returns the final decision.
    ///
    /// Returns `Loading` only if the session store is dropped first.
    pub async fn wait_for_decision(
        &self,
        session: &mut watch::Receiver<SessionState>,
    ) -> GuardDecision {
        match session.wait_for(|state| !state.loading).await {
            Ok(state) => self.decide(&state),
            Err(_) => {
                log::warn!("Session store closed before the session check resolved");
                GuardDecision::Loading
            }
        }
    }
}

/// In-memory browser history. `current` is always the last entry.
#[derive(Debug, Clone)]
pub struct Router {
    history: Vec<Route>,
    guard: RouteGuard,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Route::Landing)
    }
}

impl Router {
    pub fn new(start: Route) -> Self {
        Self {
            history: vec![start],
            guard: RouteGuard::new(),
        }
    }

    pub fn current(&self) -> Route {
        self.history.last().copied().unwrap_or(Route::Landing)
    }

    pub fn history(&self) -> &[Route] {
        &self.history
    }

    pub fn push(&mut self, route: Route) {
        self.history.push(route);
    }

    pub fn replace(&mut self, route: Route) {
        match self.history.last_mut() {
            Some(current) => *current = route,
            None => self.history.push(route),
        }
    }

    /// Pops the current entry. The first entry is never popped.
    pub fn back(&mut self) -> Option<Route> {
        if self.history.len() <= 1 {
            return None;
        }
        self.history.pop();
        Some(self.current())
    }

    /// Applies the guard to the current entry, following a redirect if it issues one.
    pub fn resolve(&mut self, state: &SessionState) -> GuardDecision {
        let current = self.current();
        if !current.is_protected() {
            return GuardDecision::Render;
        }

        let decision = self.guard.decide(state);
        if let GuardDecision::Redirect { to, replace } = &decision {
            log::debug!("Redirecting from {} to {}", current, to);
            if *replace {
                self.replace(*to);
            } else {
                self.push(*to);
            }
        }
        decision
    }

    pub fn navigate(&mut self, route: Route, state: &SessionState) -> GuardDecision {
        self.push(route);
        self.resolve(state)
    }

    /// Like [`Router::navigate`], but waits out the initial session check first.
    pub async fn navigate_guarded(
        &mut self,
        route: Route,
        session: &mut watch::Receiver<SessionState>,
    ) -> GuardDecision {
        self.push(route);
        if !route.is_protected() {
            return GuardDecision::Render;
        }

        let decision = self.guard.wait_for_decision(session).await;
        if decision == GuardDecision::Loading {
            return decision;
        }
        let state = session.borrow().clone();
        self.resolve(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_session;

    fn loading() -> SessionState {
        SessionState::default()
    }

    fn signed_out() -> SessionState {
        SessionState {
            session: None,
            loading: false,
        }
    }

    fn signed_in() -> SessionState {
        SessionState {
            session: Some(sample_session("u-1")),
            loading: false,
        }
    }

    #[test]
    fn route_paths() {
        assert_eq!(Route::Landing.path(), "/");
        assert_eq!(Route::Dashboard.to_string(), "/dashboard");
        assert_eq!(Route::from_path("/dashboard/"), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/dashboard#access_token=x"), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/?code=1"), Some(Route::Landing));
        assert_eq!(Route::from_path("/settings"), None);
        for route in Route::iter() {
            assert_eq!(route.path(), route.to_string());
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert!(Route::Dashboard.is_protected());
        assert!(!Route::Landing.is_protected());
    }

    #[test]
    fn guard_waits_while_loading() {
        assert_eq!(RouteGuard::new().decide(&loading()), GuardDecision::Loading);

        let loading_with_session = SessionState {
            loading: true,
            ..signed_in()
        };
        assert_eq!(
            RouteGuard::new().decide(&loading_with_session),
            GuardDecision::Loading
        );
    }

    #[test]
    fn guard_redirects_without_session() {
        assert_eq!(
            RouteGuard::new().decide(&signed_out()),
            GuardDecision::Redirect {
                to: Route::Landing,
                replace: true
            }
        );
    }

    #[test]
    fn guard_renders_with_session() {
        assert_eq!(RouteGuard::new().decide(&signed_in()), GuardDecision::Render);
    }

    #[test]
    fn loading_performs_no_navigation() {
        let mut router = Router::new(Route::Landing);
        assert_eq!(router.navigate(Route::Dashboard, &loading()), GuardDecision::Loading);
        assert_eq!(router.history(), &[Route::Landing, Route::Dashboard]);
    }

    #[test]
    fn redirect_replaces_the_protected_entry() {
        let mut router = Router::new(Route::Landing);
        router.navigate(Route::Dashboard, &signed_out());

        assert_eq!(router.current(), Route::Landing);
        assert_eq!(router.history(), &[Route::Landing, Route::Landing]);
        router.back();
        assert_eq!(router.current(), Route::Landing);
    }

    #[test]
    fn signed_in_user_stays_on_dashboard() {
        let mut router = Router::default();
        assert_eq!(router.navigate(Route::Dashboard, &signed_in()), GuardDecision::Render);
        assert_eq!(router.current(), Route::Dashboard);
        assert_eq!(router.back(), Some(Route::Landing));
        assert_eq!(router.back(), None);
    }

    #[test]
    fn public_routes_always_render() {
        let mut router = Router::new(Route::Dashboard);
        assert_eq!(router.navigate(Route::Landing, &loading()), GuardDecision::Render);
    }

    #[tokio::test]
    async fn guarded_navigation_waits_for_session_check() {
        let (tx, mut rx) = watch::channel(SessionState::default());
        let mut router = Router::new(Route::Landing);

        let resolver = tokio::spawn(async move {
            tokio::task::yield_now().await;
            tx.send_replace(signed_out());
            tx
        });

        let decision = router.navigate_guarded(Route::Dashboard, &mut rx).await;
        let _tx = resolver.await.unwrap();

        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: Route::Landing,
                replace: true
            }
        );
        assert_eq!(router.current(), Route::Landing);
    }

    #[tokio::test]
    async fn closed_session_channel_stays_loading() {
        let (tx, mut rx) = watch::channel(SessionState::default());
        drop(tx);
        assert_eq!(
            RouteGuard::new().wait_for_decision(&mut rx).await,
            GuardDecision::Loading
        );
    }
}
