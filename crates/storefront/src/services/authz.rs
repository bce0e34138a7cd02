//! Route authorization.
//!
//! Two gates with deliberately opposite failure policies:
//!
//! - [`RoleGate`] protects admin routes. It resolves the caller's role from
//!   the `profiles` table at evaluation time and fails CLOSED: a failed,
//!   empty, or unparsable lookup denies, and an outdated lookup result is
//!   discarded rather than applied.
//! - [`anonymous_gate`] protects entry pages (login/register) from
//!   already-signed-in shoppers. It fails OPEN: while the identity is
//!   indeterminate the page renders, because showing a login form to a
//!   signed-in shopper is a nuisance, not a breach.
//!
//! The asymmetry is policy, not an accident; keep it.

use bramble_core::{Role, UserId};

use crate::db::RepositoryError;

/// Source of the server-assigned role for an identity.
///
/// Implemented by `db::profiles::ProfileRepository`; tests substitute
/// in-memory stores with fixed outcomes.
#[allow(async_fn_in_trait)]
pub trait RoleStore {
    /// Fetch the role owned by `user_id`'s profile. At most one row matches;
    /// `Ok(None)` means no profile exists for the identity.
    async fn fetch_role(&self, user_id: UserId) -> Result<Option<Role>, RepositoryError>;
}

/// What the session provider currently knows about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The provider has not finished resolving the session yet.
    pub loading: bool,
    /// The authenticated identity, if any.
    pub identity: Option<UserId>,
}

impl SessionSnapshot {
    /// A snapshot from a provider that is still resolving.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            loading: true,
            identity: None,
        }
    }

    /// A settled snapshot.
    #[must_use]
    pub const fn ready(identity: Option<UserId>) -> Self {
        Self {
            loading: false,
            identity,
        }
    }
}

/// Handle for one issued role lookup.
///
/// Carries the generation the lookup was issued under; a ticket whose
/// generation has been superseded (identity change, logout, profile
/// mutation) is dead on arrival at [`RoleGate::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupTicket {
    identity: UserId,
    generation: u64,
}

impl LookupTicket {
    /// The identity this lookup was issued for.
    #[must_use]
    pub const fn identity(&self) -> UserId {
        self.identity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Initializing,
    Unauthenticated,
    Resolving,
    Authorized(Role),
    Denied,
}

/// The gate's verdict for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Session or role resolution still in flight; render a neutral
    /// placeholder, never the protected subtree.
    Wait,
    /// No identity; send to the login page, replacing history.
    RedirectToLogin,
    /// Identity present but not privileged (or unresolvable); send to the
    /// forbidden page, replacing history.
    RedirectToForbidden,
    /// Render the protected subtree for this role.
    Render(Role),
}

/// State machine deciding whether the protected subtree may render.
///
/// Feed it session snapshots with [`observe`](Self::observe), run the role
/// lookups it requests, and hand the outcomes back through
/// [`resolve`](Self::resolve). The machine never renders early: only a
/// completed, still-current lookup that produced a privileged role reaches
/// [`Decision::Render`].
#[derive(Debug)]
pub struct RoleGate {
    state: GateState,
    /// Identity the current state refers to.
    identity: Option<UserId>,
    /// Bumped on every event that invalidates an in-flight lookup.
    generation: u64,
}

impl RoleGate {
    /// A fresh gate; no session has been observed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: GateState::Initializing,
            identity: None,
            generation: 0,
        }
    }

    /// Feed the latest session snapshot.
    ///
    /// Returns a ticket when a role lookup must be issued for the active
    /// identity. An identity change supersedes whatever lookup may still be
    /// in flight for the previous identity.
    pub fn observe(&mut self, snapshot: SessionSnapshot) -> Option<LookupTicket> {
        if snapshot.loading {
            self.state = GateState::Initializing;
            self.identity = None;
            return None;
        }

        match snapshot.identity {
            None => {
                self.generation += 1;
                self.identity = None;
                self.state = GateState::Unauthenticated;
                None
            }
            Some(identity) => {
                let settled_for_same_identity = self.identity == Some(identity)
                    && matches!(
                        self.state,
                        GateState::Resolving | GateState::Authorized(_) | GateState::Denied
                    );
                if settled_for_same_identity {
                    return None;
                }
                Some(self.issue_lookup(identity))
            }
        }
    }

    /// Invalidate the current outcome after an explicit profile mutation.
    ///
    /// Returns a fresh ticket when an identity is active; any lookup still
    /// in flight for the old generation will be discarded.
    pub fn invalidate(&mut self) -> Option<LookupTicket> {
        self.generation += 1;
        self.identity.map(|identity| {
            self.state = GateState::Resolving;
            LookupTicket {
                identity,
                generation: self.generation,
            }
        })
    }

    /// Apply a completed role lookup.
    ///
    /// Outcomes for a superseded ticket are dropped. Everything short of a
    /// privileged role denies: the plain `user` role, a missing profile,
    /// and lookup errors all land in the same place.
    pub fn resolve(
        &mut self,
        ticket: &LookupTicket,
        outcome: Result<Option<Role>, RepositoryError>,
    ) {
        if ticket.generation != self.generation {
            tracing::debug!(
                identity = %ticket.identity,
                "discarding role lookup for a superseded identity"
            );
            return;
        }

        self.state = match outcome {
            Ok(Some(role)) if role.is_privileged() => GateState::Authorized(role),
            Ok(Some(_) | None) => GateState::Denied,
            Err(e) => {
                tracing::warn!(identity = %ticket.identity, error = %e, "role lookup failed");
                GateState::Denied
            }
        };
    }

    /// The verdict for the current state.
    #[must_use]
    pub const fn decision(&self) -> Decision {
        match self.state {
            GateState::Initializing | GateState::Resolving => Decision::Wait,
            GateState::Unauthenticated => Decision::RedirectToLogin,
            GateState::Denied => Decision::RedirectToForbidden,
            GateState::Authorized(role) => Decision::Render(role),
        }
    }

    fn issue_lookup(&mut self, identity: UserId) -> LookupTicket {
        self.generation += 1;
        self.identity = Some(identity);
        self.state = GateState::Resolving;
        LookupTicket {
            identity,
            generation: self.generation,
        }
    }
}

impl Default for RoleGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one full gate evaluation against a settled snapshot.
///
/// This is what the admin route guard does per request: observe the
/// session, run the single lookup the gate asks for, and return the
/// verdict.
pub async fn authorize<S: RoleStore>(snapshot: SessionSnapshot, store: &S) -> Decision {
    let mut gate = RoleGate::new();
    if let Some(ticket) = gate.observe(snapshot) {
        let outcome = store.fetch_role(ticket.identity()).await;
        gate.resolve(&ticket, outcome);
    }
    gate.decision()
}

/// Verdict of the anonymous gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousDecision {
    /// Render the entry page.
    Render,
    /// Already signed in; go home.
    RedirectHome,
}

/// Decide whether an entry page (login/register) may render.
///
/// Fails open: only a confirmed identity is sent home.
#[must_use]
pub const fn anonymous_gate(identity: Option<UserId>) -> AnonymousDecision {
    match identity {
        Some(_) => AnonymousDecision::RedirectHome,
        None => AnonymousDecision::Render,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Role store with a scripted outcome and a call counter.
    struct ScriptedStore {
        outcome: Mutex<Result<Option<Role>, String>>,
        calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn returning(outcome: Result<Option<Role>, String>) -> Self {
            Self {
                outcome: Mutex::new(outcome),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RoleStore for ScriptedStore {
        async fn fetch_role(&self, _user_id: UserId) -> Result<Option<Role>, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .lock()
                .expect("lock")
                .clone()
                .map_err(RepositoryError::DataCorruption)
        }
    }

    fn uid(n: i32) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn admin_role_renders_without_navigation() {
        let store = ScriptedStore::returning(Ok(Some(Role::Admin)));
        let decision = authorize(SessionSnapshot::ready(Some(uid(1))), &store).await;
        assert_eq!(decision, Decision::Render(Role::Admin));
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn user_role_redirects_to_forbidden() {
        let store = ScriptedStore::returning(Ok(Some(Role::User)));
        let decision = authorize(SessionSnapshot::ready(Some(uid(1))), &store).await;
        assert_eq!(decision, Decision::RedirectToForbidden);
    }

    #[tokio::test]
    async fn missing_profile_redirects_to_forbidden_not_login() {
        let store = ScriptedStore::returning(Ok(None));
        let decision = authorize(SessionSnapshot::ready(Some(uid(1))), &store).await;
        assert_eq!(decision, Decision::RedirectToForbidden);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        let store = ScriptedStore::returning(Err("boom".to_owned()));
        let decision = authorize(SessionSnapshot::ready(Some(uid(1))), &store).await;
        assert_eq!(decision, Decision::RedirectToForbidden);
    }

    #[tokio::test]
    async fn no_identity_redirects_to_login_without_lookup() {
        let store = ScriptedStore::returning(Ok(Some(Role::Admin)));
        let decision = authorize(SessionSnapshot::ready(None), &store).await;
        assert_eq!(decision, Decision::RedirectToLogin);
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn loading_session_waits_and_issues_no_lookup() {
        let mut gate = RoleGate::new();
        assert!(gate.observe(SessionSnapshot::loading()).is_none());
        assert_eq!(gate.decision(), Decision::Wait);
    }

    #[test]
    fn resolving_never_renders_the_protected_subtree() {
        let mut gate = RoleGate::new();
        let ticket = gate.observe(SessionSnapshot::ready(Some(uid(1))));
        assert!(ticket.is_some());
        assert_eq!(gate.decision(), Decision::Wait);
    }

    #[test]
    fn identity_change_supersedes_in_flight_lookup() {
        let mut gate = RoleGate::new();
        let first = gate
            .observe(SessionSnapshot::ready(Some(uid(1))))
            .expect("lookup for first identity");
        let second = gate
            .observe(SessionSnapshot::ready(Some(uid(2))))
            .expect("lookup for second identity");

        // The stale admin verdict for identity 1 arrives late and must not
        // apply to identity 2.
        gate.resolve(&first, Ok(Some(Role::Admin)));
        assert_eq!(gate.decision(), Decision::Wait);

        gate.resolve(&second, Ok(Some(Role::User)));
        assert_eq!(gate.decision(), Decision::RedirectToForbidden);
    }

    #[test]
    fn logout_supersedes_in_flight_lookup() {
        let mut gate = RoleGate::new();
        let ticket = gate
            .observe(SessionSnapshot::ready(Some(uid(1))))
            .expect("lookup issued");
        assert!(gate.observe(SessionSnapshot::ready(None)).is_none());

        gate.resolve(&ticket, Ok(Some(Role::Admin)));
        assert_eq!(gate.decision(), Decision::RedirectToLogin);
    }

    #[test]
    fn settled_identity_is_not_refetched() {
        let mut gate = RoleGate::new();
        let ticket = gate
            .observe(SessionSnapshot::ready(Some(uid(1))))
            .expect("lookup issued");
        gate.resolve(&ticket, Ok(Some(Role::Admin)));

        assert!(gate.observe(SessionSnapshot::ready(Some(uid(1)))).is_none());
        assert_eq!(gate.decision(), Decision::Render(Role::Admin));
    }

    #[test]
    fn invalidate_reissues_lookup_and_discards_stale_outcome() {
        let mut gate = RoleGate::new();
        let ticket = gate
            .observe(SessionSnapshot::ready(Some(uid(1))))
            .expect("lookup issued");
        gate.resolve(&ticket, Ok(Some(Role::Admin)));
        assert_eq!(gate.decision(), Decision::Render(Role::Admin));

        let fresh = gate.invalidate().expect("active identity re-checks");
        assert_eq!(gate.decision(), Decision::Wait);

        // The pre-mutation ticket no longer applies.
        gate.resolve(&ticket, Ok(Some(Role::Admin)));
        assert_eq!(gate.decision(), Decision::Wait);

        gate.resolve(&fresh, Ok(None));
        assert_eq!(gate.decision(), Decision::RedirectToForbidden);
    }

    #[test]
    fn anonymous_gate_redirects_signed_in_shoppers_home() {
        assert_eq!(anonymous_gate(Some(uid(1))), AnonymousDecision::RedirectHome);
    }

    #[test]
    fn anonymous_gate_renders_for_unknown_identity() {
        assert_eq!(anonymous_gate(None), AnonymousDecision::Render);
    }
}
