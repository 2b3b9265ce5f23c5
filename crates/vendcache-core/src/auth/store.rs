//! Session state machine: the single source of truth for "who is logged in".
//!
//! Transitions are serialized through two layers. A `std` mutex guards the
//! in-memory state and is never held across an await. A tokio mutex (the
//! settle gate) serializes attempt settlements, which do storage I/O.
//! Overlapping attempts carry tickets; a settlement applies only while its
//! ticket is the most recently issued, so a slow login can never clobber a
//! newer login or logout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, LoginResponse};

use super::error::AuthError;
use super::events::{ListenerSet, SessionEvent};
use super::repository::PersistedSessionRepository;
use super::session::{PersistedSessionRecord, Session, SessionId, SessionSnapshot};

/// Where the store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initial phase, before bootstrap has reconciled storage.
    Restoring,
    Unauthenticated,
    /// A login attempt is in flight.
    Authenticating,
    Authenticated,
    LoggingOut,
}

/// Network side of authentication, behind a closed set of backends so the
/// state machine can be driven without a server in tests.
#[derive(Clone)]
pub(crate) enum AuthBackend {
    Api(ApiClient),
    #[cfg(test)]
    Mock(mock::MockAuthBackend),
}

impl AuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        match self {
            AuthBackend::Api(client) => {
                client.login(email, password).await.map_err(AuthError::from)
            }
            #[cfg(test)]
            AuthBackend::Mock(mock) => mock.login(email, password).await,
        }
    }

    async fn logout_remote(&self, token: Option<String>) -> Result<(), ApiError> {
        match self {
            AuthBackend::Api(client) => match token {
                Some(token) => client.logout_with_token(&token).await,
                None => Ok(()),
            },
            #[cfg(test)]
            AuthBackend::Mock(mock) => mock.logout(token).await,
        }
    }
}

struct Inner {
    phase: SessionPhase,
    session: Option<Session>,
    /// Counts emitted transitions. Listeners have run exactly this many
    /// times.
    epoch: u64,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    /// Serializes attempt settlements: the commit-or-revert plus its
    /// storage writes run as one unit per attempt.
    settle_gate: tokio::sync::Mutex<()>,
    /// Most recently issued attempt ticket. Issuing never blocks; checking
    /// happens at settle time.
    latest_attempt: AtomicU64,
    listeners: ListenerSet,
    repository: PersistedSessionRepository,
    backend: AuthBackend,
}

impl SessionStore {
    pub fn new(client: ApiClient, repository: PersistedSessionRepository) -> Self {
        Self::with_backend(AuthBackend::Api(client), repository)
    }

    pub(crate) fn with_backend(
        backend: AuthBackend,
        repository: PersistedSessionRepository,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: SessionPhase::Restoring,
                session: None,
                epoch: 0,
            }),
            settle_gate: tokio::sync::Mutex::new(()),
            latest_attempt: AtomicU64::new(0),
            listeners: ListenerSet::new(),
            repository,
            backend,
        }
    }

    /// Register a transition listener. Listeners run synchronously inside
    /// the transition critical section, in registration order, and must not
    /// call back into the store.
    pub fn on_transition(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.listeners.subscribe(listener);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().unwrap();
        SessionSnapshot {
            is_authenticated: inner.phase == SessionPhase::Authenticated
                && inner.session.is_some(),
            is_loading: matches!(
                inner.phase,
                SessionPhase::Restoring | SessionPhase::Authenticating | SessionPhase::LoggingOut
            ),
            session: inner.session.clone(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock().unwrap().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.phase == SessionPhase::Authenticated && inner.session.is_some()
    }

    /// Run `f` under the state lock, with the current session and epoch.
    /// Lets callers pair this state with other shared state atomically.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(Option<&Session>, u64) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(inner.session.as_ref(), inner.epoch)
    }

    #[cfg(test)]
    pub(crate) fn epoch(&self) -> u64 {
        self.inner.lock().unwrap().epoch
    }

    /// Reconcile persisted state into the store. Runs once at bootstrap,
    /// before any consumer; emits no events because nothing can have been
    /// cached yet.
    pub async fn restore(&self) {
        if let Some(record) = self.repository.load().await {
            if self.repository.validate(record.session_id).await {
                let session: Session = record.into();
                let user_id = session.user_id;
                let session_id = session.session_id;
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.session = Some(session);
                    inner.phase = SessionPhase::Authenticated;
                }
                info!(user_id, %session_id, "Session restored from storage");
                return;
            }
            warn!("Stored session failed marker validation; discarding");
        }
        self.repository.clear().await;
        let mut inner = self.inner.lock().unwrap();
        inner.phase = SessionPhase::Unauthenticated;
    }

    /// Authenticate against the backend and commit the resulting session.
    ///
    /// Any existing session is dropped (with a `Cleared` transition) before
    /// the network call, so a crash mid-attempt cannot resurrect the old
    /// identity. If a newer login or logout starts while this attempt is in
    /// flight, this attempt's outcome is discarded and the caller gets
    /// [`AuthError::Superseded`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let ticket = self.issue_ticket();

        {
            let _settle = self.settle_gate.lock().await;
            let had_session = {
                let mut inner = self.inner.lock().unwrap();
                let had = inner.session.is_some();
                if had {
                    self.clear_locked(&mut inner, SessionPhase::Authenticating);
                } else {
                    inner.phase = SessionPhase::Authenticating;
                }
                had
            };
            if had_session {
                self.repository.clear().await;
            }
        }

        let outcome = self.backend.login(email, password).await;

        let _settle = self.settle_gate.lock().await;
        match outcome {
            Ok(response) => {
                let session = {
                    let mut inner = self.inner.lock().unwrap();
                    if !self.is_latest(ticket) {
                        debug!(ticket, "Discarding superseded login success");
                        return Err(AuthError::Superseded);
                    }
                    let session = Session {
                        user_id: response.user_id,
                        display_name: response.display_name,
                        token: response.token,
                        selected_entity: response.selected_entity,
                        session_id: SessionId::fresh(),
                        issued_at: Utc::now(),
                    };
                    self.commit_locked(&mut inner, session.clone());
                    session
                };
                self.repository
                    .save(&PersistedSessionRecord::from(&session))
                    .await;
                info!(user_id = session.user_id, session_id = %session.session_id, "Login committed");
                Ok(session)
            }
            Err(error) => {
                {
                    let mut inner = self.inner.lock().unwrap();
                    if !self.is_latest(ticket) {
                        debug!(ticket, "Discarding superseded login failure");
                        return Err(AuthError::Superseded);
                    }
                    inner.phase = SessionPhase::Unauthenticated;
                }
                warn!(error = %error, "Login failed");
                Err(error)
            }
        }
    }

    /// Drop the session. Always succeeds locally: the server call is spawned
    /// fire-and-forget and its outcome only logged.
    pub async fn logout(&self) {
        let ticket = self.issue_ticket();

        let token = {
            let mut inner = self.inner.lock().unwrap();
            inner.phase = SessionPhase::LoggingOut;
            inner.session.as_ref().map(|s| s.token.clone())
        };

        let backend = self.backend.clone();
        tokio::spawn(async move {
            match backend.logout_remote(token).await {
                Ok(()) => debug!("Remote logout acknowledged"),
                Err(e) => debug!(error = %e, "Remote logout failed; local state already cleared"),
            }
        });

        let _settle = self.settle_gate.lock().await;
        if !self.is_latest(ticket) {
            // A newer attempt owns the state now; it has already cleared the
            // session or will before it settles.
            debug!(ticket, "Logout superseded by a newer attempt");
            return;
        }
        self.repository.clear().await;
        {
            let mut inner = self.inner.lock().unwrap();
            self.clear_locked(&mut inner, SessionPhase::Unauthenticated);
        }
        info!("Logout complete");
    }

    fn issue_ticket(&self) -> u64 {
        self.latest_attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest_attempt.load(Ordering::SeqCst) == ticket
    }

    fn commit_locked(&self, inner: &mut Inner, session: Session) {
        inner.session = Some(session.clone());
        inner.phase = SessionPhase::Authenticated;
        inner.epoch += 1;
        self.listeners.emit(&SessionEvent::Committed(session));
    }

    fn clear_locked(&self, inner: &mut Inner, next_phase: SessionPhase) {
        inner.session = None;
        inner.phase = next_phase;
        inner.epoch += 1;
        self.listeners.emit(&SessionEvent::Cleared);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use crate::api::{ApiError, LoginResponse};
    use crate::auth::error::AuthError;

    struct LoginPlan {
        gate: Option<oneshot::Receiver<()>>,
        outcome: Result<LoginResponse, AuthError>,
    }

    /// Scripted auth backend. Each `login` call consumes the next planned
    /// outcome, optionally parked until the test releases its gate.
    #[derive(Clone, Default)]
    pub(crate) struct MockAuthBackend {
        inner: Arc<MockInner>,
    }

    #[derive(Default)]
    struct MockInner {
        plans: Mutex<VecDeque<LoginPlan>>,
        logout_tokens: Mutex<Vec<Option<String>>>,
    }

    impl MockAuthBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn plan_login(&self, outcome: Result<LoginResponse, AuthError>) {
            self.inner
                .plans
                .lock()
                .unwrap()
                .push_back(LoginPlan { gate: None, outcome });
        }

        /// Plan a login that parks until the returned sender fires.
        pub fn plan_gated_login(
            &self,
            outcome: Result<LoginResponse, AuthError>,
        ) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.inner.plans.lock().unwrap().push_back(LoginPlan {
                gate: Some(rx),
                outcome,
            });
            tx
        }

        pub async fn login(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<LoginResponse, AuthError> {
            let plan = self
                .inner
                .plans
                .lock()
                .unwrap()
                .pop_front()
                .expect("no login outcome planned");
            if let Some(gate) = plan.gate {
                let _ = gate.await;
            }
            plan.outcome
        }

        pub async fn logout(&self, token: Option<String>) -> Result<(), ApiError> {
            self.inner.logout_tokens.lock().unwrap().push(token);
            Ok(())
        }

        pub fn logout_tokens(&self) -> Vec<Option<String>> {
            self.inner.logout_tokens.lock().unwrap().clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::storage::{MemoryStore, StorageBackend};

    use super::mock::MockAuthBackend;
    use super::*;

    type EventLog = Arc<Mutex<Vec<String>>>;

    fn login_ok(token: &str) -> Result<LoginResponse, AuthError> {
        Ok(LoginResponse {
            user_id: 4417,
            display_name: "Arda Demir".to_string(),
            token: token.to_string(),
            selected_entity: None,
        })
    }

    fn bare_store(mem: &MemoryStore, mock: &MockAuthBackend) -> (Arc<SessionStore>, EventLog) {
        let store = Arc::new(SessionStore::with_backend(
            AuthBackend::Mock(mock.clone()),
            PersistedSessionRepository::new(StorageBackend::Memory(mem.clone())),
        ));
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            store.on_transition(move |event| {
                let label = match event {
                    SessionEvent::Committed(session) => format!("committed:{}", session.token),
                    SessionEvent::Cleared => "cleared".to_string(),
                };
                events.lock().unwrap().push(label);
            });
        }
        (store, events)
    }

    async fn fresh_store() -> (MemoryStore, MockAuthBackend, Arc<SessionStore>, EventLog) {
        let mem = MemoryStore::new();
        let mock = MockAuthBackend::new();
        let (store, events) = bare_store(&mem, &mock);
        store.restore().await;
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
        (mem, mock, store, events)
    }

    /// Let spawned tasks run up to their next pending await.
    async fn drain_tasks() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn persisted_record(mem: &MemoryStore) -> Option<PersistedSessionRecord> {
        let json = mem.get("auth_data").unwrap()?;
        serde_json::from_str(&json).ok()
    }

    #[tokio::test]
    async fn test_login_success_commits_and_persists() {
        let (mem, mock, store, events) = fresh_store().await;
        mock.plan_login(login_ok("tok-1"));

        let session = store.login("arda@example.com", "pw").await.unwrap();
        assert_eq!(session.token, "tok-1");

        let snapshot = store.snapshot();
        assert!(snapshot.is_authenticated);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.session.unwrap().session_id, session.session_id);

        // Durable mirror matches the committed session, marker included
        let record = persisted_record(&mem).expect("record persisted");
        assert_eq!(record.session_id, session.session_id);
        assert_eq!(record.token, "tok-1");
        assert_eq!(
            mem.get("session_id").unwrap().as_deref(),
            Some(session.session_id.to_string().as_str())
        );

        assert_eq!(*events.lock().unwrap(), vec!["committed:tok-1"]);
    }

    #[tokio::test]
    async fn test_login_failure_reverts_and_writes_nothing() {
        let (mem, mock, store, events) = fresh_store().await;
        mock.plan_login(Err(AuthError::InvalidCredentials));

        let err = store.login("arda@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let snapshot = store.snapshot();
        assert!(!snapshot.is_authenticated);
        assert!(!snapshot.is_loading);
        assert!(snapshot.session.is_none());

        assert_eq!(mem.get("auth_data").unwrap(), None);
        assert_eq!(mem.get("session_id").unwrap(), None);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relogin_clears_previous_session_first() {
        let (mem, mock, store, events) = fresh_store().await;
        mock.plan_login(login_ok("tok-1"));
        mock.plan_login(login_ok("tok-2"));

        let first = store.login("arda@example.com", "pw").await.unwrap();
        let second = store.login("arda@example.com", "pw").await.unwrap();
        assert!(second.session_id > first.session_id);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["committed:tok-1", "cleared", "committed:tok-2"]
        );
        assert_eq!(persisted_record(&mem).unwrap().token, "tok-2");
    }

    #[tokio::test]
    async fn test_relogin_failure_leaves_fully_logged_out() {
        let (mem, mock, store, events) = fresh_store().await;
        mock.plan_login(login_ok("tok-1"));
        mock.plan_login(Err(AuthError::InvalidCredentials));

        store.login("arda@example.com", "pw").await.unwrap();
        let err = store.login("arda@example.com", "typo").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        // The old identity was dropped before the attempt went out
        assert!(!store.snapshot().is_authenticated);
        assert_eq!(mem.get("auth_data").unwrap(), None);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["committed:tok-1", "cleared"]
        );
    }

    #[tokio::test]
    async fn test_logout_clears_state_storage_and_notifies() {
        let (mem, mock, store, events) = fresh_store().await;
        mock.plan_login(login_ok("tok-1"));
        store.login("arda@example.com", "pw").await.unwrap();

        store.logout().await;

        let snapshot = store.snapshot();
        assert!(!snapshot.is_authenticated);
        assert!(!snapshot.is_loading);
        assert!(snapshot.session.is_none());
        assert_eq!(mem.get("auth_data").unwrap(), None);
        assert_eq!(mem.get("session_id").unwrap(), None);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["committed:tok-1", "cleared"]
        );

        // The spawned remote call carried the old token
        drain_tasks().await;
        assert_eq!(mock.logout_tokens(), vec![Some("tok-1".to_string())]);
    }

    #[tokio::test]
    async fn test_logout_when_logged_out_is_harmless() {
        let (mem, mock, store, _) = fresh_store().await;

        store.logout().await;

        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
        assert_eq!(mem.get("auth_data").unwrap(), None);
        drain_tasks().await;
        assert_eq!(mock.logout_tokens(), vec![None]);
    }

    #[tokio::test]
    async fn test_restore_accepts_valid_record_without_events() {
        let mem = MemoryStore::new();
        let mock = MockAuthBackend::new();

        // Leave a valid record behind via a real login on a first store
        let (first, _) = bare_store(&mem, &mock);
        first.restore().await;
        mock.plan_login(login_ok("tok-1"));
        let session = first.login("arda@example.com", "pw").await.unwrap();

        let (second, events) = bare_store(&mem, &mock);
        assert_eq!(second.phase(), SessionPhase::Restoring);
        assert!(second.snapshot().is_loading);
        second.restore().await;

        let snapshot = second.snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.session.unwrap().session_id, session.session_id);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejects_tampered_marker() {
        let mem = MemoryStore::new();
        let mock = MockAuthBackend::new();
        let (first, _) = bare_store(&mem, &mock);
        first.restore().await;
        mock.plan_login(login_ok("tok-1"));
        first.login("arda@example.com", "pw").await.unwrap();

        // Simulate a partial write: marker no longer matches the record
        mem.set("session_id", "1").unwrap();

        let (second, events) = bare_store(&mem, &mock);
        second.restore().await;

        assert_eq!(second.phase(), SessionPhase::Unauthenticated);
        assert!(second.snapshot().session.is_none());
        // Leftover keys are cleaned up
        assert_eq!(mem.get("auth_data").unwrap(), None);
        assert_eq!(mem.get("session_id").unwrap(), None);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejects_corrupt_record() {
        let mem = MemoryStore::new();
        mem.set("auth_data", "{definitely not json").unwrap();
        mem.set("session_id", "1700000000000").unwrap();

        let mock = MockAuthBackend::new();
        let (store, _) = bare_store(&mem, &mock);
        store.restore().await;

        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
        assert_eq!(mem.get("auth_data").unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_reports_loading_while_login_in_flight() {
        let (_, mock, store, _) = fresh_store().await;
        let release = mock.plan_gated_login(login_ok("tok-1"));

        let task = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.login("arda@example.com", "pw").await })
        };
        drain_tasks().await;

        let snapshot = store.snapshot();
        assert!(snapshot.is_loading);
        assert!(!snapshot.is_authenticated);

        release.send(()).unwrap();
        let session = task.await.unwrap().unwrap();
        assert_eq!(session.token, "tok-1");
        assert!(store.snapshot().is_authenticated);
    }

    #[tokio::test]
    async fn test_slow_login_is_superseded_by_newer_login() {
        let (mem, mock, store, _) = fresh_store().await;
        let release_a = mock.plan_gated_login(login_ok("tok-a"));
        mock.plan_login(login_ok("tok-b"));

        let task_a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.login("arda@example.com", "pw").await })
        };
        drain_tasks().await;

        // B starts later and resolves first
        let session_b = store.login("arda@example.com", "pw").await.unwrap();
        assert_eq!(session_b.token, "tok-b");

        // A's success arrives afterwards and must be discarded
        release_a.send(()).unwrap();
        let result_a = task_a.await.unwrap();
        assert!(matches!(result_a, Err(AuthError::Superseded)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.session.unwrap().token, "tok-b");
        assert_eq!(persisted_record(&mem).unwrap().token, "tok-b");
    }

    #[tokio::test]
    async fn test_early_return_still_loses_to_later_ticket() {
        let (mem, mock, store, _) = fresh_store().await;
        let release_a = mock.plan_gated_login(login_ok("tok-a"));
        let release_b = mock.plan_gated_login(login_ok("tok-b"));

        let task_a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.login("arda@example.com", "pw").await })
        };
        drain_tasks().await;
        let task_b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.login("arda@example.com", "pw").await })
        };
        drain_tasks().await;

        // A resolves first, but B holds the newer ticket
        release_a.send(()).unwrap();
        drain_tasks().await;
        release_b.send(()).unwrap();

        let result_a = task_a.await.unwrap();
        let session_b = task_b.await.unwrap().unwrap();

        assert!(matches!(result_a, Err(AuthError::Superseded)));
        assert_eq!(session_b.token, "tok-b");
        assert_eq!(store.snapshot().session.unwrap().token, "tok-b");
        assert_eq!(persisted_record(&mem).unwrap().token, "tok-b");
    }

    #[tokio::test]
    async fn test_logout_supersedes_in_flight_login() {
        let (mem, mock, store, _) = fresh_store().await;
        let release = mock.plan_gated_login(login_ok("tok-a"));

        let task = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.login("arda@example.com", "pw").await })
        };
        drain_tasks().await;

        store.logout().await;

        release.send(()).unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(AuthError::Superseded)));

        assert!(!store.snapshot().is_authenticated);
        assert_eq!(mem.get("auth_data").unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_ids_strictly_increase_across_logins() {
        let (_, mock, store, _) = fresh_store().await;
        mock.plan_login(login_ok("tok-1"));
        mock.plan_login(login_ok("tok-2"));
        mock.plan_login(login_ok("tok-3"));

        let a = store.login("arda@example.com", "pw").await.unwrap();
        let b = store.login("arda@example.com", "pw").await.unwrap();
        let c = store.login("arda@example.com", "pw").await.unwrap();

        assert!(a.session_id < b.session_id);
        assert!(b.session_id < c.session_id);
    }

    #[tokio::test]
    async fn test_failing_storage_does_not_block_auth() {
        let (mem, mock, store, _) = fresh_store().await;
        mem.set_failing(true);
        mock.plan_login(login_ok("tok-1"));

        // Persistence fails quietly; the in-memory commit still happens
        let session = store.login("arda@example.com", "pw").await.unwrap();
        assert_eq!(session.token, "tok-1");
        assert!(store.snapshot().is_authenticated);

        store.logout().await;
        assert!(!store.snapshot().is_authenticated);
    }
}
