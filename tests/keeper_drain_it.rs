// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use oauth2_keeper::{
	_preludet::*,
	client::{
		RefreshClient, RefreshError, RefreshFuture, RevocationClient, RevokeFuture, SERVER_ERROR,
		TokenKind,
	},
	keeper::{KeeperConfig, SessionKeeper},
	session::{PrincipalName, RegistrationId, Session, SessionKey, TokenSecret},
	store::{MemorySessionStore, SessionStore, StoreError, StoreFuture},
};

type Script = dyn Fn(&Session) -> Result<Session, RefreshError> + Send + Sync;

struct ScriptedRefresh {
	calls: AtomicUsize,
	delay: Option<std::time::Duration>,
	script: Box<Script>,
}
impl ScriptedRefresh {
	fn new(script: impl Fn(&Session) -> Result<Session, RefreshError> + Send + Sync + 'static) -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), delay: None, script: Box::new(script) })
	}

	fn slow(
		delay: std::time::Duration,
		script: impl Fn(&Session) -> Result<Session, RefreshError> + Send + Sync + 'static,
	) -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), delay: Some(delay), script: Box::new(script) })
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RefreshClient for ScriptedRefresh {
	fn refresh<'a>(&'a self, session: &'a Session) -> RefreshFuture<'a> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let delay = self.delay;
		let result = (self.script)(session);

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			result
		})
	}
}

#[derive(Default)]
struct RecordingRevoker {
	revoked: Mutex<Vec<(String, &'static str)>>,
}
impl RecordingRevoker {
	fn revoked(&self) -> Vec<(String, &'static str)> {
		self.revoked.lock().clone()
	}
}
impl RevocationClient for RecordingRevoker {
	fn revoke<'a>(
		&'a self,
		_registration: &'a RegistrationId,
		token: &'a TokenSecret,
		kind: TokenKind,
	) -> RevokeFuture<'a> {
		self.revoked.lock().push((token.expose().to_owned(), kind.as_str()));

		Box::pin(async { Ok(()) })
	}
}

struct UnavailableStore;
impl SessionStore for UnavailableStore {
	fn load<'a>(&'a self, _key: &'a SessionKey) -> StoreFuture<'a, Option<Session>> {
		Box::pin(async { Err(StoreError::Backend { message: "database unreachable".into() }) })
	}

	fn save(&self, _session: Session) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "database unreachable".into() }) })
	}

	fn remove<'a>(&'a self, _key: &'a SessionKey) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "database unreachable".into() }) })
	}
}

fn principal(name: &str) -> PrincipalName {
	PrincipalName::new(name).expect("Principal name fixture should be valid.")
}

/// Due immediately: the access token expires inside the default clock-skew margin.
fn due_session(name: &str) -> Session {
	test_session("gw2auth", name, "access-1", "refresh-1", Duration::seconds(2))
}

/// Not due: plenty of lifetime left and issued just now.
fn idle_session(name: &str) -> Session {
	test_session("gw2auth", name, "access-1", "refresh-1", Duration::hours(1))
}

fn successor(session: &Session) -> Session {
	test_session(
		&session.registration,
		&session.principal,
		"access-new",
		"refresh-new",
		Duration::hours(1),
	)
}

#[tokio::test]
async fn not_due_session_survives_drain_untouched() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|session| Ok(successor(session)));
	let keeper = SessionKeeper::new(store, refresher.clone());

	keeper.enroll(idle_session("alice")).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 0);
	assert_eq!(keeper.queued(), 1);
	assert!(keeper.is_enrolled(&principal("alice")));
}

#[tokio::test]
async fn due_session_is_refreshed_persisted_and_requeued() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|session| Ok(successor(session)));
	let keeper = SessionKeeper::new(store.clone(), refresher.clone());
	let session = due_session("alice");
	let key = session.key();

	keeper.enroll(session).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 1);
	assert_eq!(keeper.queued(), 1, "successor should replace the refreshed entry");
	assert!(keeper.is_enrolled(&principal("alice")));

	let stored = store
		.load(&key)
		.await
		.expect("Loading the refreshed session should succeed.")
		.expect("Refreshed session should be persisted.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(keeper.metrics().successes(), 1);
}

#[tokio::test]
async fn superseded_session_reconciles_without_refreshing() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|session| Ok(successor(session)));
	let revoker = Arc::new(RecordingRevoker::default());
	let keeper =
		SessionKeeper::new(store.clone(), refresher.clone()).with_revoker(revoker.clone());
	let queued = due_session("alice");
	// A concurrent interactive login replaced the session; the store is authoritative.
	let relogin = test_session("gw2auth", "alice", "access-2", "refresh-2", Duration::hours(1));

	store.save(relogin).await.expect("Seeding the store should succeed.");
	keeper.enroll(queued).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 0, "a superseded session must not be refreshed");
	assert_eq!(
		revoker.revoked(),
		vec![("access-1".to_owned(), "access_token"), ("refresh-1".to_owned(), "refresh_token")],
	);
	assert_eq!(keeper.queued(), 1, "the stored session should take the queue slot");
	assert!(keeper.is_enrolled(&principal("alice")));
	assert_eq!(keeper.metrics().reconciliations(), 1);
	assert_eq!(keeper.metrics().revocations(), 2);
}

#[tokio::test]
async fn permanent_failure_unenrolls_and_clears_the_store() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|_| {
		Err(RefreshError::Provider { code: "invalid_grant".into(), description: None })
	});
	let keeper = SessionKeeper::new(store.clone(), refresher.clone());
	let session = due_session("alice");
	let key = session.key();

	store.save(session.clone()).await.expect("Seeding the store should succeed.");
	keeper.enroll(session).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert!(!keeper.is_enrolled(&principal("alice")));
	assert_eq!(keeper.queued(), 0);
	assert!(
		store.load(&key).await.expect("Loading should succeed.").is_none(),
		"the terminal session should be removed from the store",
	);
	assert_eq!(keeper.metrics().permanent_failures(), 1);
}

#[tokio::test]
async fn transient_failure_keeps_session_enrolled() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|_| {
		Err(RefreshError::Provider { code: SERVER_ERROR.into(), description: None })
	});
	let keeper = SessionKeeper::new(store, refresher.clone());

	keeper.enroll(due_session("alice")).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 1);
	assert!(keeper.is_enrolled(&principal("alice")));
	assert_eq!(keeper.queued(), 1, "the failed session should be requeued for the next cycle");
	assert_eq!(keeper.metrics().transient_failures(), 1);
}

#[tokio::test]
async fn transient_failures_escalate_once_the_retry_budget_is_spent() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|_| Err(RefreshError::Timeout));
	let keeper = SessionKeeper::new(store, refresher.clone())
		.with_config(KeeperConfig::default().with_max_transient_failures(2));

	keeper.enroll(due_session("alice")).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert!(keeper.is_enrolled(&principal("alice")), "the first failure is retried");

	keeper.refresh_due_sessions().await;

	assert!(!keeper.is_enrolled(&principal("alice")), "the budget is spent on the second failure");
	assert_eq!(keeper.queued(), 0);
	assert_eq!(refresher.calls(), 2);
	assert_eq!(keeper.metrics().transient_failures(), 1);
	assert_eq!(keeper.metrics().permanent_failures(), 1);
}

#[tokio::test]
async fn unenroll_during_refresh_drops_the_successor() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher =
		ScriptedRefresh::slow(std::time::Duration::from_millis(100), |session| Ok(successor(session)));
	let keeper = Arc::new(SessionKeeper::new(store, refresher.clone()));

	keeper.enroll(due_session("alice")).expect("Eligible session should enroll.");

	let drain = {
		let keeper = keeper.clone();

		tokio::spawn(async move { keeper.refresh_due_sessions().await })
	};

	tokio::time::sleep(std::time::Duration::from_millis(20)).await;

	assert!(keeper.unenroll(&principal("alice")), "unenroll should land mid-refresh");

	drain.await.expect("Drain task should not panic.");

	assert!(!keeper.is_enrolled(&principal("alice")));
	assert_eq!(keeper.queued(), 0, "the successor of an unenrolled principal must be dropped");
}

#[tokio::test]
async fn store_outage_defers_the_drain() {
	let refresher = ScriptedRefresh::new(|session| Ok(successor(session)));
	let keeper = SessionKeeper::new(Arc::new(UnavailableStore), refresher.clone());

	keeper.enroll(due_session("alice")).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 0, "no refresh should run while the store is unreachable");
	assert_eq!(keeper.queued(), 1);
	assert!(keeper.is_enrolled(&principal("alice")));
}

#[tokio::test]
async fn old_tokens_rotate_even_with_lifetime_remaining() {
	let store = Arc::new(MemorySessionStore::default());
	let refresher = ScriptedRefresh::new(|session| Ok(successor(session)));
	let keeper = SessionKeeper::new(store, refresher.clone());
	let now = OffsetDateTime::now_utc();
	let registration =
		RegistrationId::new("gw2auth").expect("Registration fixture should be valid.");
	// Issued well past the max-token-age ceiling but nowhere near expiry.
	let session = Session::builder(registration, principal("alice"))
		.access_token("access-1")
		.refresh_token("refresh-1")
		.issued_at(now - Duration::minutes(10))
		.expires_at(now + Duration::hours(1))
		.build()
		.expect("Session fixture should build successfully.");

	keeper.enroll(session).expect("Eligible session should enroll.");
	keeper.refresh_due_sessions().await;

	assert_eq!(refresher.calls(), 1, "the age ceiling should force a rotation");
	assert_eq!(keeper.metrics().successes(), 1);
}
