//! Background refresh scheduler: enrollment API and the expiry-ordered drain loop.
//!
//! The keeper owns the (enrollment set, refresh queue) pair behind a single mutex and drains the
//! queue on an external cadence via [`SessionKeeper::refresh_due_sessions`]. The lock is held
//! only for in-memory mutation; every store and network call happens with the lock released, so
//! foreground `enroll`/`is_enrolled`/`unenroll` callers never block on provider I/O. An async
//! mutex serializes drains so at most one runs at a time.

pub mod metrics;
pub mod queue;

pub use metrics::KeeperMetrics;
pub use queue::{QueueEntry, RefreshQueue};

// crates.io
use tracing::Instrument;
// self
use crate::{
	_prelude::*,
	client::{RefreshClient, RefreshErrorKind, RevocationClient, TokenKind},
	obs::{self, TaskKind, TaskOutcome},
	session::{PrincipalName, Session},
	store::SessionStore,
};

/// Tuning parameters for the keeper; none affect correctness.
#[derive(Clone, Debug)]
pub struct KeeperConfig {
	/// Safety buffer subtracted from expiry so refreshes land before the token lapses.
	pub clock_skew: Duration,
	/// Ceiling on access-token age. Tokens older than this are rotated even when the provider
	/// reported a longer lifetime, so indefinitely long-lived tokens still get replaced.
	pub max_token_age: Duration,
	/// Consecutive transient failures after which a session is treated as permanently failed.
	pub max_transient_failures: u32,
}
impl KeeperConfig {
	/// Overrides the clock-skew margin (defaults to 5 seconds).
	pub fn with_clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = skew;

		self
	}

	/// Overrides the max-token-age ceiling (defaults to 5 minutes).
	pub fn with_max_token_age(mut self, age: Duration) -> Self {
		self.max_token_age = age;

		self
	}

	/// Overrides the transient retry budget (defaults to 3).
	pub fn with_max_transient_failures(mut self, budget: u32) -> Self {
		self.max_transient_failures = budget;

		self
	}

	fn session_due(&self, session: &Session, now: OffsetDateTime) -> bool {
		now >= session.expires_at - self.clock_skew
			|| now >= session.issued_at + self.max_token_age
	}
}
impl Default for KeeperConfig {
	fn default() -> Self {
		Self {
			clock_skew: Duration::seconds(5),
			max_token_age: Duration::minutes(5),
			max_transient_failures: 3,
		}
	}
}

/// Keeps enrolled sessions' access tokens valid in the background.
pub struct SessionKeeper {
	store: Arc<dyn SessionStore>,
	refresher: Arc<dyn RefreshClient>,
	revoker: Option<Arc<dyn RevocationClient>>,
	config: KeeperConfig,
	metrics: Arc<KeeperMetrics>,
	state: Mutex<RefreshQueue>,
	drain_guard: AsyncMutex<()>,
}
impl SessionKeeper {
	/// Creates a keeper over the provided store and refresh client.
	pub fn new(store: Arc<dyn SessionStore>, refresher: Arc<dyn RefreshClient>) -> Self {
		Self {
			store,
			refresher,
			revoker: None,
			config: KeeperConfig::default(),
			metrics: Default::default(),
			state: Default::default(),
			drain_guard: AsyncMutex::new(()),
		}
	}

	/// Attaches a revocation client used for best-effort cleanup of superseded tokens.
	pub fn with_revoker(mut self, revoker: Arc<dyn RevocationClient>) -> Self {
		self.revoker = Some(revoker);

		self
	}

	/// Overrides the keeper configuration.
	pub fn with_config(mut self, config: KeeperConfig) -> Self {
		self.config = config;

		self
	}

	/// Returns a handle to the keeper's activity counters.
	pub fn metrics(&self) -> Arc<KeeperMetrics> {
		self.metrics.clone()
	}

	/// Enrolls a session for automatic background refresh.
	///
	/// Rejects sessions that cannot be refreshed automatically (no refresh token, or the refresh
	/// token already expired). Otherwise idempotent by principal: re-enrolling an enrolled
	/// principal is a no-op and returns `Ok(false)`.
	pub fn enroll(&self, session: Session) -> Result<bool> {
		if !session.refresh_eligible_at(OffsetDateTime::now_utc()) {
			return Err(Error::IneligibleSession {
				reason: "session carries no usable refresh token".into(),
			});
		}

		Ok(self.state.lock().enroll(session))
	}

	/// Returns whether the principal is currently enrolled.
	pub fn is_enrolled(&self, principal: &PrincipalName) -> bool {
		self.state.lock().is_enrolled(principal)
	}

	/// Removes the principal from background refresh, purging all of its queue entries.
	///
	/// Idempotent; returns whether enrollment state changed.
	pub fn unenroll(&self, principal: &PrincipalName) -> bool {
		self.state.lock().unenroll(principal)
	}

	/// Number of sessions currently queued for refresh.
	pub fn queued(&self) -> usize {
		self.state.lock().len()
	}

	/// Performs one drain: pops and processes every currently-due session.
	///
	/// Sessions are processed in non-decreasing expiry order; the drain stops as soon as the head
	/// of the queue is not yet due, since nothing behind it can be due either. Failures are
	/// handled at per-session granularity and never abort the drain.
	pub async fn refresh_due_sessions(&self) {
		let _drain = self.drain_guard.lock().await;
		let mut deferred = Vec::new();

		loop {
			let Some(entry) = self.next_reconciled().await else { break };
			let now = OffsetDateTime::now_utc();

			if !self.config.session_due(&entry.session, now) {
				self.state.lock().offer(entry);

				break;
			}

			let span = tracing::info_span!(
				"oauth2_keeper.task",
				task = TaskKind::Refresh.as_str(),
				stage = "refresh_due_sessions",
			);

			self.refresh_entry(entry, &mut deferred).instrument(span).await;
		}

		// Transiently failed entries skip the rest of this drain and are retried next cycle.
		if !deferred.is_empty() {
			let mut state = self.state.lock();

			for entry in deferred {
				state.offer(entry);
			}
		}
	}

	/// Pops the next head-of-queue entry, swapping in the authoritative stored session whenever
	/// the queued one has been superseded by a concurrent interactive login.
	async fn next_reconciled(&self) -> Option<QueueEntry> {
		loop {
			let entry = self.state.lock().pop()?;
			let key = entry.session.key();
			let stored = match self.store.load(&key).await {
				Ok(stored) => stored,
				Err(err) => {
					// Everything behind this entry would hit the same store; retry next cycle.
					tracing::warn!(
						principal = %key.principal,
						error = %err,
						"session store unavailable; deferring drain",
					);
					self.state.lock().offer(entry);

					return None;
				},
			};

			match stored {
				Some(authoritative) if !authoritative.same_refresh_token(&entry.session) => {
					obs::record_task_outcome(TaskKind::Reconcile, TaskOutcome::Attempt);
					tracing::info!(
						principal = %key.principal,
						"queued session superseded by a newer login; adopting stored session",
					);
					self.revoke_superseded(&entry.session).await;
					self.state.lock().offer(QueueEntry::new(authoritative));
					self.metrics.record_reconciliation();
					obs::record_task_outcome(TaskKind::Reconcile, TaskOutcome::Success);
				},
				// An absent store record is not staleness; the refresh re-saves it on success.
				_ => return Some(entry),
			}
		}
	}

	async fn refresh_entry(&self, entry: QueueEntry, deferred: &mut Vec<QueueEntry>) {
		let principal = entry.session.principal.clone();

		obs::record_task_outcome(TaskKind::Refresh, TaskOutcome::Attempt);
		self.metrics.record_attempt();
		tracing::info!(principal = %principal, "refreshing session");

		match self.refresher.refresh(&entry.session).await {
			Ok(refreshed) => {
				if let Err(err) = self.store.save(refreshed.clone()).await {
					// The next cycle reconciles against whatever the store still holds.
					tracing::warn!(
						principal = %principal,
						error = %err,
						"failed to persist refreshed session",
					);
				}
				if !self.state.lock().offer(QueueEntry::new(refreshed)) {
					tracing::info!(
						principal = %principal,
						"principal unenrolled mid-refresh; dropping refreshed session",
					);
				}

				self.metrics.record_success();
				obs::record_task_outcome(TaskKind::Refresh, TaskOutcome::Success);
				tracing::info!(principal = %principal, "refreshed session successfully");
			},
			Err(err) => {
				obs::record_task_outcome(TaskKind::Refresh, TaskOutcome::Failure);

				let budget_exhausted =
					entry.transient_failures + 1 >= self.config.max_transient_failures;

				if matches!(err.kind(), RefreshErrorKind::Transient) && !budget_exhausted {
					self.metrics.record_transient_failure();
					tracing::warn!(
						principal = %principal,
						error = %err,
						"transient refresh failure; retrying next cycle",
					);
					deferred.push(entry.with_failure());
				} else {
					self.metrics.record_permanent_failure();
					tracing::warn!(
						principal = %principal,
						error = %err,
						"unrecoverable refresh failure; unenrolling principal",
					);
					self.state.lock().unenroll(&principal);

					if let Err(err) = self.store.remove(&entry.session.key()).await {
						tracing::warn!(
							principal = %principal,
							error = %err,
							"failed to remove session after unrecoverable refresh failure",
						);
					}
				}
			},
		}
	}

	async fn revoke_superseded(&self, session: &Session) {
		let Some(revoker) = self.revoker.as_ref() else { return };
		let mut tokens = vec![(session.access_token.clone(), TokenKind::Access)];

		if let Some(refresh) = session.refresh_token.clone() {
			tokens.push((refresh, TokenKind::Refresh));
		}

		for (token, kind) in tokens {
			obs::record_task_outcome(TaskKind::Revoke, TaskOutcome::Attempt);

			match revoker.revoke(&session.registration, &token, kind).await {
				Ok(()) => {
					self.metrics.record_revocation();
					obs::record_task_outcome(TaskKind::Revoke, TaskOutcome::Success);
					tracing::info!(
						principal = %session.principal,
						token = %kind,
						"revoked superseded token",
					);
				},
				Err(err) => {
					obs::record_task_outcome(TaskKind::Revoke, TaskOutcome::Failure);
					tracing::warn!(
						principal = %session.principal,
						token = %kind,
						error = %err,
						"failed to revoke superseded token",
					);
				},
			}
		}
	}
}
#[cfg(feature = "tokio")]
impl SessionKeeper {
	/// Spawns a recurring task that drains the queue every `every` (30 seconds is a sensible
	/// cadence; the exact interval is a tuning parameter).
	///
	/// The first tick is skipped: sessions enrolled at startup were just minted.
	pub fn spawn(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
		let keeper = Arc::clone(self);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(every);

			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			ticker.tick().await;

			loop {
				ticker.tick().await;
				keeper.refresh_due_sessions().await;
			}
		})
	}
}
impl Debug for SessionKeeper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionKeeper")
			.field("config", &self.config)
			.field("revoker_set", &self.revoker.is_some())
			.field("queued", &self.state.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		client::{RefreshError, RefreshFuture},
		session::RegistrationId,
		store::MemorySessionStore,
	};

	struct NeverRefresh;
	impl RefreshClient for NeverRefresh {
		fn refresh<'a>(&'a self, _: &'a Session) -> RefreshFuture<'a> {
			Box::pin(async { Err(RefreshError::Timeout) })
		}
	}

	fn keeper() -> SessionKeeper {
		SessionKeeper::new(Arc::new(MemorySessionStore::default()), Arc::new(NeverRefresh))
	}

	#[test]
	fn session_due_honors_skew_and_max_age() {
		let config = KeeperConfig::default();
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		// Fixture expiries are relative to the real clock; pin them to explicit instants.
		let mut fresh = test_session("gw2auth", "alice", "a", "r", Duration::minutes(2));

		fresh.issued_at = now;
		fresh.expires_at = now + Duration::minutes(2);

		assert!(!config.session_due(&fresh, now));
		assert!(config.session_due(&fresh, now + Duration::minutes(2) - Duration::seconds(5)));
		assert!(config.session_due(&fresh, now + Duration::minutes(5)), "max age safety valve");
	}

	#[test]
	fn enrollment_reflects_net_effect_of_calls() {
		let keeper = keeper();
		let alice = PrincipalName::new("alice").expect("Principal fixture should be valid.");
		let session = test_session("gw2auth", "alice", "a", "r", Duration::minutes(10));

		assert!(!keeper.is_enrolled(&alice));
		assert!(keeper.enroll(session.clone()).expect("Eligible session should enroll."));
		assert!(!keeper.enroll(session).expect("Double enroll should be a no-op."));
		assert!(keeper.is_enrolled(&alice));
		assert!(keeper.unenroll(&alice));
		assert!(!keeper.unenroll(&alice));
		assert!(!keeper.is_enrolled(&alice));
		assert_eq!(keeper.queued(), 0);
	}

	#[test]
	fn enroll_rejects_ineligible_sessions() {
		let keeper = keeper();
		let registration =
			RegistrationId::new("gw2auth").expect("Registration fixture should be valid.");
		let principal = PrincipalName::new("alice").expect("Principal fixture should be valid.");
		let session = Session::builder(registration, principal.clone())
			.access_token("access")
			.issued_now()
			.expires_in(Duration::minutes(10))
			.build()
			.expect("Session without refresh token should build.");
		let err = keeper.enroll(session).expect_err("Ineligible session must be rejected.");

		assert!(matches!(err, Error::IneligibleSession { .. }));
		assert!(!keeper.is_enrolled(&principal));
	}
}
