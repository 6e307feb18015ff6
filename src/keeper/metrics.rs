//! Atomic activity counters tracking what the keeper did across drains.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for keeper activity.
#[derive(Debug, Default)]
pub struct KeeperMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	transient_failures: AtomicU64,
	permanent_failures: AtomicU64,
	reconciliations: AtomicU64,
	revocations: AtomicU64,
}
impl KeeperMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refreshes.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of transient refresh failures (session stayed enrolled).
	pub fn transient_failures(&self) -> u64 {
		self.transient_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of permanent refresh failures (session unenrolled).
	pub fn permanent_failures(&self) -> u64 {
		self.permanent_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of stale sessions reconciled against the store.
	pub fn reconciliations(&self) -> u64 {
		self.reconciliations.load(Ordering::Relaxed)
	}

	/// Returns the number of superseded tokens successfully revoked.
	pub fn revocations(&self) -> u64 {
		self.revocations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_transient_failure(&self) {
		self.transient_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_permanent_failure(&self) {
		self.permanent_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reconciliation(&self) {
		self.reconciliations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revocation(&self) {
		self.revocations.fetch_add(1, Ordering::Relaxed);
	}
}
