//! Observability helpers for keeper tasks.
//!
//! Structured logging always flows through `tracing`; spans are named `oauth2_keeper.task` with
//! `task` and `stage` fields. Enable the `metrics` feature to additionally increment the
//! `oauth2_keeper_task_total` counter for every attempt/success/failure, labeled by `task` +
//! `outcome`.

// self
use crate::_prelude::*;

/// Task kinds observed by the keeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
	/// Refresh-token exchange for a due session.
	Refresh,
	/// Stale-session reconciliation against the authoritative store.
	Reconcile,
	/// Best-effort revocation of superseded tokens.
	Revoke,
}
impl TaskKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TaskKind::Refresh => "refresh",
			TaskKind::Reconcile => "reconcile",
			TaskKind::Revoke => "revoke",
		}
	}
}
impl Display for TaskKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
	/// Entry to a keeper task.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure handled by the keeper.
	Failure,
}
impl TaskOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TaskOutcome::Attempt => "attempt",
			TaskOutcome::Success => "success",
			TaskOutcome::Failure => "failure",
		}
	}
}
impl Display for TaskOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records a task outcome via the global metrics recorder (when enabled).
pub fn record_task_outcome(kind: TaskKind, outcome: TaskOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_keeper_task_total",
			"task" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
