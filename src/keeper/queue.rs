//! Expiry-ordered refresh queue paired with the enrollment set.
//!
//! The two structures are always mutated together under the keeper's lock; a principal is in the
//! enrollment set exactly when it has an entry somewhere in the heap or is held by the drain
//! mid-refresh.

// std
use std::{cmp::Reverse, collections::BinaryHeap};
// self
use crate::{
	_prelude::*,
	session::{PrincipalName, Session},
};

/// A queued session plus its scheduler bookkeeping.
#[derive(Clone, Debug)]
pub struct QueueEntry {
	/// Session awaiting its next refresh.
	pub session: Session,
	/// Consecutive transient refresh failures observed for this session.
	pub transient_failures: u32,
}
impl QueueEntry {
	/// Wraps a session with a clean failure count.
	pub fn new(session: Session) -> Self {
		Self { session, transient_failures: 0 }
	}

	/// Returns the entry with one more transient failure recorded.
	pub fn with_failure(mut self) -> Self {
		self.transient_failures += 1;

		self
	}
}
// Ordering is by access-token expiry alone; ties break arbitrarily.
impl PartialEq for QueueEntry {
	fn eq(&self, other: &Self) -> bool {
		self.session.expires_at == other.session.expires_at
	}
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for QueueEntry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.session.expires_at.cmp(&other.session.expires_at)
	}
}

/// Enrollment set and min-heap of sessions ordered by access-token expiry.
///
/// The queue itself is not synchronized; the keeper wraps it in a mutex and holds that lock for
/// every operation here.
#[derive(Debug, Default)]
pub struct RefreshQueue {
	enrolled: HashSet<PrincipalName>,
	heap: BinaryHeap<Reverse<QueueEntry>>,
}
impl RefreshQueue {
	/// Enrolls a session's principal and queues the session.
	///
	/// Idempotent by principal: re-enrolling an already-enrolled principal is a no-op. Returns
	/// whether enrollment state changed.
	pub fn enroll(&mut self, session: Session) -> bool {
		if !self.enrolled.insert(session.principal.clone()) {
			return false;
		}

		self.heap.push(Reverse(QueueEntry::new(session)));

		true
	}

	/// Membership test against the enrollment set.
	pub fn is_enrolled(&self, principal: &PrincipalName) -> bool {
		self.enrolled.contains(principal)
	}

	/// Removes a principal from the enrollment set and purges every matching queue entry.
	///
	/// Idempotent. "Remove all matching" keeps the operation correct even if a race ever leaves
	/// more than one entry for the principal in the heap.
	pub fn unenroll(&mut self, principal: &PrincipalName) -> bool {
		if !self.enrolled.remove(principal) {
			return false;
		}

		self.heap.retain(|Reverse(entry)| entry.session.principal != *principal);

		true
	}

	/// Pops the entry with the earliest access-token expiry.
	pub fn pop(&mut self) -> Option<QueueEntry> {
		self.heap.pop().map(|Reverse(entry)| entry)
	}

	/// Re-offers an entry, but only while its principal is still enrolled.
	///
	/// The drain re-offers sessions it popped earlier; if the principal was unenrolled in the
	/// meantime the entry is dropped and `false` is returned.
	pub fn offer(&mut self, entry: QueueEntry) -> bool {
		if !self.enrolled.contains(&entry.session.principal) {
			return false;
		}

		self.heap.push(Reverse(entry));

		true
	}

	/// Number of queued entries.
	pub fn len(&self) -> usize {
		self.heap.len()
	}

	/// Returns `true` when no entries are queued.
	pub fn is_empty(&self) -> bool {
		self.heap.is_empty()
	}
}
