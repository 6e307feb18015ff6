//! Storage contract for authoritative session records, plus the built-in memory store.
//!
//! The store is owned by the surrounding application: the interactive login flow saves sessions
//! into it, the identity endpoints read from it, and the keeper treats its contents as the
//! authoritative truth when reconciling queued sessions.

pub mod memory;

pub use memory::MemorySessionStore;

// self
use crate::{_prelude::*, session::{Session, SessionKey}};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for authoritative session records.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the session stored under the provided key, if present.
	fn load<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, Option<Session>>;

	/// Persists or replaces the session stored under its own key.
	fn save(&self, session: Session) -> StoreFuture<'_, ()>;

	/// Removes the session stored under the provided key.
	fn remove<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
