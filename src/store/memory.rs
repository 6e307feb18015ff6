//! Thread-safe in-memory [`SessionStore`] implementation for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	session::{Session, SessionKey},
	store::{SessionStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<SessionKey, Session>>>;

/// Thread-safe storage backend that keeps sessions in-process.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(StoreMap);
impl MemorySessionStore {
	fn load_now(map: StoreMap, key: SessionKey) -> Option<Session> {
		map.read().get(&key).cloned()
	}

	fn save_now(map: StoreMap, session: Session) -> Result<(), StoreError> {
		map.write().insert(session.key(), session);

		Ok(())
	}

	fn remove_now(map: StoreMap, key: SessionKey) {
		map.write().remove(&key);
	}
}
impl SessionStore for MemorySessionStore {
	fn load<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, Option<Session>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::load_now(map, key)) })
	}

	fn save(&self, session: Session) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, session) })
	}

	fn remove<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::remove_now(map, key);

			Ok(())
		})
	}
}
