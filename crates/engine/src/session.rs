//! Session-durable completion map.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::host::SessionStore;

/// Key the completion map is stored under.
pub const SESSION_KEY: &str = "lazyLoadState";

/// Ids recorded as loaded during this browsing session.
///
/// Persisted as a JSON object of `id → true`. Entries are only removed by
/// [`SessionState::clear`].
#[derive(Debug, Default)]
pub struct SessionState {
	loaded: BTreeMap<String, bool>,
}

impl SessionState {
	pub fn load(store: &dyn SessionStore) -> Result<Self> {
		let Some(raw) = store.get(SESSION_KEY)? else {
			return Ok(Self::default());
		};
		let loaded = serde_json::from_str(&raw)?;
		Ok(Self { loaded })
	}

	pub fn is_loaded(&self, id: &str) -> bool {
		self.loaded.get(id).copied().unwrap_or(false)
	}

	/// Records `id`. Returns `false` if it was already recorded.
	pub fn mark_loaded(&mut self, id: &str) -> bool {
		self.loaded.insert(id.to_string(), true) != Some(true)
	}

	pub fn persist(&self, store: &mut dyn SessionStore) -> Result<()> {
		let raw = serde_json::to_string(&self.loaded)?;
		store.set(SESSION_KEY, &raw)?;
		Ok(())
	}

	/// Wipes both the in-memory map and the stored copy.
	pub fn clear(&mut self, store: &mut dyn SessionStore) -> Result<()> {
		self.loaded.clear();
		store.remove(SESSION_KEY)?;
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.loaded.values().filter(|v| **v).count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::EngineError;
	use crate::host::memory::MemorySession;

	#[test]
	fn persists_as_json_object() {
		let mut store = MemorySession::default();
		let mut s = SessionState::default();
		assert!(s.mark_loaded("hero"));
		assert!(!s.mark_loaded("hero"));
		s.persist(&mut store).unwrap();
		assert_eq!(store.raw(SESSION_KEY).as_deref(), Some(r#"{"hero":true}"#));

		let reloaded = SessionState::load(&store).unwrap();
		assert!(reloaded.is_loaded("hero"));
		assert!(!reloaded.is_loaded("other"));
	}

	#[test]
	fn false_entries_do_not_count_as_loaded() {
		let store = MemorySession::default();
		store.put_raw(SESSION_KEY, r#"{"a":true,"b":false}"#);
		let s = SessionState::load(&store).unwrap();
		assert!(!s.is_loaded("b"));
		assert_eq!(s.len(), 1);
	}

	#[test]
	fn corrupt_state_is_reported() {
		let store = MemorySession::default();
		store.put_raw(SESSION_KEY, "not json");
		assert!(matches!(SessionState::load(&store), Err(EngineError::Session(_))));
	}

	#[test]
	fn clear_removes_stored_copy() {
		let mut store = MemorySession::default();
		let mut s = SessionState::default();
		s.mark_loaded("x");
		s.persist(&mut store).unwrap();
		s.clear(&mut store).unwrap();
		assert!(store.raw(SESSION_KEY).is_none());
		assert_eq!(s.len(), 0);
	}
}
