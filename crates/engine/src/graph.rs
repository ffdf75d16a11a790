//! Dependency and group indexes.
//!
//! Both maps hold arena indices only; descriptors themselves stay in the
//! arena.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::descriptor::DescriptorIdx;

type Members = SmallVec<[DescriptorIdx; 4]>;

#[derive(Debug, Default)]
pub struct Graph {
	/// Prerequisite id to descriptors waiting on it.
	waiting: FxHashMap<String, Members>,
	/// Group id to members, in scan order.
	groups: FxHashMap<String, Members>,
}

impl Graph {
	/// Adds `idx` to the waiters of `prerequisite`. Never activates anything.
	pub fn register_dependency(&mut self, prerequisite: &str, idx: DescriptorIdx) {
		let waiters = self.waiting.entry(prerequisite.to_string()).or_default();
		if !waiters.contains(&idx) {
			waiters.push(idx);
		}
	}

	/// Removes and returns every waiter of `prerequisite`.
	pub fn consume_dependency(&mut self, prerequisite: &str) -> Members {
		self.waiting.remove(prerequisite).unwrap_or_default()
	}

	pub fn register_group(&mut self, group: &str, idx: DescriptorIdx) {
		let members = self.groups.entry(group.to_string()).or_default();
		if !members.contains(&idx) {
			members.push(idx);
		}
	}

	/// Members of `group` other than `except`.
	pub fn siblings(&self, group: &str, except: DescriptorIdx) -> Members {
		self.groups
			.get(group)
			.map(|m| m.iter().copied().filter(|i| *i != except).collect())
			.unwrap_or_default()
	}

	pub fn clear(&mut self) {
		self.waiting.clear();
		self.groups.clear();
	}
}
