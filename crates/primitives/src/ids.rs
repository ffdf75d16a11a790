use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to one element node owned by the host document.
///
/// The engine never dereferences it; every read and write goes back through
/// the host's binder with this handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
	#[inline]
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	#[inline]
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Node({})", self.0)
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}
