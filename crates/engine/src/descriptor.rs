//! Descriptor arena.

use std::time::Instant;

use laze_primitives::{DescriptorState, ElementTag, NodeId, Priority, ResourceKind};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::host::Binding;
use crate::timer::TimerId;

/// Dense index of a descriptor in its [`Descriptors`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorIdx(u32);

impl DescriptorIdx {
	pub const fn get(self) -> usize {
		self.0 as usize
	}

	#[cfg(test)]
	pub(crate) const fn from_raw(raw: u32) -> Self {
		Self(raw)
	}
}

/// Internal record for one managed element.
#[derive(Debug, Clone)]
pub struct Descriptor {
	pub node: NodeId,
	/// Stable id, unique within the engine.
	pub id: String,
	pub tag: ElementTag,
	pub kind: ResourceKind,
	pub priority: Priority,
	pub binding: Binding,
	/// URL bound into the activation attribute on load.
	pub deferred_value: Option<String>,
	/// URL bound into `background-image` on load.
	pub background_value: Option<String>,
	pub size_estimate: u64,
	pub group: Option<String>,
	pub depends_on: Option<String>,
	pub strategy: String,
	pub crossorigin: Option<String>,
	pub animated: bool,
	pub animation_class: Option<String>,
	pub observe_start: Option<Instant>,
	/// Set once any intersecting notification is processed.
	pub intersected: bool,
	pub retry_count: u32,
	pub state: DescriptorState,
	pub(crate) timeout_timer: Option<TimerId>,
}

impl Descriptor {
	pub fn loaded(&self) -> bool {
		self.state == DescriptorState::Loaded
	}

	/// URL that hints and caching refer to.
	pub fn resource_url(&self) -> Option<&str> {
		self.deferred_value.as_deref().or(self.background_value.as_deref())
	}
}

/// Arena of descriptors with node and id lookups.
#[derive(Debug, Default)]
pub struct Descriptors {
	slots: Vec<Descriptor>,
	by_node: FxHashMap<NodeId, DescriptorIdx>,
	ids: FxHashSet<String>,
}

impl Descriptors {
	pub fn insert(&mut self, descriptor: Descriptor) -> DescriptorIdx {
		let idx = DescriptorIdx(self.slots.len() as u32);
		self.by_node.insert(descriptor.node, idx);
		self.ids.insert(descriptor.id.clone());
		self.slots.push(descriptor);
		idx
	}

	pub fn get(&self, idx: DescriptorIdx) -> &Descriptor {
		&self.slots[idx.get()]
	}

	pub fn get_mut(&mut self, idx: DescriptorIdx) -> &mut Descriptor {
		&mut self.slots[idx.get()]
	}

	pub fn by_node(&self, node: NodeId) -> Option<DescriptorIdx> {
		self.by_node.get(&node).copied()
	}

	pub fn contains_id(&self, id: &str) -> bool {
		self.ids.contains(id)
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn indices(&self) -> impl Iterator<Item = DescriptorIdx> + use<> {
		(0..self.slots.len() as u32).map(DescriptorIdx)
	}

	pub fn iter(&self) -> impl Iterator<Item = (DescriptorIdx, &Descriptor)> {
		self.slots.iter().enumerate().map(|(i, d)| (DescriptorIdx(i as u32), d))
	}

	/// Moves `idx` to `next` if the state machine allows it.
	///
	/// Returns `false` and leaves the state untouched otherwise.
	pub fn transition(&mut self, idx: DescriptorIdx, next: DescriptorState) -> bool {
		let d = &mut self.slots[idx.get()];
		if !d.state.can_transition_to(next) {
			tracing::trace!(node = %d.node, from = ?d.state, to = ?next, "laze.transition_rejected");
			return false;
		}
		tracing::trace!(node = %d.node, from = ?d.state, to = ?next, "laze.transition");
		d.state = next;
		true
	}
}

#[cfg(test)]
pub(crate) fn test_descriptor(node: u64, id: &str) -> Descriptor {
	Descriptor {
		node: NodeId(node),
		id: id.to_string(),
		tag: ElementTag::Img,
		kind: ResourceKind::ImageLike,
		priority: Priority::Low,
		binding: Binding::for_kind(ResourceKind::ImageLike, None),
		deferred_value: Some(format!("/{id}.png")),
		background_value: None,
		size_estimate: 0,
		group: None,
		depends_on: None,
		strategy: "immediate".to_string(),
		crossorigin: None,
		animated: false,
		animation_class: None,
		observe_start: None,
		intersected: false,
		retry_count: 0,
		state: DescriptorState::Unregistered,
		timeout_timer: None,
	}
}
