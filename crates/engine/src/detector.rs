//! Per-kind detector slots with keep-latest frame coalescing.

use laze_primitives::{IntersectionEntry, NodeId, ResourceKind};
use rustc_hash::FxHashSet;

use crate::host::{Detector, DetectorFactory, DetectorOptions, HostError};

#[derive(Default)]
struct Slot {
	detector: Option<Box<dyn Detector>>,
	margin_px: f64,
	observed: FxHashSet<NodeId>,
	/// Most recent notification not yet processed by a frame.
	pending: Option<Vec<IntersectionEntry>>,
}

/// The four visibility detectors, created lazily and released when idle.
#[derive(Default)]
pub struct DetectorSet {
	slots: [Slot; 4],
}

impl DetectorSet {
	/// Observes `node` with the detector for `kind`, creating it if needed.
	///
	/// The detector margin follows the priority of the node being registered.
	/// Observing an already observed node is a no-op.
	pub fn observe(
		&mut self,
		factory: &mut dyn DetectorFactory,
		kind: ResourceKind,
		node: NodeId,
		options: DetectorOptions,
	) -> Result<(), HostError> {
		let slot = &mut self.slots[kind.index()];
		if slot.observed.contains(&node) {
			return Ok(());
		}
		match &mut slot.detector {
			Some(detector) => {
				if slot.margin_px != options.margin_px {
					detector.set_margin(options.margin_px);
					slot.margin_px = options.margin_px;
				}
				detector.observe(node);
			}
			None => {
				let mut created = factory.create(kind, options)?;
				tracing::debug!(kind = kind.as_str(), margin_px = options.margin_px, threshold = options.threshold, "laze.detector_created");
				created.observe(node);
				slot.detector = Some(created);
				slot.margin_px = options.margin_px;
			}
		}
		slot.observed.insert(node);
		Ok(())
	}

	pub fn unobserve(&mut self, kind: ResourceKind, node: NodeId) {
		let slot = &mut self.slots[kind.index()];
		if slot.observed.remove(&node) {
			if let Some(detector) = &mut slot.detector {
				detector.unobserve(node);
			}
		}
	}

	pub fn is_observed(&self, kind: ResourceKind, node: NodeId) -> bool {
		self.slots[kind.index()].observed.contains(&node)
	}

	pub fn observed_count(&self) -> usize {
		self.slots.iter().map(|s| s.observed.len()).sum()
	}

	/// Stores a notification for the next frame, replacing any unprocessed one.
	///
	/// Returns `true` when an earlier notification was discarded.
	pub fn offer(&mut self, kind: ResourceKind, entries: Vec<IntersectionEntry>) -> bool {
		self.slots[kind.index()].pending.replace(entries).is_some()
	}

	pub fn wants_frame(&self) -> bool {
		self.slots.iter().any(|s| s.pending.is_some())
	}

	/// Takes every pending notification, in kind order.
	pub fn take_pending(&mut self) -> Vec<(ResourceKind, Vec<IntersectionEntry>)> {
		ResourceKind::ALL
			.into_iter()
			.filter_map(|kind| self.slots[kind.index()].pending.take().map(|e| (kind, e)))
			.collect()
	}

	/// Disconnects detectors with nothing left to observe. Returns how many were released.
	pub fn release_idle(&mut self) -> usize {
		let mut released = 0;
		for kind in ResourceKind::ALL {
			let slot = &mut self.slots[kind.index()];
			if slot.observed.is_empty() && slot.pending.is_none() {
				if let Some(mut detector) = slot.detector.take() {
					detector.disconnect();
					tracing::trace!(kind = kind.as_str(), "laze.detector_released");
					released += 1;
				}
			}
		}
		released
	}

	/// Disconnects and forgets every detector, observation and pending notification.
	pub fn disconnect_all(&mut self) {
		for slot in &mut self.slots {
			if let Some(mut detector) = slot.detector.take() {
				detector.disconnect();
			}
			slot.observed.clear();
			slot.pending = None;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::host::memory::MemoryDetectors;

	fn opts(margin_px: f64) -> DetectorOptions {
		DetectorOptions { margin_px, threshold: 0.1 }
	}

	#[test]
	fn detector_created_once_and_margin_follows_registration() {
		let mut factory = MemoryDetectors::default();
		let mut set = DetectorSet::default();
		set.observe(&mut factory, ResourceKind::ImageLike, NodeId(1), opts(100.0)).unwrap();
		set.observe(&mut factory, ResourceKind::ImageLike, NodeId(2), opts(300.0)).unwrap();
		set.observe(&mut factory, ResourceKind::ImageLike, NodeId(2), opts(300.0)).unwrap();

		assert_eq!(factory.created(ResourceKind::ImageLike), 1);
		assert_eq!(factory.margin(ResourceKind::ImageLike), 300.0);
		assert_eq!(factory.observed(ResourceKind::ImageLike), [NodeId(1), NodeId(2)]);
	}

	#[test]
	fn latest_notification_wins() {
		let mut set = DetectorSet::default();
		assert!(!set.offer(ResourceKind::Script, vec![IntersectionEntry::new(NodeId(1), true, 0.0)]));
		assert!(set.offer(ResourceKind::Script, vec![IntersectionEntry::new(NodeId(2), true, 0.0)]));
		assert!(set.wants_frame());

		let pending = set.take_pending();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].1[0].node, NodeId(2));
		assert!(!set.wants_frame());
	}

	#[test]
	fn idle_detectors_are_released_and_recreated() {
		let mut factory = MemoryDetectors::default();
		let mut set = DetectorSet::default();
		set.observe(&mut factory, ResourceKind::Font, NodeId(7), opts(0.0)).unwrap();
		assert_eq!(set.release_idle(), 0);

		set.unobserve(ResourceKind::Font, NodeId(7));
		assert_eq!(set.release_idle(), 1);
		assert!(!factory.is_live(ResourceKind::Font));

		set.observe(&mut factory, ResourceKind::Font, NodeId(8), opts(0.0)).unwrap();
		assert_eq!(factory.created(ResourceKind::Font), 2);
	}

	#[test]
	fn creation_failure_leaves_slot_empty() {
		let mut factory = MemoryDetectors::default();
		factory.set_unsupported(true);
		let mut set = DetectorSet::default();
		assert!(set.observe(&mut factory, ResourceKind::ImageLike, NodeId(1), opts(0.0)).is_err());
		assert!(!set.is_observed(ResourceKind::ImageLike, NodeId(1)));
	}
}
