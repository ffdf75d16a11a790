//! Registration buckets and tier weights.

use std::collections::VecDeque;

use laze_config::{ScrollWeights, Weights};
use laze_primitives::Priority;

use crate::descriptor::DescriptorIdx;

/// Three FIFO buckets filled by a scan and drained once, high tier first.
///
/// This only orders the first detector registration; ordering inside an
/// intersection batch is decided by the batch sort.
#[derive(Debug, Default)]
pub struct PriorityQueue {
	tiers: [VecDeque<DescriptorIdx>; 3],
}

impl PriorityQueue {
	pub fn push(&mut self, priority: Priority, idx: DescriptorIdx) {
		self.tiers[priority.index()].push_back(idx);
	}

	/// Empties every bucket, yielding high, then medium, then low entries.
	pub fn drain(&mut self) -> Vec<(Priority, DescriptorIdx)> {
		let mut out = Vec::with_capacity(self.len());
		for priority in Priority::ALL {
			out.extend(self.tiers[priority.index()].drain(..).map(|idx| (priority, idx)));
		}
		out
	}

	pub fn len(&self) -> usize {
		self.tiers.iter().map(VecDeque::len).sum()
	}

	pub fn clear(&mut self) {
		for tier in &mut self.tiers {
			tier.clear();
		}
	}
}

/// Direction of the last scroll signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
	Down,
	#[default]
	Up,
}

/// Live tier weights, nudged by scroll direction.
#[derive(Debug, Clone)]
pub struct TierWeights {
	baseline: Weights,
	scroll: ScrollWeights,
	direction: ScrollDirection,
	last_scroll_y: f64,
}

impl TierWeights {
	pub fn new(baseline: Weights, scroll: ScrollWeights) -> Self {
		Self {
			baseline,
			scroll,
			direction: ScrollDirection::Up,
			last_scroll_y: 0.0,
		}
	}

	/// Records a scroll position. Anything but a strictly larger offset counts as up.
	pub fn on_scroll(&mut self, scroll_y: f64) -> ScrollDirection {
		self.direction = if scroll_y > self.last_scroll_y {
			ScrollDirection::Down
		} else {
			ScrollDirection::Up
		};
		self.last_scroll_y = scroll_y;
		self.direction
	}

	pub fn reconfigure(&mut self, baseline: Weights, scroll: ScrollWeights) {
		self.baseline = baseline;
		self.scroll = scroll;
	}

	pub fn direction(&self) -> ScrollDirection {
		self.direction
	}

	pub fn weight(&self, priority: Priority) -> f64 {
		match (self.direction, priority) {
			(ScrollDirection::Down, Priority::Medium) => self.scroll.medium,
			(ScrollDirection::Down, Priority::Low) => self.scroll.low,
			_ => self.baseline.for_priority(priority),
		}
	}
}
