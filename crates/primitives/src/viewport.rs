use serde::{Deserialize, Serialize};

use crate::NodeId;

/// One element whose intersection state changed, as reported by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
	pub node: NodeId,
	pub is_intersecting: bool,
	/// Top edge of the element's bounding box, relative to the viewport.
	pub top: f64,
}

impl IntersectionEntry {
	pub fn new(node: NodeId, is_intersecting: bool, top: f64) -> Self {
		Self { node, is_intersecting, top }
	}

	/// Absolute distance from the vertical center of a viewport of `viewport_height`.
	pub fn center_distance(&self, viewport_height: f64) -> f64 {
		(self.top - viewport_height / 2.0).abs()
	}
}
