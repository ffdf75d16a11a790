//! Shared vocabulary for the lazy-load engine.
//!
//! Everything in here is plain data: host node handles, the resource kinds the
//! engine routes to detectors, priority tiers, per-descriptor lifecycle states
//! and the intersection entries a host pushes into the engine.

/// Opaque host node handles.
pub mod ids;
/// Resource kinds, element tags and preload destinations.
pub mod kind;
/// Priority tiers.
pub mod priority;
/// Per-descriptor lifecycle state machine.
pub mod state;
/// Viewport intersection entries.
pub mod viewport;

pub use ids::NodeId;
pub use kind::{ElementTag, PreloadAs, ResourceKind};
pub use priority::{ParsePriorityError, Priority};
pub use state::DescriptorState;
pub use viewport::IntersectionEntry;
