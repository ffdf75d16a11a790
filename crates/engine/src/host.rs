//! Host collaborator traits.
//!
//! The engine never touches a document, a viewport or a storage backend
//! directly. Everything it reads or writes goes through the traits below,
//! bundled into a [`Host`] at construction time. [`memory`] provides
//! shared-state implementations for headless use and tests.

use laze_primitives::{ElementTag, NodeId, PreloadAs, ResourceKind};
use thiserror::Error;
use url::Url;

pub mod memory;

/// Failure writing into an element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
	/// The node is no longer part of the document.
	#[error("node {0} is detached")]
	Detached(NodeId),
	/// The host refused the write.
	#[error("host rejected '{name}': {reason}")]
	Rejected {
		/// Attribute or style property name.
		name: String,
		/// Host-provided reason.
		reason: String,
	},
}

/// Failure reading or writing the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// Storage is disabled or inaccessible.
	#[error("storage unavailable: {0}")]
	Unavailable(String),
	/// The write exceeded the storage quota.
	#[error("storage quota exceeded")]
	QuotaExceeded,
}

/// Failure of any other host capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	/// The host does not provide the capability at all.
	#[error("{0} is not supported")]
	Unsupported(&'static str),
	/// The capability exists but the call failed.
	#[error("{0}")]
	Other(String),
}

/// Element source and attribute surface.
///
/// Reads of detached nodes return `None`; writes return
/// [`BindError::Detached`].
pub trait Dom: Send {
	/// Elements the host considers lazily managed, in document order.
	fn candidates(&self) -> Vec<NodeId>;
	fn tag(&self, node: NodeId) -> Option<ElementTag>;
	fn attr(&self, node: NodeId, name: &str) -> Option<String>;
	fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), BindError>;
	fn remove_attr(&mut self, node: NodeId, name: &str);
	fn style(&self, node: NodeId, property: &str) -> Option<String>;
	fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), BindError>;
	fn add_class(&mut self, node: NodeId, class: &str);
	/// Current layout viewport height in CSS pixels.
	fn viewport_height(&self) -> f64;
	/// Document base used to resolve relative resource URLs.
	fn base_url(&self) -> Option<Url>;
}

/// Construction options for one visibility detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
	/// Proximity margin around the viewport, in CSS pixels.
	pub margin_px: f64,
	/// Intersection ratio that counts as visible.
	pub threshold: f32,
}

/// One viewport-intersection watcher.
///
/// The host pushes its change notifications into the engine through
/// [`crate::Engine::on_intersections`]; newly observed nodes are expected to
/// produce an initial notification, as intersection observers do.
pub trait Detector: Send {
	fn observe(&mut self, node: NodeId);
	fn unobserve(&mut self, node: NodeId);
	fn set_margin(&mut self, margin_px: f64);
	fn disconnect(&mut self);
}

/// Builds detectors on demand.
pub trait DetectorFactory: Send {
	fn create(&mut self, kind: ResourceKind, options: DetectorOptions) -> Result<Box<dyn Detector>, HostError>;
}

/// Watches the document for added elements.
///
/// The host calls [`crate::Engine::on_mutation`] while connected.
pub trait MutationWatcher: Send {
	fn connect(&mut self) -> Result<(), HostError>;
	fn disconnect(&mut self);
}

/// String key-value store scoped to the browsing session.
pub trait SessionStore: Send {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
	fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
	fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Receives resource hints for upcoming loads.
pub trait HintSink: Send {
	fn dns_prefetch(&mut self, host: &str);
	fn preload(&mut self, url: &str, destination: PreloadAs);
}

/// Optional cache that loaded URLs are handed to.
pub trait ResourceCache: Send {
	fn add(&mut self, url: &str) -> Result<(), HostError>;
}

/// Every collaborator the engine needs.
pub struct Host {
	pub dom: Box<dyn Dom>,
	pub detectors: Box<dyn DetectorFactory>,
	pub mutations: Box<dyn MutationWatcher>,
	pub session: Box<dyn SessionStore>,
	pub hints: Box<dyn HintSink>,
	pub cache: Option<Box<dyn ResourceCache>>,
}

/// Typed write capability for one descriptor, chosen once at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
	Image { attr: String },
	Script { attr: String },
	Stylesheet { attr: String },
	Font { attr: String },
}

impl Binding {
	/// Binding for `kind`, using `attr_override` when the element names its own attribute.
	pub fn for_kind(kind: ResourceKind, attr_override: Option<String>) -> Self {
		let attr = attr_override.unwrap_or_else(|| Self::default_attr(kind).to_string());
		match kind {
			ResourceKind::ImageLike => Self::Image { attr },
			ResourceKind::Script => Self::Script { attr },
			ResourceKind::Stylesheet => Self::Stylesheet { attr },
			ResourceKind::Font => Self::Font { attr },
		}
	}

	pub const fn default_attr(kind: ResourceKind) -> &'static str {
		match kind {
			ResourceKind::ImageLike | ResourceKind::Script => "src",
			ResourceKind::Stylesheet | ResourceKind::Font => "href",
		}
	}

	pub fn attr(&self) -> &str {
		match self {
			Self::Image { attr } | Self::Script { attr } | Self::Stylesheet { attr } | Self::Font { attr } => attr,
		}
	}

	/// Current live value of the activation attribute.
	pub fn get(&self, dom: &dyn Dom, node: NodeId) -> Option<String> {
		dom.attr(node, self.attr()).filter(|v| !v.is_empty())
	}

	/// Writes `value` into the activation attribute.
	pub fn set(&self, dom: &mut dyn Dom, node: NodeId, value: &str) -> Result<(), BindError> {
		dom.set_attr(node, self.attr(), value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_attributes_follow_kind() {
		assert_eq!(Binding::for_kind(ResourceKind::ImageLike, None).attr(), "src");
		assert_eq!(Binding::for_kind(ResourceKind::Script, None).attr(), "src");
		assert_eq!(Binding::for_kind(ResourceKind::Stylesheet, None).attr(), "href");
		assert_eq!(Binding::for_kind(ResourceKind::Font, None).attr(), "href");
	}

	#[test]
	fn override_keeps_kind() {
		let b = Binding::for_kind(ResourceKind::ImageLike, Some("poster".into()));
		assert_eq!(b.attr(), "poster");
		assert!(matches!(b, Binding::Image { .. }));
	}
}
