//! In-memory host.
//!
//! Every collaborator here keeps its state behind an `Arc<Mutex<_>>`, so a
//! clone handed to the engine and a clone kept by the caller observe the same
//! document, detectors and storage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use laze_primitives::{ElementTag, NodeId, PreloadAs, ResourceKind};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use url::Url;

use super::{
	BindError, Detector, DetectorFactory, DetectorOptions, Dom, HintSink, Host, HostError, MutationWatcher,
	ResourceCache, SessionStore, StoreError,
};

#[derive(Debug)]
struct Element {
	tag: ElementTag,
	attrs: BTreeMap<String, String>,
	styles: BTreeMap<String, String>,
	classes: Vec<String>,
	detached: bool,
}

/// One `set_attr` or `set_style` call that reached the document.
#[derive(Debug)]
struct Write {
	node: NodeId,
	name: String,
	value: String,
}

#[derive(Debug)]
struct DomState {
	elements: BTreeMap<NodeId, Element>,
	next_node: u64,
	viewport_height: f64,
	base_url: Option<Url>,
	writes: Vec<Write>,
	failing: FxHashMap<NodeId, u32>,
}

/// Document held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDom {
	state: Arc<Mutex<DomState>>,
}

impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryDom {
	/// Empty document with an 800px viewport based at `https://example.test/`.
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(DomState {
				elements: BTreeMap::new(),
				next_node: 1,
				viewport_height: 800.0,
				base_url: Url::parse("https://example.test/").ok(),
				writes: Vec::new(),
				failing: FxHashMap::default(),
			})),
		}
	}

	/// Appends an element and returns its handle.
	pub fn insert(&self, tag: ElementTag, attrs: &[(&str, &str)]) -> NodeId {
		let mut st = self.state.lock();
		let node = NodeId(st.next_node);
		st.next_node += 1;
		st.elements.insert(
			node,
			Element {
				tag,
				attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
				styles: BTreeMap::new(),
				classes: Vec::new(),
				detached: false,
			},
		);
		node
	}

	pub fn get_attr(&self, node: NodeId, name: &str) -> Option<String> {
		self.state.lock().elements.get(&node).and_then(|e| e.attrs.get(name).cloned())
	}

	pub fn get_style(&self, node: NodeId, property: &str) -> Option<String> {
		self.state.lock().elements.get(&node).and_then(|e| e.styles.get(property).cloned())
	}

	pub fn set_inline_style(&self, node: NodeId, property: &str, value: &str) {
		if let Some(e) = self.state.lock().elements.get_mut(&node) {
			e.styles.insert(property.to_string(), value.to_string());
		}
	}

	pub fn has_class(&self, node: NodeId, class: &str) -> bool {
		self.state.lock().elements.get(&node).is_some_and(|e| e.classes.iter().any(|c| c == class))
	}

	/// Values written to `name` on `node`, oldest first.
	pub fn writes(&self, node: NodeId, name: &str) -> Vec<String> {
		self.state
			.lock()
			.writes
			.iter()
			.filter(|w| w.node == node && w.name == name)
			.map(|w| w.value.clone())
			.collect()
	}

	/// Makes the next `count` non-`data-*` attribute writes to `node` fail.
	pub fn fail_binds(&self, node: NodeId, count: u32) {
		self.state.lock().failing.insert(node, count);
	}

	pub fn detach(&self, node: NodeId) {
		if let Some(e) = self.state.lock().elements.get_mut(&node) {
			e.detached = true;
		}
	}

	pub fn set_viewport_height(&self, height: f64) {
		self.state.lock().viewport_height = height;
	}
}

impl Dom for MemoryDom {
	fn candidates(&self) -> Vec<NodeId> {
		self.state
			.lock()
			.elements
			.iter()
			.filter(|(_, e)| !e.detached && !e.attrs.contains_key("data-lazy-loaded"))
			.map(|(node, _)| *node)
			.collect()
	}

	fn tag(&self, node: NodeId) -> Option<ElementTag> {
		self.state.lock().elements.get(&node).filter(|e| !e.detached).map(|e| e.tag)
	}

	fn attr(&self, node: NodeId, name: &str) -> Option<String> {
		self.get_attr(node, name)
	}

	fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), BindError> {
		let mut guard = self.state.lock();
		let st = &mut *guard;
		if !name.starts_with("data-") {
			if let Some(remaining) = st.failing.get_mut(&node).filter(|r| **r > 0) {
				*remaining -= 1;
				return Err(BindError::Rejected {
					name: name.to_string(),
					reason: "injected failure".to_string(),
				});
			}
		}
		let Some(e) = st.elements.get_mut(&node).filter(|e| !e.detached) else {
			return Err(BindError::Detached(node));
		};
		e.attrs.insert(name.to_string(), value.to_string());
		st.writes.push(Write {
			node,
			name: name.to_string(),
			value: value.to_string(),
		});
		Ok(())
	}

	fn remove_attr(&mut self, node: NodeId, name: &str) {
		if let Some(e) = self.state.lock().elements.get_mut(&node) {
			e.attrs.remove(name);
		}
	}

	fn style(&self, node: NodeId, property: &str) -> Option<String> {
		self.get_style(node, property)
	}

	fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), BindError> {
		let mut guard = self.state.lock();
		let st = &mut *guard;
		let Some(e) = st.elements.get_mut(&node).filter(|e| !e.detached) else {
			return Err(BindError::Detached(node));
		};
		e.styles.insert(property.to_string(), value.to_string());
		st.writes.push(Write {
			node,
			name: format!("style:{property}"),
			value: value.to_string(),
		});
		Ok(())
	}

	fn add_class(&mut self, node: NodeId, class: &str) {
		if let Some(e) = self.state.lock().elements.get_mut(&node) {
			e.classes.push(class.to_string());
		}
	}

	fn viewport_height(&self) -> f64 {
		self.state.lock().viewport_height
	}

	fn base_url(&self) -> Option<Url> {
		self.state.lock().base_url.clone()
	}
}

#[derive(Debug, Default)]
struct DetectorState {
	created: Vec<(ResourceKind, DetectorOptions)>,
	live: [bool; 4],
	observed: [BTreeSet<NodeId>; 4],
	margins: [f64; 4],
	disconnects: usize,
	unsupported: bool,
}

/// Detector factory that records every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryDetectors {
	state: Arc<Mutex<DetectorState>>,
}

impl MemoryDetectors {
	pub fn observed(&self, kind: ResourceKind) -> Vec<NodeId> {
		self.state.lock().observed[kind.index()].iter().copied().collect()
	}

	pub fn is_observed(&self, kind: ResourceKind, node: NodeId) -> bool {
		self.state.lock().observed[kind.index()].contains(&node)
	}

	/// Total nodes observed across all kinds.
	pub fn observed_count(&self) -> usize {
		self.state.lock().observed.iter().map(BTreeSet::len).sum()
	}

	/// Number of detectors created for `kind` so far.
	pub fn created(&self, kind: ResourceKind) -> usize {
		self.state.lock().created.iter().filter(|(k, _)| *k == kind).count()
	}

	/// Options of the most recently created detector for `kind`.
	pub fn last_options(&self, kind: ResourceKind) -> Option<DetectorOptions> {
		self.state.lock().created.iter().rev().find(|(k, _)| *k == kind).map(|(_, o)| *o)
	}

	pub fn is_live(&self, kind: ResourceKind) -> bool {
		self.state.lock().live[kind.index()]
	}

	pub fn margin(&self, kind: ResourceKind) -> f64 {
		self.state.lock().margins[kind.index()]
	}

	pub fn disconnects(&self) -> usize {
		self.state.lock().disconnects
	}

	/// Makes every later `create` call fail as unsupported.
	pub fn set_unsupported(&self, unsupported: bool) {
		self.state.lock().unsupported = unsupported;
	}
}

impl DetectorFactory for MemoryDetectors {
	fn create(&mut self, kind: ResourceKind, options: DetectorOptions) -> Result<Box<dyn Detector>, HostError> {
		let mut st = self.state.lock();
		if st.unsupported {
			return Err(HostError::Unsupported("intersection observer"));
		}
		st.created.push((kind, options));
		st.live[kind.index()] = true;
		st.margins[kind.index()] = options.margin_px;
		Ok(Box::new(MemoryDetector {
			kind,
			state: Arc::clone(&self.state),
		}))
	}
}

struct MemoryDetector {
	kind: ResourceKind,
	state: Arc<Mutex<DetectorState>>,
}

impl Detector for MemoryDetector {
	fn observe(&mut self, node: NodeId) {
		self.state.lock().observed[self.kind.index()].insert(node);
	}

	fn unobserve(&mut self, node: NodeId) {
		self.state.lock().observed[self.kind.index()].remove(&node);
	}

	fn set_margin(&mut self, margin_px: f64) {
		self.state.lock().margins[self.kind.index()] = margin_px;
	}

	fn disconnect(&mut self) {
		let mut st = self.state.lock();
		let i = self.kind.index();
		st.observed[i].clear();
		st.live[i] = false;
		st.disconnects += 1;
	}
}

#[derive(Debug, Default)]
struct WatcherState {
	connected: bool,
	connects: usize,
	unsupported: bool,
}

/// Mutation watcher that only tracks its connection state.
#[derive(Debug, Clone, Default)]
pub struct MemoryWatcher {
	state: Arc<Mutex<WatcherState>>,
}

impl MemoryWatcher {
	pub fn is_connected(&self) -> bool {
		self.state.lock().connected
	}

	pub fn connects(&self) -> usize {
		self.state.lock().connects
	}

	pub fn set_unsupported(&self, unsupported: bool) {
		self.state.lock().unsupported = unsupported;
	}
}

impl MutationWatcher for MemoryWatcher {
	fn connect(&mut self) -> Result<(), HostError> {
		let mut st = self.state.lock();
		if st.unsupported {
			return Err(HostError::Unsupported("mutation observer"));
		}
		st.connected = true;
		st.connects += 1;
		Ok(())
	}

	fn disconnect(&mut self) {
		self.state.lock().connected = false;
	}
}

#[derive(Debug, Default)]
struct SessionState {
	entries: BTreeMap<String, String>,
	read_only: bool,
}

/// Session store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
	state: Arc<Mutex<SessionState>>,
}

impl MemorySession {
	pub fn raw(&self, key: &str) -> Option<String> {
		self.state.lock().entries.get(key).cloned()
	}

	pub fn put_raw(&self, key: &str, value: &str) {
		self.state.lock().entries.insert(key.to_string(), value.to_string());
	}

	/// Makes every later write fail with [`StoreError::QuotaExceeded`].
	pub fn set_read_only(&self, read_only: bool) {
		self.state.lock().read_only = read_only;
	}
}

impl SessionStore for MemorySession {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.raw(key))
	}

	fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
		let mut st = self.state.lock();
		if st.read_only {
			return Err(StoreError::QuotaExceeded);
		}
		st.entries.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&mut self, key: &str) -> Result<(), StoreError> {
		let mut st = self.state.lock();
		if st.read_only {
			return Err(StoreError::Unavailable("read-only".to_string()));
		}
		st.entries.remove(key);
		Ok(())
	}
}

/// One recorded resource hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
	DnsPrefetch(String),
	Preload(String, PreloadAs),
}

/// Hint sink that records every hint.
#[derive(Debug, Clone, Default)]
pub struct MemoryHints {
	hints: Arc<Mutex<Vec<Hint>>>,
}

impl MemoryHints {
	pub fn hints(&self) -> Vec<Hint> {
		self.hints.lock().clone()
	}
}

impl HintSink for MemoryHints {
	fn dns_prefetch(&mut self, host: &str) {
		self.hints.lock().push(Hint::DnsPrefetch(host.to_string()));
	}

	fn preload(&mut self, url: &str, destination: PreloadAs) {
		self.hints.lock().push(Hint::Preload(url.to_string(), destination));
	}
}

#[derive(Debug, Default)]
struct CacheState {
	urls: Vec<String>,
	rejecting: bool,
}

/// Resource cache that records added URLs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
	state: Arc<Mutex<CacheState>>,
}

impl MemoryCache {
	pub fn urls(&self) -> Vec<String> {
		self.state.lock().urls.clone()
	}

	pub fn set_rejecting(&self, rejecting: bool) {
		self.state.lock().rejecting = rejecting;
	}
}

impl ResourceCache for MemoryCache {
	fn add(&mut self, url: &str) -> Result<(), HostError> {
		let mut st = self.state.lock();
		if st.rejecting {
			return Err(HostError::Other(format!("cache refused {url}")));
		}
		st.urls.push(url.to_string());
		Ok(())
	}
}

/// A complete in-memory host.
///
/// Keep this value around to inspect or poke the state after handing
/// [`MemoryHost::host`] to an engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
	pub dom: MemoryDom,
	pub detectors: MemoryDetectors,
	pub watcher: MemoryWatcher,
	pub session: MemorySession,
	pub hints: MemoryHints,
	pub cache: MemoryCache,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Boxed collaborators sharing state with `self`.
	pub fn host(&self) -> Host {
		Host {
			dom: Box::new(self.dom.clone()),
			detectors: Box::new(self.detectors.clone()),
			mutations: Box::new(self.watcher.clone()),
			session: Box::new(self.session.clone()),
			hints: Box::new(self.hints.clone()),
			cache: Some(Box::new(self.cache.clone())),
		}
	}
}
