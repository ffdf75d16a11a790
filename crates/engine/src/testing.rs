//! Deterministic fixtures shared by engine and invariant tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use laze_config::Config;
use laze_primitives::{ElementTag, IntersectionEntry, NodeId, ResourceKind};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::batch::BatchEvent;
use crate::engine::Engine;
use crate::hooks::Hooks;
use crate::host::memory::MemoryHost;

/// Routes engine logs to the test writer; filter with `RUST_LOG`.
pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// An engine over a [`MemoryHost`] with a virtual clock.
pub(crate) struct Harness {
	pub(crate) mem: MemoryHost,
	pub(crate) engine: Engine,
	pub(crate) t0: Instant,
	pub(crate) events: Arc<Mutex<Vec<BatchEvent>>>,
}

impl Harness {
	pub(crate) fn new(config: Config) -> Self {
		Self::with_hooks(config, Hooks::default())
	}

	pub(crate) fn with_hooks(config: Config, hooks: Hooks) -> Self {
		init_tracing();
		let mem = MemoryHost::new();
		let mut engine = Engine::new(config, hooks, mem.host());
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&events);
		engine.on_batch_loaded(move |event| sink.lock().push(event.clone()));
		Self {
			mem,
			engine,
			t0: Instant::now(),
			events,
		}
	}

	pub(crate) fn at(&self, ms: u64) -> Instant {
		self.t0 + Duration::from_millis(ms)
	}

	pub(crate) fn img(&self, id: &str, attrs: &[(&str, &str)]) -> NodeId {
		let src = format!("/{id}.png");
		let mut all = vec![("data-id", id), ("src", src.as_str())];
		all.extend_from_slice(attrs);
		self.mem.dom.insert(ElementTag::Img, &all)
	}

	pub(crate) fn start(&mut self) {
		self.engine.start(self.t0).expect("start");
	}

	/// Delivers one notification for `kind` and runs the frame at `ms`.
	pub(crate) fn frame(&mut self, kind: ResourceKind, entries: &[(NodeId, bool)], ms: u64) {
		let entries = entries
			.iter()
			.enumerate()
			.map(|(i, (node, visible))| IntersectionEntry::new(*node, *visible, 400.0 + i as f64))
			.collect();
		self.engine.on_intersections(kind, entries);
		self.engine.on_frame(self.at(ms));
	}

	pub(crate) fn show(&mut self, kind: ResourceKind, nodes: &[NodeId], ms: u64) {
		let entries: Vec<_> = nodes.iter().map(|n| (*n, true)).collect();
		self.frame(kind, &entries, ms);
	}

	pub(crate) fn advance(&mut self, ms: u64) {
		self.engine.advance(self.at(ms));
	}

	pub(crate) fn events(&self) -> Vec<BatchEvent> {
		self.events.lock().clone()
	}
}
