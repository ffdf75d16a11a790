//! The lazy-load engine.
//!
//! One [`Engine`] owns every map the scheduler needs and is driven entirely
//! by its caller: host notifications come in through `on_*` methods, frame
//! coalescing through [`Engine::on_frame`], and every delay through
//! [`Engine::advance`]. Nothing runs in the background.
//!
//! Split by concern:
//! - `lifecycle`: start, pause, resume, cleanup, re-scan and registration
//! - `activation`: intersection passes, admission, binding, finalize, retries

use std::time::Instant;

use laze_config::Config;
use laze_primitives::{DescriptorState, NodeId};

use crate::batch::{BatchEvent, PassId, Passes};
use crate::budget::Budget;
use crate::descriptor::{Descriptor, DescriptorIdx, Descriptors};
use crate::detector::DetectorSet;
use crate::error::EngineError;
use crate::graph::Graph;
use crate::hooks::Hooks;
use crate::host::Host;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::queue::{PriorityQueue, ScrollDirection, TierWeights};
use crate::retry::RetryTable;
use crate::session::SessionState;
use crate::timer::{TimerId, TimerQueue};

mod activation;
mod lifecycle;

/// Coarse engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	/// Constructed, [`Engine::start`] not called yet.
	Idle,
	Running,
	/// Detectors and the mutation watcher are disconnected; state is kept.
	Paused,
	/// Setup failed; everything was activated eagerly and the engine stopped.
	Halted,
	/// [`Engine::cleanup`] ran. Terminal.
	TornDown,
}

/// Handle returned by [`Engine::on_batch_loaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener for batch-completion events.
pub type BatchListener = Box<dyn FnMut(&BatchEvent) + Send>;

#[derive(Debug, Clone, Copy)]
enum Timer {
	Activate { idx: DescriptorIdx, pass: PassId },
	Retry { idx: DescriptorIdx },
	ObserveTimeout { idx: DescriptorIdx },
	Rescan,
}

/// Lazy-load scheduler for one document.
pub struct Engine {
	config: Config,
	hooks: Hooks,
	host: Host,
	lifecycle: Lifecycle,
	descriptors: Descriptors,
	queue: PriorityQueue,
	weights: TierWeights,
	detectors: DetectorSet,
	graph: Graph,
	retries: RetryTable,
	session: SessionState,
	metrics: Metrics,
	budget: Budget,
	timers: TimerQueue<Timer>,
	passes: Passes,
	rescan_timer: Option<TimerId>,
	listeners: Vec<(SubscriptionId, BatchListener)>,
	next_subscription: u64,
	id_seq: u64,
	started_at: Option<Instant>,
}

impl Engine {
	pub fn new(config: Config, hooks: Hooks, host: Host) -> Self {
		let weights = TierWeights::new(config.weights, config.scroll_weights);
		Self {
			config,
			hooks,
			host,
			lifecycle: Lifecycle::Idle,
			descriptors: Descriptors::default(),
			queue: PriorityQueue::default(),
			weights,
			detectors: DetectorSet::default(),
			graph: Graph::default(),
			retries: RetryTable::default(),
			session: SessionState::default(),
			metrics: Metrics::default(),
			budget: Budget::default(),
			timers: TimerQueue::default(),
			passes: Passes::default(),
			rescan_timer: None,
			listeners: Vec::new(),
			next_subscription: 0,
			id_seq: 0,
			started_at: None,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.lifecycle
	}

	pub fn state_of(&self, node: NodeId) -> Option<DescriptorState> {
		self.descriptor(node).map(|d| d.state)
	}

	pub fn descriptor(&self, node: NodeId) -> Option<&Descriptor> {
		self.descriptors.by_node(node).map(|idx| self.descriptors.get(idx))
	}

	pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
		self.descriptors.iter().map(|(_, d)| d)
	}

	/// Direction of the last scroll signal, which decides the tier weights.
	pub fn scroll_direction(&self) -> ScrollDirection {
		self.weights.direction()
	}

	pub fn budget_spent(&self) -> u32 {
		self.budget.spent()
	}

	/// Whether the session map records `id` as loaded.
	pub fn is_session_loaded(&self, id: &str) -> bool {
		self.session.is_loaded(id)
	}

	/// Subscribes to batch-completion events.
	pub fn on_batch_loaded(&mut self, listener: impl FnMut(&BatchEvent) + Send + 'static) -> SubscriptionId {
		let id = SubscriptionId(self.next_subscription);
		self.next_subscription += 1;
		self.listeners.push((id, Box::new(listener)));
		id
	}

	/// Removes a listener. Returns `false` if it was not subscribed.
	pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
		let before = self.listeners.len();
		self.listeners.retain(|(sub, _)| *sub != id);
		self.listeners.len() != before
	}

	pub fn export_metrics(&self) -> MetricsSnapshot {
		self.metrics.snapshot(self.budget.spent())
	}

	fn is_active(&self) -> bool {
		matches!(self.lifecycle, Lifecycle::Running | Lifecycle::Paused)
	}

	fn emit(&mut self, event: BatchEvent) {
		tracing::debug!(pass = event.pass.0, loaded = event.entries.len(), budget = self.budget.spent(), "laze.batch_loaded");
		for (_, listener) in &mut self.listeners {
			listener(&event);
		}
	}

	/// Routes an error to the log, the error-policy hook and the audit log.
	fn report(&mut self, error: EngineError, idx: Option<DescriptorIdx>) {
		let (node, id) = match idx {
			Some(idx) => {
				let d = self.descriptors.get(idx);
				(Some(d.node), Some(d.id.clone()))
			}
			None => (None, None),
		};
		tracing::warn!(node = ?node, id = ?id, error = %error, "laze.error");
		self.hooks.report(&error, node);
		self.metrics.record_error(id.as_deref(), &error);
	}

	fn cancel_timeout(&mut self, idx: DescriptorIdx) {
		if let Some(timer) = self.descriptors.get_mut(idx).timeout_timer.take() {
			self.timers.cancel(timer);
		}
	}
}
