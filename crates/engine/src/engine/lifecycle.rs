use std::time::Instant;

use laze_config::ConfigPatch;
use laze_primitives::DescriptorState;
use rustc_hash::FxHashSet;

use super::{Engine, Lifecycle, Timer};
use crate::descriptor::{DescriptorIdx, Descriptors};
use crate::error::{EngineError, Result};
use crate::host::{DetectorOptions, HostError};
use crate::scan::{self, Scanned};
use crate::session::SessionState;

fn fresh_id(seq: &mut u64, descriptors: &Descriptors) -> String {
	loop {
		let id = scan::generated_id(*seq);
		*seq += 1;
		if !descriptors.contains_id(&id) {
			return id;
		}
	}
}

impl Engine {
	/// Loads the session map, connects the mutation watcher and runs the initial scan.
	///
	/// If a host capability is missing, every managed element is activated
	/// eagerly and the engine halts. Calling this twice is a no-op.
	pub fn start(&mut self, now: Instant) -> Result<()> {
		match self.lifecycle {
			Lifecycle::TornDown => return Err(EngineError::TornDown),
			Lifecycle::Idle => {}
			_ => return Ok(()),
		}
		self.started_at = Some(now);
		match SessionState::load(self.host.session.as_ref()) {
			Ok(session) => self.session = session,
			Err(e) => self.report(e, None),
		}
		self.lifecycle = Lifecycle::Running;
		if let Err(e) = self.host.mutations.connect() {
			self.fail_setup("mutation observer", e, now);
			return Ok(());
		}
		tracing::debug!(session_loaded = self.session.len(), "laze.started");
		self.scan_pass(now);
		Ok(())
	}

	/// Disconnects detectors and the mutation watcher, keeping all state.
	pub fn pause(&mut self) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		self.detectors.disconnect_all();
		self.host.mutations.disconnect();
		if let Some(timer) = self.rescan_timer.take() {
			self.timers.cancel(timer);
		}
		self.lifecycle = Lifecycle::Paused;
		tracing::debug!(pending_timers = self.timers.len(), "laze.paused");
	}

	/// Reconnects and re-scans. Only descriptors still observing are re-registered.
	pub fn resume(&mut self, now: Instant) {
		if self.lifecycle != Lifecycle::Paused {
			return;
		}
		self.lifecycle = Lifecycle::Running;
		if let Err(e) = self.host.mutations.connect() {
			self.fail_setup("mutation observer", e, now);
			return;
		}
		tracing::debug!("laze.resumed");
		self.scan_pass(now);
	}

	/// Releases every detector, timer, listener and index. Idempotent.
	pub fn cleanup(&mut self) {
		if self.lifecycle == Lifecycle::TornDown {
			return;
		}
		if self.passes.open_count() > 0 {
			tracing::debug!(open = self.passes.open_count(), "laze.cleanup_abandons_passes");
		}
		self.detectors.disconnect_all();
		self.host.mutations.disconnect();
		self.timers.clear();
		self.retries.clear();
		self.graph.clear();
		self.queue.clear();
		self.passes.clear();
		self.listeners.clear();
		self.rescan_timer = None;
		self.lifecycle = Lifecycle::TornDown;
		tracing::debug!(descriptors = self.descriptors.len(), "laze.cleanup");
	}

	/// Wipes the session map, in memory and in the store.
	pub fn clear_state(&mut self) -> Result<()> {
		if self.lifecycle == Lifecycle::TornDown {
			return Err(EngineError::TornDown);
		}
		self.session.clear(self.host.session.as_mut())
	}

	/// Merges `patch` into the configuration and re-scans.
	///
	/// Margin or threshold changes rebuild the detectors. An invalid patch is
	/// rejected and leaves the configuration untouched.
	pub fn update_config(&mut self, patch: ConfigPatch, now: Instant) -> Result<()> {
		if self.lifecycle == Lifecycle::TornDown {
			return Err(EngineError::TornDown);
		}
		let rebuild = patch.touches_detectors();
		let timeout_before = self.config.timeout();
		self.config.apply(patch)?;
		self.weights.reconfigure(self.config.weights, self.config.scroll_weights);
		if rebuild {
			self.detectors.disconnect_all();
		}
		if self.config.timeout() != timeout_before {
			self.rearm_timeouts();
		}
		tracing::debug!(rebuild, "laze.config_updated");
		self.scan_pass(now);
		Ok(())
	}

	/// Moves every armed observe timeout to `observe_start + timeout`.
	///
	/// A deadline already in the past fires on the next `advance`.
	fn rearm_timeouts(&mut self) {
		let timeout = self.config.timeout();
		for idx in self.descriptors.indices() {
			let d = self.descriptors.get(idx);
			let (Some(start), Some(timer)) = (d.observe_start, d.timeout_timer) else {
				continue;
			};
			self.timers.cancel(timer);
			let timer = self.timers.schedule(start + timeout, Timer::ObserveTimeout { idx });
			self.descriptors.get_mut(idx).timeout_timer = Some(timer);
		}
	}

	/// Schedules a debounced re-scan after elements were added.
	pub fn on_mutation(&mut self, now: Instant) {
		self.schedule_rescan(now);
	}

	pub fn on_resize(&mut self, now: Instant) {
		self.schedule_rescan(now);
	}

	/// Adjusts tier weights to the scroll direction and schedules a re-scan.
	pub fn on_scroll(&mut self, scroll_y: f64, now: Instant) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		let direction = self.weights.on_scroll(scroll_y);
		tracing::trace!(scroll_y, ?direction, "laze.scroll");
		self.schedule_rescan(now);
	}

	fn schedule_rescan(&mut self, now: Instant) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		if let Some(timer) = self.rescan_timer.take() {
			self.timers.cancel(timer);
		}
		self.rescan_timer = Some(self.timers.schedule(now + self.config.rescan_debounce(), Timer::Rescan));
	}

	/// Normalizes candidates not seen before. Returns the new arena indices.
	fn scan_new(&mut self) -> Vec<DescriptorIdx> {
		let mut added = Vec::new();
		for node in self.host.dom.candidates() {
			if self.descriptors.by_node(node).is_some() {
				continue;
			}
			let session = &self.session;
			let descriptors = &self.descriptors;
			let id_seq = &mut self.id_seq;
			let scanned = scan::scan_element(
				self.host.dom.as_mut(),
				node,
				|id| session.is_loaded(id),
				|| fresh_id(id_seq, descriptors),
			);
			match scanned {
				Scanned::Skip(cause) => tracing::trace!(%node, ?cause, "laze.scan_skip"),
				Scanned::Managed(mut descriptor) => {
					if self.descriptors.contains_id(&descriptor.id) {
						let id = fresh_id(&mut self.id_seq, &self.descriptors);
						tracing::debug!(%node, duplicate = %descriptor.id, %id, "laze.id_reassigned");
						let _ = self.host.dom.set_attr(node, "data-id", &id);
						descriptor.id = id;
					}
					let idx = self.descriptors.insert(*descriptor);
					if let Some(group) = self.descriptors.get(idx).group.clone() {
						self.graph.register_group(&group, idx);
					}
					added.push(idx);
				}
			}
		}
		added
	}

	/// Scan, enqueue and register.
	pub(super) fn scan_pass(&mut self, now: Instant) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		let added = self.scan_new();
		for &idx in &added {
			self.enqueue(idx);
		}
		for idx in self.descriptors.indices() {
			let d = self.descriptors.get(idx);
			if d.state == DescriptorState::Observing && !self.detectors.is_observed(d.kind, d.node) {
				self.queue.push(d.priority, idx);
			}
		}
		for (_, idx) in self.queue.drain() {
			if self.lifecycle != Lifecycle::Running {
				break;
			}
			self.register(idx, now);
		}
		tracing::debug!(scanned = added.len(), observed = self.detectors.observed_count(), "laze.scan");
	}

	/// Routes a freshly scanned descriptor to its priority bucket, or parks it
	/// on its prerequisite.
	fn enqueue(&mut self, idx: DescriptorIdx) {
		let d = self.descriptors.get(idx);
		let (node, priority) = (d.node, d.priority);
		if let Some(prerequisite) = d.depends_on.clone() {
			if !self.session.is_loaded(&prerequisite) {
				tracing::debug!(%node, %prerequisite, "laze.waiting");
				self.graph.register_dependency(&prerequisite, idx);
				return;
			}
		}
		if self.descriptors.transition(idx, DescriptorState::Queued) {
			let d = self.descriptors.get(idx);
			tracing::debug!(%node, id = %d.id, kind = d.kind.as_str(), %priority, "laze.queued");
			self.queue.push(priority, idx);
		}
	}

	/// Hands a descriptor to its kind's detector.
	///
	/// While paused the descriptor only moves to `Observing`; resume registers it.
	pub(super) fn register(&mut self, idx: DescriptorIdx, now: Instant) {
		if !self.is_active() {
			return;
		}
		match self.descriptors.get(idx).state {
			DescriptorState::Queued | DescriptorState::Retrying => {
				self.descriptors.transition(idx, DescriptorState::Observing);
			}
			DescriptorState::Observing => {}
			_ => return,
		}
		if self.lifecycle != Lifecycle::Running {
			return;
		}

		let d = self.descriptors.get(idx);
		let (kind, node) = (d.kind, d.node);
		let options = DetectorOptions {
			margin_px: self.config.root_margins.for_priority(d.priority),
			threshold: self.config.thresholds.for_kind(kind),
		};
		if let Err(e) = self.detectors.observe(self.host.detectors.as_mut(), kind, node, options) {
			self.fail_setup("intersection observer", e, now);
			return;
		}

		if self.descriptors.get(idx).observe_start.is_none() {
			let timer = self.timers.schedule(now + self.config.timeout(), Timer::ObserveTimeout { idx });
			let d = self.descriptors.get_mut(idx);
			d.observe_start = Some(now);
			d.timeout_timer = Some(timer);
		}
	}

	/// Eagerly activates everything, then halts.
	fn fail_setup(&mut self, capability: &'static str, cause: HostError, now: Instant) {
		self.lifecycle = Lifecycle::Halted;
		self.report(
			EngineError::Setup {
				capability,
				reason: cause.to_string(),
			},
			None,
		);
		self.detectors.disconnect_all();
		self.host.mutations.disconnect();
		self.timers.clear();
		self.rescan_timer = None;
		self.queue.clear();

		let activated = self.eager_fallback(now);
		self.retries.clear();
		self.passes.clear();
		tracing::warn!(capability, activated, "laze.halted");
	}

	/// Binds every managed element without prioritization or admission checks.
	///
	/// Prerequisites are still honored: descriptors run in rounds until no
	/// waiting descriptor becomes eligible. Oversized descriptors are skipped.
	fn eager_fallback(&mut self, now: Instant) -> usize {
		self.scan_new();
		let mut attempted = FxHashSet::default();
		let mut activated = 0;
		loop {
			let mut progressed = false;
			for idx in self.descriptors.indices() {
				let d = self.descriptors.get(idx);
				if d.state.is_terminal() || attempted.contains(&idx) {
					continue;
				}
				if d.size_estimate > self.config.max_size {
					attempted.insert(idx);
					self.skip_oversized(idx);
					continue;
				}
				if d.depends_on.as_deref().is_some_and(|p| !self.session.is_loaded(p)) {
					continue;
				}
				attempted.insert(idx);
				progressed = true;
				match self.bind(idx) {
					Ok(()) => {
						self.finalize(idx, None, now, false);
						activated += 1;
					}
					Err(e) => self.report(EngineError::Bind(e), Some(idx)),
				}
			}
			if !progressed {
				break;
			}
		}
		activated
	}
}
