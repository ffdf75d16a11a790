use std::time::Instant;

use laze_config::RetryAdmission;
use laze_primitives::{DescriptorState, IntersectionEntry, PreloadAs, Priority, ResourceKind};
use url::Url;

use super::{Engine, Lifecycle, Timer};
use crate::batch::{Candidate, LoadedEntry, PassId, sort_batch};
use crate::descriptor::DescriptorIdx;
use crate::error::EngineError;
use crate::host::BindError;
use crate::retry::RetryDecision;

fn resolve(base: Option<Url>, raw: &str) -> Option<Url> {
	match base {
		Some(base) => base.join(raw).ok(),
		None => Url::parse(raw).ok(),
	}
}

impl Engine {
	/// Accepts a detector notification for the next frame.
	///
	/// A notification that arrives before the previous one for the same kind
	/// was processed replaces it.
	pub fn on_intersections(&mut self, kind: ResourceKind, entries: Vec<IntersectionEntry>) {
		if self.lifecycle != Lifecycle::Running {
			tracing::trace!(target: "laze::frame", kind = kind.as_str(), "coalesce.ignored");
			return;
		}
		if self.detectors.offer(kind, entries) {
			tracing::trace!(target: "laze::frame", kind = kind.as_str(), "coalesce.replaced");
		}
	}

	/// Whether a notification is waiting for [`Engine::on_frame`].
	pub fn wants_frame(&self) -> bool {
		self.lifecycle == Lifecycle::Running && self.detectors.wants_frame()
	}

	/// Processes the pending notification of every detector, one pass each.
	pub fn on_frame(&mut self, now: Instant) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		self.budget.refresh(&self.config.budget, now);
		for (kind, entries) in self.detectors.take_pending() {
			if self.lifecycle != Lifecycle::Running {
				break;
			}
			self.run_pass(kind, entries, now);
		}
		self.release_idle();
	}

	/// Earliest pending timer, if any.
	pub fn next_deadline(&mut self) -> Option<Instant> {
		if !self.is_active() {
			return None;
		}
		self.timers.next_deadline()
	}

	/// Fires every timer due at `now`.
	pub fn advance(&mut self, now: Instant) {
		if !self.is_active() {
			return;
		}
		self.budget.refresh(&self.config.budget, now);
		while let Some((_, timer)) = self.timers.pop_due(now) {
			match timer {
				Timer::Activate { idx, pass } => {
					self.activate(idx, Some(pass), now);
					if let Some(event) = self.passes.release(pass) {
						self.emit(event);
					}
				}
				Timer::Retry { idx } => {
					self.retries.take_timer(idx);
					if self.descriptors.get(idx).state == DescriptorState::Retrying {
						tracing::debug!(node = %self.descriptors.get(idx).node, "laze.retry_registered");
						self.register(idx, now);
					}
				}
				Timer::ObserveTimeout { idx } => {
					let d = self.descriptors.get_mut(idx);
					d.timeout_timer = None;
					if d.state == DescriptorState::Observing && !d.intersected {
						self.time_out(idx);
					}
				}
				Timer::Rescan => {
					self.rescan_timer = None;
					self.scan_pass(now);
				}
			}
			if !self.is_active() {
				break;
			}
		}
		self.release_idle();
	}

	fn release_idle(&mut self) {
		if self.lifecycle != Lifecycle::Running {
			return;
		}
		let released = self.detectors.release_idle();
		if released > 0 {
			tracing::debug!(released, "laze.detectors_idle");
		}
	}

	/// One coalesced pass over a detector notification.
	fn run_pass(&mut self, kind: ResourceKind, entries: Vec<IntersectionEntry>, now: Instant) {
		let pass = self.passes.open();
		self.budget.start_pass(&self.config.budget);
		let viewport_height = self.host.dom.viewport_height();

		let mut batch: Vec<Candidate> = entries
			.into_iter()
			.filter_map(|entry| {
				let idx = self.descriptors.by_node(entry.node)?;
				let d = self.descriptors.get(idx);
				let live = d.kind == kind && d.state == DescriptorState::Observing && self.detectors.is_observed(kind, d.node);
				live.then(|| Candidate {
					idx,
					entry,
					score: self.weights.weight(d.priority) + self.config.kind_bonus.for_tag(d.tag),
					distance: entry.center_distance(viewport_height),
				})
			})
			.collect();
		sort_batch(&mut batch);
		tracing::trace!(target: "laze::frame", pass = pass.0, kind = kind.as_str(), entries = batch.len(), "pass.start");

		for (index, c) in batch.iter().enumerate() {
			if self.lifecycle != Lifecycle::Running {
				break;
			}
			// an earlier entry's group activation may already have taken it
			if self.descriptors.get(c.idx).state != DescriptorState::Observing {
				continue;
			}
			if c.entry.is_intersecting {
				self.descriptors.get_mut(c.idx).intersected = true;
				if !self.hooks.admits(self.descriptors.get(c.idx)) {
					tracing::trace!(node = %c.entry.node, "laze.admission_deferred");
					continue;
				}
				self.admit(c.idx, index, pass, now);
			} else if self.observe_expired(c.idx, now) {
				self.time_out(c.idx);
			}
		}

		if let Some(event) = self.passes.seal(pass) {
			self.emit(event);
		}
	}

	fn observe_expired(&self, idx: DescriptorIdx, now: Instant) -> bool {
		let timeout = self.config.timeout();
		self.descriptors
			.get(idx)
			.observe_start
			.is_some_and(|start| now.saturating_duration_since(start) > timeout)
	}

	/// Budget and size checks, then schedule activation behind the strategy delay.
	fn admit(&mut self, idx: DescriptorIdx, index: usize, pass: PassId, now: Instant) {
		let bypass = self.config.retry_admission == RetryAdmission::BypassLimits && self.retries.retries(idx) > 0;
		let d = self.descriptors.get(idx);
		if !bypass && self.budget.exhausted(&self.config.budget) {
			tracing::debug!(node = %d.node, spent = self.budget.spent(), "laze.budget_deferred");
			self.metrics.record_budget_deferral();
			return;
		}
		if !bypass && d.size_estimate > self.config.max_size {
			self.skip_oversized(idx);
			return;
		}

		let delay = self.hooks.delay(&d.strategy, index, &self.config);
		self.descriptors.transition(idx, DescriptorState::Activating);
		if delay.is_zero() {
			self.activate(idx, Some(pass), now);
		} else {
			self.passes.hold(pass);
			self.timers.schedule(now + delay, Timer::Activate { idx, pass });
			tracing::trace!(node = %self.descriptors.get(idx).node, delay_ms = delay.as_millis() as u64, "laze.activation_scheduled");
		}
	}

	pub(super) fn skip_oversized(&mut self, idx: DescriptorIdx) {
		if !self.descriptors.transition(idx, DescriptorState::Skipped) {
			return;
		}
		self.cancel_timeout(idx);
		let d = self.descriptors.get(idx);
		let (node, kind) = (d.node, d.kind);
		tracing::debug!(%node, id = %d.id, size = d.size_estimate, max = self.config.max_size, "laze.skipped_oversized");
		self.metrics.record_oversized(&d.id);
		self.detectors.unobserve(kind, node);
	}

	fn time_out(&mut self, idx: DescriptorIdx) {
		if !self.descriptors.transition(idx, DescriptorState::TimedOut) {
			return;
		}
		self.cancel_timeout(idx);
		let d = self.descriptors.get(idx);
		let (node, kind) = (d.node, d.kind);
		tracing::debug!(%node, id = %d.id, "laze.timeout");
		self.metrics.record_timeout(&d.id);
		self.detectors.unobserve(kind, node);
	}

	/// Runs after the strategy delay: dependency gate, bind, finalize.
	fn activate(&mut self, idx: DescriptorIdx, pass: Option<PassId>, now: Instant) {
		if !self.is_active() || self.descriptors.get(idx).state != DescriptorState::Activating {
			return;
		}
		let d = self.descriptors.get(idx);
		if let Some(prerequisite) = d.depends_on.clone() {
			if !self.session.is_loaded(&prerequisite) {
				let (node, kind) = (d.node, d.kind);
				tracing::debug!(%node, %prerequisite, "laze.dependency_unmet");
				self.detectors.unobserve(kind, node);
				self.cancel_timeout(idx);
				self.descriptors.get_mut(idx).observe_start = None;
				self.descriptors.transition(idx, DescriptorState::Unregistered);
				self.graph.register_dependency(&prerequisite, idx);
				return;
			}
		}

		match self.bind(idx) {
			Ok(()) => {
				self.send_hints(idx);
				self.finalize(idx, pass, now, true);
			}
			Err(e) => self.fail_activation(idx, e, now),
		}
	}

	/// Writes the deferred value, cross-origin mode and background.
	pub(super) fn bind(&mut self, idx: DescriptorIdx) -> Result<(), BindError> {
		let d = self.descriptors.get(idx);
		let dom = self.host.dom.as_mut();
		if let Some(value) = &d.deferred_value {
			d.binding.set(dom, d.node, value)?;
			if let Some(mode) = &d.crossorigin {
				dom.set_attr(d.node, "crossorigin", mode)?;
			}
		}
		if let Some(background) = &d.background_value {
			dom.set_style(d.node, "background-image", &format!("url({background})"))?;
		}
		Ok(())
	}

	/// DNS-prefetch and preload for high priority, preload for unloaded group siblings.
	fn send_hints(&mut self, idx: DescriptorIdx) {
		let d = self.descriptors.get(idx);
		if d.priority == Priority::High {
			if let Some(url) = d.resource_url() {
				match resolve(self.host.dom.base_url(), url) {
					Some(resolved) => {
						if let Some(host) = resolved.host_str() {
							self.host.hints.dns_prefetch(host);
						}
					}
					None => tracing::debug!(node = %d.node, url, "laze.unresolvable_url"),
				}
				self.host.hints.preload(url, PreloadAs::for_tag(d.tag));
			}
		}
		if let Some(group) = &d.group {
			for sibling in self.graph.siblings(group, idx) {
				let s = self.descriptors.get(sibling);
				if s.state.is_terminal() {
					continue;
				}
				if let Some(url) = s.resource_url() {
					self.host.hints.preload(url, PreloadAs::for_tag(s.tag));
				}
			}
		}
	}

	/// Records a successful activation and cascades to the group and dependents.
	///
	/// A descriptor is finalized at most once; later calls are no-ops.
	pub(super) fn finalize(&mut self, idx: DescriptorIdx, pass: Option<PassId>, now: Instant, cascade_group: bool) {
		if !self.descriptors.transition(idx, DescriptorState::Loaded) {
			return;
		}
		self.cancel_timeout(idx);
		let d = self.descriptors.get(idx);
		let (node, kind, tag) = (d.node, d.kind, d.tag);
		let id = d.id.clone();
		let group = d.group.clone();
		let url = d.resource_url().map(str::to_string);

		let dom = self.host.dom.as_mut();
		dom.remove_attr(node, "data-lazy-placeholder");
		dom.remove_attr(node, "aria-hidden");
		if d.animated {
			let _ = dom.set_style(node, "animation-play-state", "running");
		}
		if let Some(class) = &d.animation_class {
			dom.add_class(node, class);
		}
		if let Err(e) = dom.set_attr(node, "data-lazy-loaded", "true") {
			tracing::trace!(%node, error = %e, "laze.marker_failed");
		}

		self.budget.charge(&self.config.budget);
		let budget = self.budget.spent();
		let load_time = now.saturating_duration_since(self.started_at.unwrap_or(now));
		self.metrics.record_loaded(&id, tag, load_time, budget);
		self.detectors.unobserve(kind, node);
		if let Some(timer) = self.retries.consume(idx) {
			self.timers.cancel(timer);
		}
		if self.session.mark_loaded(&id) {
			if let Err(e) = self.session.persist(self.host.session.as_mut()) {
				self.report(e, Some(idx));
			}
		}
		tracing::debug!(%node, id = %id, tag = tag.as_str(), budget, "laze.loaded");

		if let Some(pass) = pass {
			self.passes.record(
				pass,
				LoadedEntry {
					node,
					id: id.clone(),
					kind,
					tag,
					load_time,
					budget,
				},
			);
		}

		if cascade_group {
			if let Some(group) = group {
				self.activate_group(&group, idx, pass, now);
			}
		}

		for dependent in self.graph.consume_dependency(&id) {
			if self.descriptors.get(dependent).state != DescriptorState::Unregistered {
				continue;
			}
			self.descriptors.transition(dependent, DescriptorState::Queued);
			tracing::debug!(node = %self.descriptors.get(dependent).node, prerequisite = %id, "laze.dependency_released");
			self.register(dependent, now);
		}

		if let Some(url) = url {
			self.cache(idx, &url);
		}
	}

	/// Force-activates every eligible sibling, bypassing the visibility check.
	///
	/// Siblings that still wait on a prerequisite, exceed the size limit or
	/// are refused by the admission policy only got the preload hint.
	fn activate_group(&mut self, group: &str, trigger: DescriptorIdx, pass: Option<PassId>, now: Instant) {
		for sibling in self.graph.siblings(group, trigger) {
			let s = self.descriptors.get(sibling);
			let live = matches!(
				s.state,
				DescriptorState::Unregistered | DescriptorState::Queued | DescriptorState::Observing | DescriptorState::Retrying
			);
			if !live
				|| s.depends_on.as_deref().is_some_and(|p| !self.session.is_loaded(p))
				|| s.size_estimate > self.config.max_size
				|| !self.hooks.admits(s)
			{
				continue;
			}
			match self.bind(sibling) {
				Ok(()) => self.finalize(sibling, pass, now, false),
				Err(e) => self.report(EngineError::Bind(e), Some(sibling)),
			}
		}
	}

	/// Retry with linear backoff, or drop once the bound is reached.
	fn fail_activation(&mut self, idx: DescriptorIdx, error: BindError, now: Instant) {
		self.report(EngineError::Bind(error), Some(idx));
		let d = self.descriptors.get(idx);
		let (node, kind) = (d.node, d.kind);
		match self.retries.on_failure(idx, self.config.max_retries, self.config.retry_base_delay()) {
			RetryDecision::Scheduled { attempt, delay } => {
				self.descriptors.transition(idx, DescriptorState::Retrying);
				self.descriptors.get_mut(idx).retry_count = attempt;
				self.detectors.unobserve(kind, node);
				let timer = self.timers.schedule(now + delay, Timer::Retry { idx });
				self.retries.set_timer(idx, timer);
				self.metrics.record_retry();
				tracing::debug!(%node, attempt, delay_ms = delay.as_millis() as u64, "laze.retry_scheduled");
			}
			RetryDecision::Exhausted { retries } => {
				self.descriptors.transition(idx, DescriptorState::Dropped);
				self.cancel_timeout(idx);
				self.retries.consume(idx);
				self.detectors.unobserve(kind, node);
				let id = self.descriptors.get(idx).id.clone();
				self.metrics.record_dropped(&id, retries);
				tracing::warn!(%node, id = %id, retries, "laze.dropped");
			}
		}
	}

	fn cache(&mut self, idx: DescriptorIdx, url: &str) {
		if !self.config.enable_caching {
			return;
		}
		let result = match self.host.cache.as_mut() {
			Some(cache) => cache.add(url),
			None => return,
		};
		if let Err(e) = result {
			self.report(EngineError::Cache(e.to_string()), Some(idx));
		}
	}
}
