//! Behavioural options that are not plain data.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use laze_config::{Config, STRATEGY_IMMEDIATE, STRATEGY_STAGGERED};
use laze_primitives::NodeId;
use rustc_hash::FxHashMap;

use crate::descriptor::Descriptor;
use crate::error::EngineError;

/// Gate consulted for every visible, eligible descriptor.
pub type AdmissionPolicy = Arc<dyn Fn(&Descriptor) -> bool + Send + Sync>;
/// Receives every per-element and setup error.
pub type ErrorPolicy = Arc<dyn Fn(&EngineError, Option<NodeId>) + Send + Sync>;
/// Maps a descriptor's position in its batch to an activation delay.
pub type StrategyFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// Admission, error and strategy hooks.
#[derive(Clone, Default)]
pub struct Hooks {
	admission: Option<AdmissionPolicy>,
	error: Option<ErrorPolicy>,
	strategies: FxHashMap<String, StrategyFn>,
}

impl fmt::Debug for Hooks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hooks")
			.field("admission", &self.admission.is_some())
			.field("error", &self.error.is_some())
			.field("strategies", &self.strategies.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Hooks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_admission(mut self, policy: impl Fn(&Descriptor) -> bool + Send + Sync + 'static) -> Self {
		self.admission = Some(Arc::new(policy));
		self
	}

	pub fn with_error_policy(mut self, policy: impl Fn(&EngineError, Option<NodeId>) + Send + Sync + 'static) -> Self {
		self.error = Some(Arc::new(policy));
		self
	}

	/// Registers a named strategy. A custom strategy shadows a built-in of the same name.
	pub fn with_strategy(mut self, name: impl Into<String>, delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
		self.strategies.insert(name.into(), Arc::new(delay));
		self
	}

	pub fn admits(&self, descriptor: &Descriptor) -> bool {
		self.admission.as_ref().is_none_or(|p| p(descriptor))
	}

	pub fn report(&self, error: &EngineError, node: Option<NodeId>) {
		if let Some(policy) = &self.error {
			policy(error, node);
		}
	}

	/// Delay for the entry at `index` of a sorted batch.
	///
	/// Unknown strategy names activate immediately.
	pub fn delay(&self, strategy: &str, index: usize, config: &Config) -> Duration {
		if let Some(custom) = self.strategies.get(strategy) {
			return custom(index);
		}
		match strategy {
			STRATEGY_STAGGERED => config.stagger_interval() * u32::try_from(index).unwrap_or(u32::MAX),
			STRATEGY_IMMEDIATE => Duration::ZERO,
			other => {
				tracing::debug!(strategy = other, "laze.unknown_strategy");
				Duration::ZERO
			}
		}
	}
}
