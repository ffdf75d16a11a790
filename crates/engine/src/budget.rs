//! Global activation budget.

use std::time::Instant;

use laze_config::{BudgetConfig, BudgetPolicy};

/// Counter charged once per successful activation.
///
/// Admission stops while `spent` exceeds the ceiling. Whether and how the
/// counter comes back down is decided by [`BudgetPolicy`].
#[derive(Debug, Default)]
pub struct Budget {
	spent: u32,
	decay_anchor: Option<Instant>,
}

impl Budget {
	pub fn spent(&self) -> u32 {
		self.spent
	}

	/// Applies elapsed decay up to `now`.
	pub fn refresh(&mut self, config: &BudgetConfig, now: Instant) {
		let BudgetPolicy::Decay { amount, every_ms } = config.policy else {
			return;
		};
		let anchor = *self.decay_anchor.get_or_insert(now);
		let elapsed = now.saturating_duration_since(anchor).as_millis() as u64;
		let periods = elapsed / every_ms.max(1);
		if periods == 0 {
			return;
		}
		let periods_u32 = u32::try_from(periods).unwrap_or(u32::MAX);
		self.spent = self.spent.saturating_sub(amount.saturating_mul(periods_u32));
		self.decay_anchor = Some(anchor + std::time::Duration::from_millis(periods * every_ms.max(1)));
	}

	/// Called at the start of every coalesced pass.
	pub fn start_pass(&mut self, config: &BudgetConfig) {
		if config.policy == BudgetPolicy::ResetEachPass {
			self.spent = 0;
		}
	}

	pub fn exhausted(&self, config: &BudgetConfig) -> bool {
		self.spent > config.ceiling
	}

	pub fn charge(&mut self, config: &BudgetConfig) {
		self.spent = self.spent.saturating_add(config.cost);
	}
}
