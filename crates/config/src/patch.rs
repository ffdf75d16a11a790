//! Partial configuration updates.

use serde::Deserialize;

use crate::{BudgetConfig, Config, KindBonus, RetryAdmission, RootMargins, ScrollWeights, Thresholds, Weights};

/// A shallow partial update for [`Config`].
///
/// Each `Some` field replaces the whole corresponding field of the target;
/// nested tables are replaced wholesale, not merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigPatch {
	pub root_margins: Option<RootMargins>,
	pub thresholds: Option<Thresholds>,
	pub max_retries: Option<u32>,
	pub retry_base_delay_ms: Option<u64>,
	pub max_size: Option<u64>,
	pub weights: Option<Weights>,
	pub scroll_weights: Option<ScrollWeights>,
	pub kind_bonus: Option<KindBonus>,
	pub timeout_ms: Option<u64>,
	pub stagger_interval_ms: Option<u64>,
	pub rescan_debounce_ms: Option<u64>,
	pub enable_caching: Option<bool>,
	pub budget: Option<BudgetConfig>,
	pub retry_admission: Option<RetryAdmission>,
}

impl ConfigPatch {
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// Whether applying this patch changes detector margins or thresholds.
	pub fn touches_detectors(&self) -> bool {
		self.root_margins.is_some() || self.thresholds.is_some()
	}

	pub(crate) fn merge_into(self, target: &mut Config) {
		macro_rules! merge {
			($($field:ident),* $(,)?) => {
				$(if let Some(v) = self.$field { target.$field = v; })*
			};
		}
		merge!(
			root_margins,
			thresholds,
			max_retries,
			retry_base_delay_ms,
			max_size,
			weights,
			scroll_weights,
			kind_bonus,
			timeout_ms,
			stagger_interval_ms,
			rescan_debounce_ms,
			enable_caching,
			budget,
			retry_admission,
		);
	}
}
