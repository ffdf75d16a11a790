//! Configuration for the lazy-load engine.
//!
//! [`Config`] is the resolved, plain-data option set the engine reads on every
//! pass: detector margins and thresholds, tier weights, size and retry limits,
//! the throughput budget and its reset policy. It is written in TOML with
//! kebab-case keys and millisecond durations:
//!
//! ```toml
//! max-retries = 2
//! timeout-ms = 15000
//!
//! [root-margins]
//! high = 50.0
//! medium = 150.0
//! low = 250.0
//!
//! [budget]
//! ceiling = 500
//! policy = { kind = "decay", amount = 50, every-ms = 1000 }
//! ```
//!
//! Every key is optional; missing keys keep their defaults. [`ConfigPatch`]
//! carries a partial update that is shallow-merged over an existing config,
//! and [`DeviceHints`] adapts margins and retries to the device and network.
//!
//! Behavior that cannot be expressed as data (admission predicates, error
//! hooks, custom strategy functions) lives on the engine side.

use std::path::Path;
use std::time::Duration;

use laze_primitives::{ElementTag, Priority, ResourceKind};
use serde::{Deserialize, Serialize};

mod device;
pub mod error;
mod patch;

pub use device::{DeviceHints, EffectiveType};
pub use error::{ConfigError, Result};
pub use patch::ConfigPatch;

/// Name of the built-in zero-delay strategy.
pub const STRATEGY_IMMEDIATE: &str = "immediate";
/// Name of the built-in index-proportional strategy.
pub const STRATEGY_STAGGERED: &str = "staggered";

/// Detector proximity margins in CSS pixels, one per priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootMargins {
	pub high: f64,
	pub medium: f64,
	pub low: f64,
}

impl RootMargins {
	/// Base margins multiplied by a device factor.
	pub fn scaled(factor: f64) -> Self {
		Self {
			high: 100.0 * factor,
			medium: 200.0 * factor,
			low: 300.0 * factor,
		}
	}

	pub fn for_priority(&self, priority: Priority) -> f64 {
		match priority {
			Priority::High => self.high,
			Priority::Medium => self.medium,
			Priority::Low => self.low,
		}
	}
}

impl Default for RootMargins {
	fn default() -> Self {
		Self::scaled(1.0)
	}
}

/// Intersection ratio that triggers each detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
	pub default: f32,
	pub script: f32,
	pub css: f32,
	pub font: f32,
}

impl Thresholds {
	pub fn for_kind(&self, kind: ResourceKind) -> f32 {
		match kind {
			ResourceKind::ImageLike => self.default,
			ResourceKind::Script => self.script,
			ResourceKind::Stylesheet => self.css,
			ResourceKind::Font => self.font,
		}
	}
}

impl Default for Thresholds {
	fn default() -> Self {
		Self {
			default: 0.1,
			script: 0.5,
			css: 0.3,
			font: 0.2,
		}
	}
}

/// Sort weight of each priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
	pub high: f64,
	pub medium: f64,
	pub low: f64,
}

impl Weights {
	pub fn for_priority(&self, priority: Priority) -> f64 {
		match priority {
			Priority::High => self.high,
			Priority::Medium => self.medium,
			Priority::Low => self.low,
		}
	}
}

impl Default for Weights {
	fn default() -> Self {
		Self {
			high: 3.0,
			medium: 2.0,
			low: 1.0,
		}
	}
}

/// Medium/low weights used while the user scrolls down.
///
/// Scrolling up restores the baseline [`Weights`]. The high tier never moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollWeights {
	pub medium: f64,
	pub low: f64,
}

impl Default for ScrollWeights {
	fn default() -> Self {
		Self { medium: 2.5, low: 1.5 }
	}
}

/// Extra sort score added per element type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindBonus {
	/// Added for `<img>` elements only; video and background elements share
	/// the image detector but not this bonus.
	pub image: f64,
}

impl KindBonus {
	pub fn for_tag(&self, tag: ElementTag) -> f64 {
		match tag {
			ElementTag::Img => self.image,
			_ => 0.0,
		}
	}
}

/// How the throughput budget counter is brought back down, if ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BudgetPolicy {
	/// Never reset: the counter is a per-session ceiling on activations.
	#[default]
	Monotonic,
	/// Zeroed at the start of every coalesced activation pass.
	ResetEachPass,
	/// Reduced by `amount` for every full `every-ms` that elapses.
	#[serde(rename_all = "kebab-case")]
	Decay { amount: u32, every_ms: u64 },
}

/// Global activation budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
	/// Admission stops once the counter exceeds this value.
	pub ceiling: u32,
	/// Amount charged per successful activation.
	pub cost: u32,
	pub policy: BudgetPolicy,
}

impl Default for BudgetConfig {
	fn default() -> Self {
		Self {
			ceiling: 1000,
			cost: 10,
			policy: BudgetPolicy::Monotonic,
		}
	}
}

/// Whether a retried element passes the size and budget checks again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryAdmission {
	/// Retried elements are admitted exactly like first attempts.
	#[default]
	Recheck,
	/// Retried elements skip the size and budget checks.
	BypassLimits,
}

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
	pub root_margins: RootMargins,
	pub thresholds: Thresholds,
	/// Maximum number of retries after the first failed activation.
	pub max_retries: u32,
	/// Linear backoff unit: retry `n` waits `n × retry-base-delay-ms`.
	pub retry_base_delay_ms: u64,
	/// Largest size estimate, in bytes, that may be activated.
	pub max_size: u64,
	pub weights: Weights,
	pub scroll_weights: ScrollWeights,
	pub kind_bonus: KindBonus,
	/// How long an element may stay observed without intersecting.
	pub timeout_ms: u64,
	/// Per-index delay of the `staggered` strategy.
	pub stagger_interval_ms: u64,
	/// Quiet period before a mutation, resize or scroll triggers a re-scan.
	pub rescan_debounce_ms: u64,
	/// Hand loaded URLs to the host's resource cache.
	pub enable_caching: bool,
	pub budget: BudgetConfig,
	pub retry_admission: RetryAdmission,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			root_margins: RootMargins::default(),
			thresholds: Thresholds::default(),
			max_retries: 3,
			retry_base_delay_ms: 1000,
			max_size: 5 * 1024 * 1024,
			weights: Weights::default(),
			scroll_weights: ScrollWeights::default(),
			kind_bonus: KindBonus::default(),
			timeout_ms: 30_000,
			stagger_interval_ms: 100,
			rescan_debounce_ms: 100,
			enable_caching: true,
			budget: BudgetConfig::default(),
			retry_admission: RetryAdmission::Recheck,
		}
	}
}

impl Config {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(src: &str) -> Result<Self> {
		let config: Config = toml::from_str(src)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let src = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&src)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	/// Shallow-merges `patch` over this config.
	///
	/// The merged result is validated before it replaces `self`; on error the
	/// config is left untouched.
	pub fn apply(&mut self, patch: ConfigPatch) -> Result<()> {
		let mut next = self.clone();
		patch.merge_into(&mut next);
		next.validate()?;
		*self = next;
		Ok(())
	}

	/// Checks ranges that the type system does not.
	pub fn validate(&self) -> Result<()> {
		let t = &self.thresholds;
		for (field, value) in [
			("thresholds.default", t.default),
			("thresholds.script", t.script),
			("thresholds.css", t.css),
			("thresholds.font", t.font),
		] {
			if !(0.0..=1.0).contains(&value) {
				return Err(ConfigError::Invalid {
					field,
					reason: format!("{value} is outside [0, 1]"),
				});
			}
		}

		let m = &self.root_margins;
		for (field, value) in [("root-margins.high", m.high), ("root-margins.medium", m.medium), ("root-margins.low", m.low)] {
			if !value.is_finite() || value < 0.0 {
				return Err(ConfigError::Invalid {
					field,
					reason: format!("{value} is not a non-negative pixel margin"),
				});
			}
		}

		let w = &self.weights;
		let s = &self.scroll_weights;
		for (field, value) in [
			("weights.high", w.high),
			("weights.medium", w.medium),
			("weights.low", w.low),
			("scroll-weights.medium", s.medium),
			("scroll-weights.low", s.low),
			("kind-bonus.image", self.kind_bonus.image),
		] {
			if !value.is_finite() || value < 0.0 {
				return Err(ConfigError::Invalid {
					field,
					reason: format!("{value} is not a non-negative weight"),
				});
			}
		}

		if self.budget.cost == 0 {
			return Err(ConfigError::Invalid {
				field: "budget.cost",
				reason: "must be greater than zero".to_string(),
			});
		}
		if let BudgetPolicy::Decay { every_ms: 0, .. } = self.budget.policy {
			return Err(ConfigError::Invalid {
				field: "budget.policy.every-ms",
				reason: "decay period must be greater than zero".to_string(),
			});
		}

		Ok(())
	}

	pub fn retry_base_delay(&self) -> Duration {
		Duration::from_millis(self.retry_base_delay_ms)
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	pub fn stagger_interval(&self) -> Duration {
		Duration::from_millis(self.stagger_interval_ms)
	}

	pub fn rescan_debounce(&self) -> Duration {
		Duration::from_millis(self.rescan_debounce_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let c = Config::default();
		assert_eq!(c.max_retries, 3);
		assert_eq!(c.max_size, 5_242_880);
		assert_eq!(c.root_margins, RootMargins { high: 100.0, medium: 200.0, low: 300.0 });
		assert_eq!(c.weights.for_priority(Priority::Medium), 2.0);
		assert_eq!(c.thresholds.for_kind(ResourceKind::Script), 0.5);
		assert_eq!(c.timeout(), Duration::from_secs(30));
		assert_eq!(c.budget.policy, BudgetPolicy::Monotonic);
		c.validate().unwrap();
	}

	#[test]
	fn image_bonus_is_limited_to_img_tags() {
		let bonus = KindBonus { image: 1.0 };
		assert_eq!(bonus.for_tag(ElementTag::Img), 1.0);
		assert_eq!(bonus.for_tag(ElementTag::Video), 0.0);
		assert_eq!(bonus.for_tag(ElementTag::Other), 0.0);
	}

	#[test]
	fn partial_toml_keeps_defaults() {
		let c = Config::from_toml_str(
			r#"
			max-retries = 1
			[root-margins]
			high = 40.0
			"#,
		)
		.unwrap();
		assert_eq!(c.max_retries, 1);
		assert_eq!(c.root_margins.high, 40.0);
		assert_eq!(c.root_margins.low, 300.0);
		assert_eq!(c.stagger_interval_ms, 100);
	}

	#[test]
	fn budget_policy_parses_tagged_table() {
		let c = Config::from_toml_str(
			r#"
			[budget]
			ceiling = 200
			policy = { kind = "decay", amount = 20, every-ms = 500 }
			"#,
		)
		.unwrap();
		assert_eq!(c.budget.ceiling, 200);
		assert_eq!(c.budget.cost, 10);
		assert_eq!(c.budget.policy, BudgetPolicy::Decay { amount: 20, every_ms: 500 });
	}

	#[test]
	fn retry_admission_parses_kebab_case() {
		let c = Config::from_toml_str(r#"retry-admission = "bypass-limits""#).unwrap();
		assert_eq!(c.retry_admission, RetryAdmission::BypassLimits);
	}

	#[test]
	fn out_of_range_threshold_is_rejected() {
		let err = Config::from_toml_str("[thresholds]\nscript = 1.5").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "thresholds.script", .. }), "{err}");
	}

	#[test]
	fn zero_budget_cost_is_rejected() {
		let err = Config::from_toml_str("[budget]\ncost = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "budget.cost", .. }));
	}

	#[test]
	fn unknown_keys_surface_as_toml_errors() {
		let err = Config::from_toml_str("max-retries = \"three\"").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)));
	}

	#[test]
	fn load_reports_missing_file_path() {
		let err = Config::load("/definitely/not/here.toml").unwrap_err();
		match err {
			ConfigError::Io { path, .. } => assert!(path.ends_with("here.toml")),
			other => panic!("unexpected error: {other}"),
		}
	}
}
