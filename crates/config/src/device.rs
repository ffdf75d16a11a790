//! Device and network adaptation.

use serde::{Deserialize, Serialize};

use crate::{Config, RootMargins};

/// Reported effective connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectiveType {
	#[serde(rename = "slow-2g")]
	Slow2g,
	#[serde(rename = "2g")]
	TwoG,
	#[serde(rename = "3g")]
	ThreeG,
	#[default]
	#[serde(rename = "4g")]
	FourG,
}

impl EffectiveType {
	pub fn is_2g(self) -> bool {
		matches!(self, Self::Slow2g | Self::TwoG)
	}
}

/// Capabilities the host reports about the device it runs on.
///
/// Missing values are treated as capable: 8 GiB, 8 cores, 4g, no data saver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeviceHints {
	pub memory_gb: f64,
	pub concurrency: u32,
	pub effective_type: EffectiveType,
	pub save_data: bool,
	pub has_gpu: bool,
}

impl Default for DeviceHints {
	fn default() -> Self {
		Self {
			memory_gb: 8.0,
			concurrency: 8,
			effective_type: EffectiveType::FourG,
			save_data: false,
			has_gpu: false,
		}
	}
}

impl DeviceHints {
	fn is_low_end(&self) -> bool {
		self.memory_gb < 4.0 || self.concurrency < 4
	}

	/// Multiplier applied to the base detector margins.
	///
	/// Low-end hardware takes precedence over data saving.
	pub fn margin_factor(&self) -> f64 {
		if self.is_low_end() {
			1.5
		} else if self.save_data {
			2.0
		} else {
			1.0
		}
	}

	/// Overrides `config` in place with device-derived values.
	pub fn adapt(&self, config: &mut Config) {
		config.root_margins = RootMargins::scaled(self.margin_factor());
		if self.effective_type.is_2g() || self.save_data {
			config.max_retries = 1;
		}
		if self.has_gpu {
			config.kind_bonus.image = 1.0;
		}
		tracing::debug!(
			factor = self.margin_factor(),
			max_retries = config.max_retries,
			gpu = self.has_gpu,
			"config.device_adapted"
		);
	}
}

impl Config {
	/// Defaults adapted to `hints`.
	pub fn for_device(hints: &DeviceHints) -> Self {
		let mut config = Self::default();
		hints.adapt(&mut config);
		config
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capable_device_keeps_defaults() {
		assert_eq!(Config::for_device(&DeviceHints::default()), Config::default());
	}

	#[test]
	fn low_memory_scales_margins_by_one_and_a_half() {
		let c = Config::for_device(&DeviceHints { memory_gb: 2.0, save_data: true, ..Default::default() });
		assert_eq!(c.root_margins, RootMargins { high: 150.0, medium: 300.0, low: 450.0 });
		assert_eq!(c.max_retries, 1);
	}

	#[test]
	fn save_data_doubles_margins() {
		let c = Config::for_device(&DeviceHints { save_data: true, ..Default::default() });
		assert_eq!(c.root_margins.high, 200.0);
	}

	#[test]
	fn slow_network_limits_retries() {
		let c = Config::for_device(&DeviceHints { effective_type: EffectiveType::Slow2g, ..Default::default() });
		assert_eq!(c.max_retries, 1);
		assert_eq!(c.root_margins.high, 100.0);
	}

	#[test]
	fn gpu_adds_image_bonus() {
		let c = Config::for_device(&DeviceHints { has_gpu: true, concurrency: 2, ..Default::default() });
		assert_eq!(c.kind_bonus.image, 1.0);
		assert_eq!(c.root_margins.low, 450.0);
	}

	#[test]
	fn effective_type_parses_host_labels() {
		#[derive(Deserialize)]
		struct W {
			t: EffectiveType,
		}
		let w: W = toml::from_str(r#"t = "2g""#).unwrap();
		assert_eq!(w.t, EffectiveType::TwoG);
		let w: W = toml::from_str(r#"t = "slow-2g""#).unwrap();
		assert_eq!(w.t, EffectiveType::Slow2g);
		assert!(w.t.is_2g());
	}
}
