use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared loading priority of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	High,
	Medium,
	#[default]
	Low,
}

impl Priority {
	/// Tiers in drain order.
	pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}

	pub const fn index(self) -> usize {
		match self {
			Self::High => 0,
			Self::Medium => 1,
			Self::Low => 2,
		}
	}
}

impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown priority '{0}' (expected 'high', 'medium' or 'low')")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
	type Err = ParsePriorityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"high" => Ok(Self::High),
			"medium" => Ok(Self::Medium),
			"low" => Ok(Self::Low),
			other => Err(ParsePriorityError(other.to_string())),
		}
	}
}
