//! Counters and the append-only audit log.

use std::time::Duration;

use laze_primitives::ElementTag;
use serde::Serialize;

/// Why a descriptor was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
	Oversized,
}

/// One audit log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AuditRecord {
	Loaded {
		id: String,
		tag: ElementTag,
		/// Milliseconds since the engine started.
		load_time_ms: f64,
		/// Budget counter right after this activation was charged.
		budget: u32,
	},
	Skipped {
		id: String,
		reason: SkipReason,
	},
	Timeout {
		id: String,
	},
	Dropped {
		id: String,
		retries: u32,
	},
	Error {
		#[serde(skip_serializing_if = "Option::is_none")]
		id: Option<String>,
		error: String,
	},
}

#[derive(Debug, Default)]
pub struct Metrics {
	elements_loaded: u64,
	total_load_time: Duration,
	skipped_oversized: u64,
	timeouts: u64,
	dropped: u64,
	errors: u64,
	retries_scheduled: u64,
	budget_deferrals: u64,
	audits: Vec<AuditRecord>,
}

impl Metrics {
	pub fn record_loaded(&mut self, id: &str, tag: ElementTag, load_time: Duration, budget: u32) {
		self.elements_loaded += 1;
		self.total_load_time += load_time;
		self.audits.push(AuditRecord::Loaded {
			id: id.to_string(),
			tag,
			load_time_ms: load_time.as_secs_f64() * 1000.0,
			budget,
		});
	}

	pub fn record_oversized(&mut self, id: &str) {
		self.skipped_oversized += 1;
		self.audits.push(AuditRecord::Skipped {
			id: id.to_string(),
			reason: SkipReason::Oversized,
		});
	}

	pub fn record_timeout(&mut self, id: &str) {
		self.timeouts += 1;
		self.audits.push(AuditRecord::Timeout { id: id.to_string() });
	}

	pub fn record_dropped(&mut self, id: &str, retries: u32) {
		self.dropped += 1;
		self.audits.push(AuditRecord::Dropped {
			id: id.to_string(),
			retries,
		});
	}

	pub fn record_error(&mut self, id: Option<&str>, error: &dyn std::fmt::Display) {
		self.errors += 1;
		self.audits.push(AuditRecord::Error {
			id: id.map(str::to_string),
			error: error.to_string(),
		});
	}

	pub fn record_retry(&mut self) {
		self.retries_scheduled += 1;
	}

	pub fn record_budget_deferral(&mut self) {
		self.budget_deferrals += 1;
	}

	pub fn snapshot(&self, budget_spent: u32) -> MetricsSnapshot {
		MetricsSnapshot {
			elements_loaded: self.elements_loaded,
			total_load_time_ms: self.total_load_time.as_secs_f64() * 1000.0,
			skipped_oversized: self.skipped_oversized,
			timeouts: self.timeouts,
			dropped: self.dropped,
			errors: self.errors,
			retries_scheduled: self.retries_scheduled,
			budget_deferrals: self.budget_deferrals,
			budget_spent,
			audits: self.audits.clone(),
		}
	}
}

/// Point-in-time copy of the engine metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
	pub elements_loaded: u64,
	pub total_load_time_ms: f64,
	pub skipped_oversized: u64,
	pub timeouts: u64,
	pub dropped: u64,
	pub errors: u64,
	pub retries_scheduled: u64,
	pub budget_deferrals: u64,
	pub budget_spent: u32,
	pub audits: Vec<AuditRecord>,
}

impl MetricsSnapshot {
	/// Pretty-printed JSON export of the snapshot.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snapshot_serializes_tagged_audits() {
		let mut m = Metrics::default();
		m.record_loaded("hero", ElementTag::Img, Duration::from_millis(12), 10);
		m.record_oversized("big");
		m.record_error(None, &"observer missing");

		let json: serde_json::Value = serde_json::from_str(&m.snapshot(10).to_json().unwrap()).unwrap();
		assert_eq!(json["elementsLoaded"], 1);
		assert_eq!(json["skippedOversized"], 1);
		assert_eq!(json["audits"][0]["status"], "loaded");
		assert_eq!(json["audits"][0]["tag"], "img");
		assert_eq!(json["audits"][1]["reason"], "oversized");
		assert!(json["audits"][2].get("id").is_none());
	}

	#[test]
	fn load_time_accumulates() {
		let mut m = Metrics::default();
		m.record_loaded("a", ElementTag::Img, Duration::from_millis(5), 0);
		m.record_loaded("b", ElementTag::Video, Duration::from_millis(7), 0);
		assert_eq!(m.snapshot(0).total_load_time_ms, 12.0);
	}
}
