//! Retry bookkeeping with linear backoff.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::descriptor::DescriptorIdx;
use crate::timer::TimerId;

#[derive(Debug, Default)]
struct RetryEntry {
	retries: u32,
	timer: Option<TimerId>,
}

/// What to do after an activation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
	/// Re-register after `delay`; this is retry number `attempt`.
	Scheduled { attempt: u32, delay: Duration },
	/// The bound is reached; drop permanently.
	Exhausted { retries: u32 },
}

#[derive(Debug, Default)]
pub struct RetryTable {
	entries: FxHashMap<DescriptorIdx, RetryEntry>,
}

impl RetryTable {
	/// Records a failure. Retry `n` waits `n × base_delay`.
	pub fn on_failure(&mut self, idx: DescriptorIdx, max_retries: u32, base_delay: Duration) -> RetryDecision {
		let entry = self.entries.entry(idx).or_default();
		if entry.retries < max_retries {
			entry.retries += 1;
			RetryDecision::Scheduled {
				attempt: entry.retries,
				delay: base_delay * entry.retries,
			}
		} else {
			RetryDecision::Exhausted { retries: entry.retries }
		}
	}

	pub fn set_timer(&mut self, idx: DescriptorIdx, timer: TimerId) {
		if let Some(entry) = self.entries.get_mut(&idx) {
			entry.timer = Some(timer);
		}
	}

	pub fn take_timer(&mut self, idx: DescriptorIdx) -> Option<TimerId> {
		self.entries.get_mut(&idx).and_then(|e| e.timer.take())
	}

	pub fn retries(&self, idx: DescriptorIdx) -> u32 {
		self.entries.get(&idx).map_or(0, |e| e.retries)
	}

	/// Forgets the entry, returning its pending timer if any.
	pub fn consume(&mut self, idx: DescriptorIdx) -> Option<TimerId> {
		self.entries.remove(&idx).and_then(|e| e.timer)
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_grows_linearly_then_exhausts() {
		let mut t = RetryTable::default();
		let idx = DescriptorIdx::from_raw(0);
		let base = Duration::from_millis(1000);

		assert_eq!(t.on_failure(idx, 2, base), RetryDecision::Scheduled { attempt: 1, delay: base });
		assert_eq!(t.on_failure(idx, 2, base), RetryDecision::Scheduled { attempt: 2, delay: base * 2 });
		assert_eq!(t.on_failure(idx, 2, base), RetryDecision::Exhausted { retries: 2 });
		assert_eq!(t.retries(idx), 2);
	}

	#[test]
	fn zero_max_retries_drops_on_first_failure() {
		let mut t = RetryTable::default();
		let idx = DescriptorIdx::from_raw(3);
		assert_eq!(t.on_failure(idx, 0, Duration::from_secs(1)), RetryDecision::Exhausted { retries: 0 });
	}

	#[test]
	fn consume_forgets_count() {
		let mut t = RetryTable::default();
		let idx = DescriptorIdx::from_raw(1);
		t.on_failure(idx, 3, Duration::ZERO);
		assert!(t.consume(idx).is_none());
		assert_eq!(t.retries(idx), 0);
	}
}
