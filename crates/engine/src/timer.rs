//! Cancellable deadline queue.
//!
//! Strategy delays, retry backoff, observe timeouts and the debounced re-scan
//! all live here. Nothing fires on its own: the host calls
//! [`crate::Engine::advance`] at or after [`TimerQueue::next_deadline`].

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use rustc_hash::FxHashMap;

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Min-heap of deadlines with lazy cancellation.
///
/// Timers sharing a deadline fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
	heap: BinaryHeap<Reverse<(Instant, u64)>>,
	live: FxHashMap<u64, T>,
	next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
	fn default() -> Self {
		Self {
			heap: BinaryHeap::new(),
			live: FxHashMap::default(),
			next_seq: 0,
		}
	}
}

impl<T> TimerQueue<T> {
	pub fn schedule(&mut self, deadline: Instant, payload: T) -> TimerId {
		let seq = self.next_seq;
		self.next_seq += 1;
		self.heap.push(Reverse((deadline, seq)));
		self.live.insert(seq, payload);
		TimerId(seq)
	}

	/// Cancels a timer, returning its payload if it had not fired yet.
	pub fn cancel(&mut self, id: TimerId) -> Option<T> {
		self.live.remove(&id.0)
	}

	pub fn next_deadline(&mut self) -> Option<Instant> {
		self.prune();
		self.heap.peek().map(|Reverse((deadline, _))| *deadline)
	}

	/// Pops the earliest timer whose deadline is at or before `now`.
	pub fn pop_due(&mut self, now: Instant) -> Option<(TimerId, T)> {
		self.prune();
		let Reverse((deadline, seq)) = *self.heap.peek()?;
		if deadline > now {
			return None;
		}
		self.heap.pop();
		self.live.remove(&seq).map(|payload| (TimerId(seq), payload))
	}

	pub fn len(&self) -> usize {
		self.live.len()
	}

	pub fn clear(&mut self) {
		self.heap.clear();
		self.live.clear();
	}

	fn prune(&mut self) {
		while let Some(Reverse((_, seq))) = self.heap.peek() {
			if self.live.contains_key(seq) {
				break;
			}
			self.heap.pop();
		}
	}
}
