//! Batch ordering and per-pass completion tracking.

use std::cmp::Ordering;
use std::time::Duration;

use laze_primitives::{ElementTag, IntersectionEntry, NodeId, ResourceKind};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::descriptor::DescriptorIdx;

/// One intersection entry resolved to its descriptor and scored.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
	pub idx: DescriptorIdx,
	pub entry: IntersectionEntry,
	/// Tier weight plus kind bonus.
	pub score: f64,
	/// Distance from the vertical center of the viewport.
	pub distance: f64,
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
	b.score.total_cmp(&a.score).then_with(|| a.distance.total_cmp(&b.distance))
}

/// Sorts by descending score, then ascending center distance. Stable.
pub fn sort_batch(candidates: &mut [Candidate]) {
	candidates.sort_by(compare);
}

/// Identifier of one coalesced activation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PassId(pub u64);

/// One descriptor finalized during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedEntry {
	pub node: NodeId,
	pub id: String,
	pub kind: ResourceKind,
	pub tag: ElementTag,
	/// Time since the engine started.
	pub load_time: Duration,
	/// Budget counter right after this activation was charged.
	pub budget: u32,
}

/// Everything finalized during one pass, emitted once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEvent {
	pub pass: PassId,
	pub entries: Vec<LoadedEntry>,
}

#[derive(Debug, Default)]
struct OpenPass {
	/// Delayed activations not yet resolved.
	outstanding: usize,
	/// Set when the frame that opened the pass has finished.
	sealed: bool,
	loaded: Vec<LoadedEntry>,
}

/// Tracks open passes until every delayed activation they scheduled resolves.
#[derive(Debug, Default)]
pub struct Passes {
	next: u64,
	open: FxHashMap<PassId, OpenPass>,
}

impl Passes {
	pub fn open(&mut self) -> PassId {
		let id = PassId(self.next);
		self.next += 1;
		self.open.insert(id, OpenPass::default());
		id
	}

	/// Notes a delayed activation that belongs to `pass`.
	pub fn hold(&mut self, pass: PassId) {
		if let Some(p) = self.open.get_mut(&pass) {
			p.outstanding += 1;
		}
	}

	pub fn record(&mut self, pass: PassId, entry: LoadedEntry) {
		if let Some(p) = self.open.get_mut(&pass) {
			p.loaded.push(entry);
		}
	}

	/// Resolves one delayed activation. Returns the batch event if the pass is now complete.
	pub fn release(&mut self, pass: PassId) -> Option<BatchEvent> {
		if let Some(p) = self.open.get_mut(&pass) {
			p.outstanding = p.outstanding.saturating_sub(1);
		}
		self.try_close(pass)
	}

	/// Marks the opening frame as done. Returns the batch event if nothing is outstanding.
	pub fn seal(&mut self, pass: PassId) -> Option<BatchEvent> {
		if let Some(p) = self.open.get_mut(&pass) {
			p.sealed = true;
		}
		self.try_close(pass)
	}

	pub fn open_count(&self) -> usize {
		self.open.len()
	}

	pub fn clear(&mut self) {
		self.open.clear();
	}

	fn try_close(&mut self, pass: PassId) -> Option<BatchEvent> {
		let done = self.open.get(&pass).is_some_and(|p| p.sealed && p.outstanding == 0);
		if !done {
			return None;
		}
		let p = self.open.remove(&pass)?;
		(!p.loaded.is_empty()).then_some(BatchEvent { pass, entries: p.loaded })
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn cand(i: u32, score: f64, distance: f64) -> Candidate {
		Candidate {
			idx: DescriptorIdx::from_raw(i),
			entry: IntersectionEntry::new(NodeId(i as u64), true, 0.0),
			score,
			distance,
		}
	}

	fn entry(id: &str) -> LoadedEntry {
		LoadedEntry {
			node: NodeId(0),
			id: id.to_string(),
			kind: ResourceKind::ImageLike,
			tag: ElementTag::Img,
			load_time: Duration::ZERO,
			budget: 0,
		}
	}

	#[test]
	fn higher_score_first_then_closer_to_center() {
		let mut batch = vec![cand(0, 1.0, 10.0), cand(1, 3.0, 500.0), cand(2, 3.0, 20.0), cand(3, 2.0, 0.0)];
		sort_batch(&mut batch);
		let order: Vec<_> = batch.iter().map(|c| c.idx.get()).collect();
		assert_eq!(order, [2, 1, 3, 0]);
	}

	#[test]
	fn pass_closes_only_after_seal_and_releases() {
		let mut passes = Passes::default();
		let p = passes.open();
		passes.hold(p);
		passes.record(p, entry("a"));
		assert!(passes.seal(p).is_none());
		passes.record(p, entry("b"));
		let event = passes.release(p).unwrap();
		assert_eq!(event.entries.len(), 2);
		assert_eq!(passes.open_count(), 0);
	}

	#[test]
	fn empty_pass_emits_nothing() {
		let mut passes = Passes::default();
		let p = passes.open();
		assert!(passes.seal(p).is_none());
		assert_eq!(passes.open_count(), 0);
	}

	proptest! {
		#[test]
		fn sorted_batches_respect_score_then_distance(
			raw in proptest::collection::vec((0u8..4, 0u16..1000), 0..40)
		) {
			let mut batch: Vec<_> = raw
				.iter()
				.enumerate()
				.map(|(i, (s, d))| cand(i as u32, *s as f64, *d as f64))
				.collect();
			sort_batch(&mut batch);
			for pair in batch.windows(2) {
				prop_assert!(pair[0].score >= pair[1].score);
				if pair[0].score == pair[1].score {
					prop_assert!(pair[0].distance <= pair[1].distance);
				}
			}
		}
	}
}
