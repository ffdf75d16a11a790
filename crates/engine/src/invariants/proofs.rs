use std::collections::BTreeSet;

use laze_config::Config;
use laze_primitives::{DescriptorState, ElementTag, NodeId, ResourceKind};
use proptest::prelude::*;

use crate::hooks::Hooks;
use crate::testing::Harness;

const IMG: ResourceKind = ResourceKind::ImageLike;

#[derive(Debug, Clone)]
enum Op {
	Show(usize, bool),
	Advance(u64),
	Mutate,
	Pause,
	Resume,
	Scroll(u16),
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => (0usize..4, any::<bool>()).prop_map(|(i, visible)| Op::Show(i, visible)),
		3 => (0u64..2500).prop_map(Op::Advance),
		1 => Just(Op::Mutate),
		1 => Just(Op::Pause),
		1 => Just(Op::Resume),
		1 => any::<u16>().prop_map(Op::Scroll),
	]
}

proptest! {
	/// A descriptor reaches `Loaded` at most once and never leaves it; its
	/// deferred value is bound at most once.
	///
	/// - Enforced in: `Engine::finalize`
	/// - Failure symptom: Duplicate fetches or duplicate batch entries.
	#[test]
	fn test_loaded_is_monotonic(ops in proptest::collection::vec(op(), 1..60)) {
		let mut config = Config::default();
		config.timeout_ms = 5000;
		let mut h = Harness::new(config);
		let nodes = [
			h.img("p0", &[("data-lazy-group", "g")]),
			h.img("p1", &[("data-lazy-strategy", "staggered")]),
			h.img("p2", &[("data-priority", "high")]),
			h.img("p3", &[("data-lazy-group", "g")]),
		];
		h.start();
		h.mem.dom.fail_binds(nodes[2], 1);

		let mut now = 0;
		let mut loaded = BTreeSet::new();
		for op in ops {
			now += 1;
			match op {
				Op::Show(i, visible) => h.frame(IMG, &[(nodes[i], visible)], now),
				Op::Advance(ms) => {
					now += ms;
					h.advance(now);
				}
				Op::Mutate => h.engine.on_mutation(h.at(now)),
				Op::Pause => h.engine.pause(),
				Op::Resume => h.engine.resume(h.at(now)),
				Op::Scroll(y) => h.engine.on_scroll(f64::from(y), h.at(now)),
			}
			for node in nodes {
				let state = h.engine.state_of(node);
				if loaded.contains(&node) {
					prop_assert_eq!(state, Some(DescriptorState::Loaded));
				} else if state == Some(DescriptorState::Loaded) {
					loaded.insert(node);
				}
				prop_assert!(h.mem.dom.writes(node, "src").len() <= 1);
			}
		}

		let mut seen = BTreeSet::new();
		for event in h.events() {
			prop_assert!(!event.entries.is_empty());
			for entry in &event.entries {
				prop_assert!(seen.insert(entry.id.clone()), "{} reported twice", entry.id);
			}
		}
		prop_assert_eq!(h.engine.budget_spent() as usize, loaded.len() * 10);
	}
}

/// Must not bind a descriptor whose prerequisite is not recorded loaded.
///
/// - Enforced in: `Engine::enqueue`, `Engine::activate`, `Engine::activate_group`
/// - Failure symptom: Scripts run before the library they need.
#[test]
fn test_dependent_never_bound_early() {
	let mut h = Harness::new(Config::default());
	let x = h.mem.dom.insert(ElementTag::Script, &[("data-id", "x"), ("data-src", "/x.js")]);
	let y = h.img("y", &[("data-depends-on", "x"), ("data-lazy-group", "g")]);
	let z = h.img("z", &[("data-lazy-group", "g")]);
	h.start();

	h.show(IMG, &[y, z], 0);
	assert_eq!(h.engine.state_of(z), Some(DescriptorState::Loaded));
	assert_ne!(h.engine.state_of(y), Some(DescriptorState::Loaded));
	assert!(h.mem.dom.writes(y, "src").is_empty());

	h.show(ResourceKind::Script, &[x], 10);
	assert!(h.mem.detectors.is_observed(IMG, y));
	h.show(IMG, &[y], 20);
	assert_eq!(h.mem.dom.writes(y, "src"), ["/y.png"]);
}

/// Retry count never exceeds `max-retries`.
///
/// - Enforced in: `RetryTable::on_failure`, `Engine::fail_activation`
/// - Failure symptom: A broken URL is retried forever.
#[test]
fn test_retries_bounded() {
	let mut h = Harness::new(Config::default());
	let node = h.img("broken", &[]);
	h.start();
	h.mem.dom.fail_binds(node, u32::MAX);

	let mut now = 0;
	let mut attempts = 0;
	while h.engine.state_of(node) != Some(DescriptorState::Dropped) {
		assert!(attempts <= 3, "more attempts than max-retries allows");
		h.show(IMG, &[node], now);
		attempts += 1;
		if let Some(deadline) = h.engine.next_deadline() {
			now = (deadline - h.t0).as_millis() as u64;
			h.advance(now);
		}
	}

	assert_eq!(attempts, 4);
	assert_eq!(h.engine.descriptor(node).map(|d| d.retry_count), Some(3));
	assert_eq!(h.engine.export_metrics().retries_scheduled, 3);
	h.advance(now + 100_000);
	assert!(!h.mem.detectors.is_observed(IMG, node));
}

/// Must never activate an oversized descriptor.
///
/// - Enforced in: `Engine::admit`, `Engine::activate_group`
/// - Failure symptom: Huge media downloads on metered connections.
#[test]
fn test_oversized_never_activated() {
	let mut h = Harness::new(Config::default());
	let small = h.img("small", &[("data-lazy-group", "g")]);
	let big = h.img("big", &[("data-lazy-group", "g"), ("data-size", "6000000")]);
	h.start();

	h.show(IMG, &[small], 0);
	assert_eq!(h.engine.state_of(big), Some(DescriptorState::Observing));
	h.show(IMG, &[big], 10);
	assert_eq!(h.engine.state_of(big), Some(DescriptorState::Skipped));
	assert!(h.mem.dom.writes(big, "src").is_empty());
}

/// Group siblings load in the pass of the member that triggered them.
///
/// - Enforced in: `Engine::activate_group`
/// - Failure symptom: Galleries fill in one image per scroll step.
#[test]
fn test_group_siblings_in_same_pass() {
	let mut h = Harness::new(Config::default());
	let members: Vec<NodeId> = ["g0", "g1", "g2"]
		.iter()
		.map(|id| h.img(id, &[("data-lazy-group", "gallery")]))
		.collect();
	h.start();

	h.show(IMG, &members[1..2], 0);
	let events = h.events();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].entries.len(), 3);
	for node in members {
		assert_eq!(h.engine.state_of(node), Some(DescriptorState::Loaded));
	}
}

/// Must not manage an element whose id the session map records as loaded.
///
/// - Enforced in: `scan::scan_element`
/// - Failure symptom: Already-fetched resources are fetched again on re-scan.
#[test]
fn test_session_loaded_never_reenqueued() {
	let mut h = Harness::new(Config::default());
	let first = h.img("a", &[]);
	h.start();
	h.show(IMG, &[first], 0);

	let twin = h.img("a", &[]);
	h.engine.on_mutation(h.at(10));
	h.advance(200);

	assert!(h.engine.descriptor(twin).is_none());
	assert_eq!(h.mem.dom.get_attr(twin, "src").as_deref(), Some("/a.png"));
	assert_eq!(h.engine.descriptors().count(), 1);
}

/// Descriptor ids are unique.
///
/// - Enforced in: `Engine::scan_new`
/// - Failure symptom: A twin's load releases dependents of the element it shadows.
#[test]
fn test_duplicate_ids_are_reassigned() {
	let mut h = Harness::new(Config::default());
	let owner = h.img("dup", &[]);
	let twin = h.img("dup", &[]);
	let dependent = h
		.mem
		.dom
		.insert(ElementTag::Script, &[("data-id", "after"), ("data-src", "/after.js"), ("data-depends-on", "dup")]);
	h.start();

	let ids: BTreeSet<_> = [owner, twin]
		.iter()
		.filter_map(|node| h.engine.descriptor(*node))
		.map(|d| d.id.clone())
		.collect();
	assert_eq!(ids.len(), 2);

	h.show(IMG, &[twin], 10);
	assert_eq!(h.engine.state_of(twin), Some(DescriptorState::Loaded));
	assert!(!h.engine.is_session_loaded("dup"));
	assert_eq!(h.engine.state_of(dependent), Some(DescriptorState::Unregistered));

	h.show(IMG, &[owner], 20);
	assert!(h.engine.is_session_loaded("dup"));
	assert_eq!(h.engine.state_of(dependent), Some(DescriptorState::Observing));
}

/// Resume re-observes only descriptors that are still live.
///
/// - Enforced in: `Engine::resume`
/// - Failure symptom: Terminal descriptors hold detector slots after a pause.
#[test]
fn test_resume_reobserves_only_live() {
	let mut config = Config::default();
	config.timeout_ms = 100;
	let hooks = Hooks::new().with_admission(|d| d.id != "c");
	let mut h = Harness::with_hooks(config, hooks);
	let a = h.img("a", &[]);
	let b = h.img("b", &[]);
	let c = h.img("c", &[]);
	h.start();

	h.show(IMG, &[a, c], 0);
	h.advance(100);
	assert_eq!(h.engine.state_of(a), Some(DescriptorState::Loaded));
	assert_eq!(h.engine.state_of(b), Some(DescriptorState::TimedOut));
	assert_eq!(h.engine.state_of(c), Some(DescriptorState::Observing));

	h.engine.pause();
	h.engine.resume(h.at(200));
	assert_eq!(h.mem.detectors.observed(IMG), [c]);

	h.engine.resume(h.at(300));
	assert_eq!(h.mem.detectors.observed(IMG), [c]);
}
