use serde::{Deserialize, Serialize};

/// Lifecycle state of one managed descriptor.
///
/// ```text
/// unregistered ─► queued ─► observing ─► activating ─► loaded
///       ▲                     │  ▲            │
///       │                     │  └─ retrying ◄┤
///       │                     │               ├─► dropped
///       └──── (prerequisite   ├─► timed-out   │
///              still unmet) ◄─┼───────────────┘
///                             └─► skipped  (also from unregistered/queued when oversized)
/// ```
///
/// `Loaded`, `Dropped`, `TimedOut` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorState {
	/// Known to the engine but not handed to a detector (e.g. waiting on a prerequisite).
	#[default]
	Unregistered,
	/// Sitting in a priority bucket, waiting for the registration drain.
	Queued,
	/// Registered with its kind's detector.
	Observing,
	/// Admitted; activation is scheduled behind its strategy delay.
	Activating,
	/// Activation failed; a backoff timer will re-register it.
	Retrying,
	Loaded,
	Dropped,
	TimedOut,
	Skipped,
}

impl DescriptorState {
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Loaded | Self::Dropped | Self::TimedOut | Self::Skipped)
	}

	/// Whether the state machine permits moving from `self` to `next`.
	///
	/// Group activation may load a sibling from any live state, so `Loaded` is
	/// reachable from every non-terminal state except a bare `Unregistered`
	/// descriptor that still waits on its prerequisite (callers check that).
	pub const fn can_transition_to(self, next: DescriptorState) -> bool {
		use DescriptorState::*;
		match (self, next) {
			(Loaded | Dropped | TimedOut | Skipped, _) => false,
			(Unregistered, Queued) => true,
			(Queued, Observing) => true,
			(Observing, Activating | TimedOut) => true,
			(Unregistered | Queued | Observing, Skipped) => true,
			(Activating, Retrying | Dropped | Unregistered | Observing) => true,
			(Retrying, Observing) => true,
			(_, Loaded) => true,
			_ => false,
		}
	}

}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	const ALL: [DescriptorState; 9] = [
		DescriptorState::Unregistered,
		DescriptorState::Queued,
		DescriptorState::Observing,
		DescriptorState::Activating,
		DescriptorState::Retrying,
		DescriptorState::Loaded,
		DescriptorState::Dropped,
		DescriptorState::TimedOut,
		DescriptorState::Skipped,
	];

	#[test]
	fn happy_path_is_permitted() {
		let path = [
			DescriptorState::Unregistered,
			DescriptorState::Queued,
			DescriptorState::Observing,
			DescriptorState::Activating,
			DescriptorState::Loaded,
		];
		for pair in path.windows(2) {
			assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
		}
	}

	#[test]
	fn skip_only_before_activation() {
		assert!(DescriptorState::Unregistered.can_transition_to(DescriptorState::Skipped));
		assert!(DescriptorState::Queued.can_transition_to(DescriptorState::Skipped));
		assert!(DescriptorState::Observing.can_transition_to(DescriptorState::Skipped));
		assert!(!DescriptorState::Activating.can_transition_to(DescriptorState::Skipped));
		assert!(!DescriptorState::Retrying.can_transition_to(DescriptorState::Skipped));
	}

	proptest! {
		/// Walking any sequence of permitted transitions never leaves a terminal state.
		#[test]
		fn terminal_states_absorb(steps in proptest::collection::vec(0usize..9, 1..40)) {
			let mut state = DescriptorState::Unregistered;
			let mut terminal_seen: Option<DescriptorState> = None;
			for step in steps {
				let next = ALL[step];
				if state.can_transition_to(next) {
					state = next;
				}
				if let Some(t) = terminal_seen {
					prop_assert_eq!(state, t);
				} else if state.is_terminal() {
					terminal_seen = Some(state);
				}
			}
		}
	}
}
