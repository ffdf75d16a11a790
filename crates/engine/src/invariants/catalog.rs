//! Invariant catalog for [`crate::Engine`].

/// A descriptor reaches `Loaded` at most once and never leaves it; its
/// deferred value is bound at most once.
///
/// - Enforced in: `Engine::finalize` via `Descriptors::transition`, `DescriptorState::can_transition_to`
/// - Tested by: `invariants::proofs::test_loaded_is_monotonic`
/// - Failure symptom: Duplicate fetches, duplicate batch entries, or budget charged twice for one element.
pub(crate) const LOADED_AT_MOST_ONCE: () = ();

/// Must not bind a descriptor whose prerequisite is not recorded loaded.
///
/// - Enforced in: `Engine::enqueue`, `Engine::activate`, `Engine::activate_group`, `Engine::eager_fallback`
/// - Tested by: `invariants::proofs::test_dependent_never_bound_early`
/// - Failure symptom: Scripts run before the library they need, stylesheets apply out of order.
pub(crate) const DEPENDENT_NEVER_BOUND_EARLY: () = ();

/// Descriptor ids are unique; a declared `data-id` already owned by another
/// descriptor is replaced by a generated one.
///
/// - Enforced in: `Engine::scan_new`
/// - Tested by: `invariants::proofs::test_duplicate_ids_are_reassigned`
/// - Failure symptom: One element's load marks its twin session-loaded and releases the wrong dependents.
pub(crate) const IDS_UNIQUE: () = ();

/// Must consume a dependency edge exactly once, right after the prerequisite completes.
///
/// - Enforced in: `Engine::finalize` via `Graph::consume_dependency`
/// - Tested by: `graph::tests::dependency_edges_are_consumed_once`, `invariants::proofs::test_dependent_never_bound_early`
/// - Failure symptom: Dependents stay unregistered forever, or are registered twice.
pub(crate) const DEPENDENCY_EDGES_CONSUMED_ONCE: () = ();

/// Retry count never exceeds `max-retries`; the next failure drops the
/// descriptor with no further detector registration.
///
/// - Enforced in: `RetryTable::on_failure`, `Engine::fail_activation`
/// - Tested by: `invariants::proofs::test_retries_bounded`
/// - Failure symptom: A broken URL is retried forever and keeps a detector alive.
pub(crate) const RETRIES_BOUNDED: () = ();

/// Must never activate a descriptor whose size estimate exceeds `max-size`.
///
/// - Enforced in: `Engine::admit`, `Engine::activate_group`, `Engine::eager_fallback`
/// - Tested by: `invariants::proofs::test_oversized_never_activated`, `engine::tests::eager_fallback_skips_oversized`
/// - Failure symptom: Huge media downloads on metered connections.
pub(crate) const OVERSIZED_NEVER_ACTIVATED: () = ();

/// When one group member activates, every eligible sibling is activated
/// in the same pass and every unloaded sibling is preloaded.
///
/// - Enforced in: `Engine::send_hints`, `Engine::activate_group`
/// - Tested by: `invariants::proofs::test_group_siblings_in_same_pass`
/// - Failure symptom: Galleries fill in one image per scroll step.
pub(crate) const GROUP_ACTIVATES_TOGETHER: () = ();

/// Must not manage an element whose id the session map records as loaded.
///
/// - Enforced in: `scan::scan_element`
/// - Tested by: `invariants::proofs::test_session_loaded_never_reenqueued`
/// - Failure symptom: Already-fetched resources are stripped and fetched again on re-scan.
pub(crate) const SESSION_LOADED_NEVER_REENQUEUED: () = ();

/// Resume re-observes only descriptors that are still live.
///
/// - Enforced in: `Engine::resume` via `Engine::scan_pass`
/// - Tested by: `invariants::proofs::test_resume_reobserves_only_live`
/// - Failure symptom: Terminal descriptors hold detector slots after a pause.
pub(crate) const RESUME_REOBSERVES_ONLY_LIVE: () = ();

/// At most one batch event per pass, emitted after its delayed activations resolve.
///
/// - Enforced in: `Passes::seal`, `Passes::release`
/// - Tested by: `batch::tests::pass_closes_only_after_seal_and_releases`, `invariants::proofs::test_loaded_is_monotonic`
/// - Failure symptom: Listeners see partial batches or the same element twice.
pub(crate) const ONE_EVENT_PER_PASS: () = ();
