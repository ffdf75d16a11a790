//! Machine-checkable invariant catalog and proof entrypoints for the engine.
#![allow(dead_code)]

pub(crate) mod catalog;

#[allow(unused_imports)]
pub(crate) use catalog::{
	DEPENDENCY_EDGES_CONSUMED_ONCE, DEPENDENT_NEVER_BOUND_EARLY, GROUP_ACTIVATES_TOGETHER, IDS_UNIQUE,
	LOADED_AT_MOST_ONCE, ONE_EVENT_PER_PASS, OVERSIZED_NEVER_ACTIVATED, RESUME_REOBSERVES_ONLY_LIVE, RETRIES_BOUNDED,
	SESSION_LOADED_NEVER_REENQUEUED,
};

#[cfg(test)]
mod proofs;
