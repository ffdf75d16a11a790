//! Visibility-gated, budgeted, dependency-aware lazy loading.
//!
//! The [`Engine`] discovers lazy-managed elements through a host [`Dom`],
//! normalizes them into descriptors, registers them with one visibility
//! detector per [`ResourceKind`], and activates the ones that become visible
//! in coalesced, priority-ordered passes.
//!
//! Everything the engine touches outside itself is a trait object on
//! [`Host`]; [`host::memory`] provides an in-memory implementation. The engine
//! never sleeps or spawns: callers drive it with explicit instants (see
//! `laze-runtime` for a tokio driver).
//!
//! ```
//! use std::time::Instant;
//!
//! use laze_engine::host::memory::MemoryHost;
//! use laze_engine::{Config, ElementTag, Engine, Hooks, IntersectionEntry, ResourceKind};
//!
//! let mem = MemoryHost::new();
//! let hero = mem.dom.insert(ElementTag::Img, &[("data-id", "hero"), ("src", "/hero.png")]);
//!
//! let mut engine = Engine::new(Config::default(), Hooks::default(), mem.host());
//! let now = Instant::now();
//! engine.start(now)?;
//! engine.on_intersections(ResourceKind::ImageLike, vec![IntersectionEntry::new(hero, true, 0.0)]);
//! engine.on_frame(now);
//! assert!(engine.is_session_loaded("hero"));
//! # Ok::<(), laze_engine::EngineError>(())
//! ```

mod batch;
mod budget;
mod descriptor;
mod detector;
mod engine;
pub mod error;
mod graph;
mod hooks;
pub mod host;
mod invariants;
mod metrics;
mod queue;
mod retry;
mod scan;
mod session;
#[cfg(test)]
mod testing;
mod timer;

pub use batch::{BatchEvent, LoadedEntry, PassId};
pub use descriptor::Descriptor;
pub use engine::{BatchListener, Engine, Lifecycle, SubscriptionId};
pub use error::{EngineError, Result};
pub use hooks::{AdmissionPolicy, ErrorPolicy, Hooks, StrategyFn};
pub use host::{
	BindError, Binding, Detector, DetectorFactory, DetectorOptions, Dom, HintSink, Host, HostError, MutationWatcher,
	ResourceCache, SessionStore, StoreError,
};
pub use laze_config::{BudgetPolicy, Config, ConfigPatch, RootMargins, Thresholds, Weights};
pub use laze_primitives::{DescriptorState, ElementTag, IntersectionEntry, NodeId, Priority, ResourceKind};
pub use metrics::{AuditRecord, MetricsSnapshot, SkipReason};
pub use queue::ScrollDirection;
pub use session::SESSION_KEY;
