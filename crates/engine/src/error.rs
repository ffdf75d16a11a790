//! Engine error types.

use laze_config::ConfigError;
use thiserror::Error;

use crate::host::{BindError, StoreError};

/// Errors surfaced by the engine.
///
/// Per-element failures never reach the caller as `Err`; they are handed to
/// the error-policy hook and the audit log. Only lifecycle and configuration
/// calls return these directly.
#[derive(Debug, Error)]
pub enum EngineError {
	/// A host capability needed to run the engine could not be set up.
	#[error("host capability '{capability}' unavailable: {reason}")]
	Setup {
		/// Name of the missing capability.
		capability: &'static str,
		/// Host-provided reason.
		reason: String,
	},

	/// Binding a deferred value into the element failed.
	#[error("activation failed: {0}")]
	Bind(#[from] BindError),

	/// The session store rejected a read or write.
	#[error("session store: {0}")]
	Store(#[from] StoreError),

	/// The resource cache rejected a URL.
	#[error("resource cache: {0}")]
	Cache(String),

	/// The persisted session map is not valid JSON.
	#[error("session state is not valid JSON: {0}")]
	Session(#[from] serde_json::Error),

	/// A configuration update was rejected.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The engine was cleaned up and cannot be used again.
	#[error("engine has been torn down")]
	TornDown,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
