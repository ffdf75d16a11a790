//! Driver error types.

use laze_engine::EngineError;
use thiserror::Error;

/// Errors returned through a [`crate::DriverHandle`].
#[derive(Debug, Error)]
pub enum DriverError {
	/// The driver task has stopped; the request was not delivered.
	#[error("lazy-load driver is not running")]
	Closed,

	/// The engine rejected the request.
	#[error(transparent)]
	Engine(#[from] EngineError),
}

/// Result type for driver requests.
pub type Result<T> = std::result::Result<T, DriverError>;
