//! Tokio driver for [`laze_engine::Engine`].
//!
//! The engine is a synchronous state machine that needs someone to feed it
//! host events, call [`Engine::on_frame`] when a detector notification is
//! waiting, and call [`Engine::advance`] at its timer deadlines. [`spawn`]
//! moves one engine onto a task that does exactly that and hands back a
//! cloneable [`DriverHandle`].
//!
//! [`Engine::on_frame`]: laze_engine::Engine::on_frame
//! [`Engine::advance`]: laze_engine::Engine::advance

mod driver;
pub mod error;

pub use driver::{DriverConfig, DriverHandle, spawn};
pub use error::{DriverError, Result};
