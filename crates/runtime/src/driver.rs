use std::time::Duration;

use laze_engine::{ConfigPatch, Engine, IntersectionEntry, MetricsSnapshot, ResourceKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{DriverError, Result};


/// Tuning for [`spawn`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
	/// Coalescing window between a detector notification and its frame.
	pub frame_interval: Duration,
	/// Capacity of the control channel; senders wait when it is full.
	pub control_capacity: usize,
}

impl Default for DriverConfig {
	fn default() -> Self {
		Self {
			frame_interval: Duration::from_millis(16),
			control_capacity: 32,
		}
	}
}

#[derive(Debug)]
enum Event {
	Intersections(ResourceKind, Vec<IntersectionEntry>),
	Mutation,
	Scroll(f64),
	Resize,
}

enum Control {
	Pause,
	Resume,
	UpdateConfig(ConfigPatch, oneshot::Sender<laze_engine::Result<()>>),
	ClearState(oneshot::Sender<laze_engine::Result<()>>),
	ExportMetrics(oneshot::Sender<MetricsSnapshot>),
}

/// Cloneable handle to a running driver.
///
/// Host events are fire-and-forget; control requests wait for the driver to
/// pick them up and, where they produce a value, for the reply.
#[derive(Debug, Clone)]
pub struct DriverHandle {
	events: mpsc::UnboundedSender<Event>,
	control: mpsc::Sender<Control>,
	cancel: CancellationToken,
}

impl DriverHandle {
	/// Forwards a detector notification.
	pub fn intersections(&self, kind: ResourceKind, entries: Vec<IntersectionEntry>) -> Result<()> {
		self.event(Event::Intersections(kind, entries))
	}

	/// Elements were added to the document.
	pub fn mutation(&self) -> Result<()> {
		self.event(Event::Mutation)
	}

	pub fn scroll(&self, scroll_y: f64) -> Result<()> {
		self.event(Event::Scroll(scroll_y))
	}

	pub fn resize(&self) -> Result<()> {
		self.event(Event::Resize)
	}

	pub async fn pause(&self) -> Result<()> {
		self.send(Control::Pause).await
	}

	pub async fn resume(&self) -> Result<()> {
		self.send(Control::Resume).await
	}

	pub async fn update_config(&self, patch: ConfigPatch) -> Result<()> {
		let (tx, rx) = oneshot::channel();
		self.send(Control::UpdateConfig(patch, tx)).await?;
		let reply = rx.await.map_err(|_| DriverError::Closed)?;
		reply.map_err(DriverError::from)
	}

	pub async fn clear_state(&self) -> Result<()> {
		let (tx, rx) = oneshot::channel();
		self.send(Control::ClearState(tx)).await?;
		let reply = rx.await.map_err(|_| DriverError::Closed)?;
		reply.map_err(DriverError::from)
	}

	pub async fn export_metrics(&self) -> Result<MetricsSnapshot> {
		let (tx, rx) = oneshot::channel();
		self.send(Control::ExportMetrics(tx)).await?;
		rx.await.map_err(|_| DriverError::Closed)
	}

	/// Stops the driver. The engine is cleaned up before the task returns it.
	pub fn shutdown(&self) {
		self.cancel.cancel();
	}

	pub fn is_shut_down(&self) -> bool {
		self.cancel.is_cancelled()
	}

	fn event(&self, event: Event) -> Result<()> {
		self.events.send(event).map_err(|_| DriverError::Closed)
	}

	async fn send(&self, control: Control) -> Result<()> {
		self.control.send(control).await.map_err(|_| DriverError::Closed)
	}
}

/// Starts `engine` on a new task of the current tokio runtime.
///
/// The task runs until [`DriverHandle::shutdown`] is called or every handle
/// is dropped, then returns the cleaned-up engine.
pub fn spawn(engine: Engine, config: DriverConfig) -> (DriverHandle, JoinHandle<Engine>) {
	let (event_tx, event_rx) = mpsc::unbounded_channel();
	let (control_tx, control_rx) = mpsc::channel(config.control_capacity.max(1));
	let cancel = CancellationToken::new();
	let handle = DriverHandle {
		events: event_tx,
		control: control_tx,
		cancel: cancel.clone(),
	};
	let span = tracing::debug_span!("laze.driver");
	let task = tokio::spawn(run(engine, config, event_rx, control_rx, cancel).instrument(span));
	(handle, task)
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

async fn run(
	mut engine: Engine,
	config: DriverConfig,
	mut events: mpsc::UnboundedReceiver<Event>,
	mut control: mpsc::Receiver<Control>,
	cancel: CancellationToken,
) -> Engine {
	if let Err(error) = engine.start(Instant::now().into_std()) {
		tracing::warn!(%error, "driver.start_failed");
		return engine;
	}

	let mut next_frame: Option<Instant> = None;
	loop {
		if engine.wants_frame() {
			next_frame.get_or_insert_with(|| Instant::now() + config.frame_interval);
		} else {
			next_frame = None;
		}
		let timer = engine.next_deadline().map(Instant::from_std);
		let wake = match (next_frame, timer) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		};

		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			msg = control.recv() => {
				let Some(msg) = msg else { break };
				handle_control(&mut engine, msg);
			}
			event = events.recv() => {
				let Some(event) = event else { break };
				handle_event(&mut engine, event);
			}
			_ = sleep_until(wake) => {
				let now = Instant::now();
				if next_frame.is_some_and(|frame| frame <= now) {
					next_frame = None;
					engine.on_frame(now.into_std());
				}
				engine.advance(now.into_std());
			}
		}
	}

	engine.cleanup();
	let loaded = engine.descriptors().filter(|d| d.loaded()).count();
	tracing::debug!(descriptors = engine.descriptors().count(), loaded, "driver.stopped");
	engine
}

fn handle_event(engine: &mut Engine, event: Event) {
	let now = Instant::now().into_std();
	match event {
		Event::Intersections(kind, entries) => engine.on_intersections(kind, entries),
		Event::Mutation => engine.on_mutation(now),
		Event::Scroll(scroll_y) => {
			engine.on_scroll(scroll_y, now);
			tracing::trace!(scroll_y, direction = ?engine.scroll_direction(), "driver.scroll");
		}
		Event::Resize => engine.on_resize(now),
	}
}

fn handle_control(engine: &mut Engine, msg: Control) {
	let now = Instant::now().into_std();
	match msg {
		Control::Pause => engine.pause(),
		Control::Resume => engine.resume(now),
		Control::UpdateConfig(patch, reply) => {
			let _ = reply.send(engine.update_config(patch, now));
		}
		Control::ClearState(reply) => {
			let _ = reply.send(engine.clear_state());
		}
		Control::ExportMetrics(reply) => {
			let _ = reply.send(engine.export_metrics());
		}
	}
}
