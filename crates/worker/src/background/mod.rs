use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{TaskClass, spawn_named_thread};


type Job<R> = Box<dyn FnOnce(&mut R) + Send>;

/// Failures reported by [`BackgroundProcessor`] access paths.
#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
	/// Background work is outstanding, so the resource cannot be used inline.
	#[error("resource is busy with background work")]
	Unavailable,
	/// The worker thread went away before answering.
	#[error("background worker disconnected")]
	Disconnected,
	/// The operation panicked on the worker thread.
	#[error("background operation panicked: {0}")]
	Panicked(String),
	/// The worker thread could not be started.
	#[error("failed to start background worker: {0}")]
	Spawn(#[from] std::io::Error),
}

/// Guards a resource that must only be touched from one context at a time.
///
/// The resource is owned by a dedicated worker thread that runs dispatched
/// operations strictly in submission order. While no dispatched work is
/// outstanding, the owner may also run operations inline on its own thread.
/// Outstanding work is counted from dispatch until the job has run and the
/// owner has consumed (or dropped) the returned [`Ticket`], so inline access
/// can neither overtake a result the owner has not yet observed nor wait on a
/// job that is still running.
pub struct BackgroundProcessor<R> {
	resource: Arc<Mutex<R>>,
	jobs: mpsc::UnboundedSender<Job<R>>,
	pending: Arc<AtomicUsize>,
}

impl<R: Send + 'static> BackgroundProcessor<R> {
	/// Moves `resource` behind a new worker thread called `name`.
	pub fn new(name: impl Into<String>, resource: R) -> Result<Self, BackgroundError> {
		let resource = Arc::new(Mutex::new(resource));
		let (jobs, mut rx) = mpsc::unbounded_channel::<Job<R>>();

		let worker = Arc::clone(&resource);
		spawn_named_thread(TaskClass::Background, name, move || {
			while let Some(job) = rx.blocking_recv() {
				let mut guard = worker.lock();
				job(&mut guard);
			}
			tracing::trace!("background.worker.exit");
		})?;

		Ok(Self {
			resource,
			jobs,
			pending: Arc::new(AtomicUsize::new(0)),
		})
	}

	pub fn has_pending_work(&self) -> bool {
		self.pending_count() > 0
	}

	/// Number of dispatched operations whose results the owner has not consumed.
	pub fn pending_count(&self) -> usize {
		self.pending.load(Ordering::Acquire)
	}

	/// Runs `op` inline, but only when nothing is outstanding.
	pub fn access_synchronously<T>(&self, op: impl FnOnce(&mut R) -> T) -> Result<T, BackgroundError> {
		if self.has_pending_work() {
			return Err(BackgroundError::Unavailable);
		}

		let mut guard = self.resource.lock();
		Ok(op(&mut guard))
	}

	/// Runs `op` inline when `prefer_synchronous` is set and the resource is
	/// idle, otherwise dispatches it to the worker thread.
	pub fn access_value<T, F>(&self, prefer_synchronous: bool, op: F) -> Access<T>
	where
		T: Send + 'static,
		F: FnOnce(&mut R) -> T + Send + 'static,
	{
		if prefer_synchronous && !self.has_pending_work() {
			let mut guard = self.resource.lock();
			return Access::Ready(op(&mut guard));
		}

		Access::Pending(self.dispatch(op))
	}

	/// Dispatches `op` to the worker thread and awaits its result.
	pub async fn access<T, F>(&self, op: F) -> Result<T, BackgroundError>
	where
		T: Send + 'static,
		F: FnOnce(&mut R) -> T + Send + 'static,
	{
		self.dispatch(op).await
	}

	/// Queues `op` behind all previously dispatched work.
	pub fn dispatch<T, F>(&self, op: F) -> Ticket<T>
	where
		T: Send + 'static,
		F: FnOnce(&mut R) -> T + Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
		let slot = Arc::new(Slot {
			pending: Arc::clone(&self.pending),
		});

		let worker_slot = Arc::clone(&slot);
		let job: Job<R> = Box::new(move |resource: &mut R| {
			let result = panic::catch_unwind(AssertUnwindSafe(|| op(resource)))
				.map_err(|payload| BackgroundError::Panicked(panic_message(payload.as_ref())));
			if let Err(BackgroundError::Panicked(message)) = &result {
				tracing::error!(%message, "background.job.panicked");
			}
			// The worker's hold ends before the owner can observe the result.
			drop(worker_slot);
			let _ = tx.send(result);
		});

		tracing::trace!(pending, "background.dispatch");
		if self.jobs.send(job).is_err() {
			tracing::warn!("background.dispatch.disconnected");
		}

		Ticket { rx, slot: Some(slot) }
	}
}

/// One dispatched job's share of the outstanding count.
///
/// Held by both the job and its ticket; the count drops once both are gone.
struct Slot {
	pending: Arc<AtomicUsize>,
}

impl Drop for Slot {
	fn drop(&mut self) {
		let before = self.pending.fetch_sub(1, Ordering::AcqRel);
		assert!(before > 0, "background pending count underflow");
	}
}

/// Result of [`BackgroundProcessor::access_value`].
#[must_use]
pub enum Access<T> {
	/// The operation ran inline.
	Ready(T),
	/// The operation was dispatched; its result arrives through the ticket.
	Pending(Ticket<T>),
}

impl<T> Access<T> {
	pub fn is_ready(&self) -> bool {
		matches!(self, Access::Ready(_))
	}

	/// Waits for the value regardless of which path produced it.
	pub async fn resolve(self) -> Result<T, BackgroundError> {
		match self {
			Access::Ready(value) => Ok(value),
			Access::Pending(ticket) => ticket.await,
		}
	}
}

/// Handle to the result of a dispatched operation.
///
/// The operation keeps its slot in the outstanding count until it has run and
/// its result has been consumed, or the ticket dropped.
#[must_use = "dropping a ticket discards the background result"]
pub struct Ticket<T> {
	rx: oneshot::Receiver<Result<T, BackgroundError>>,
	slot: Option<Arc<Slot>>,
}

impl<T> Future for Ticket<T> {
	type Output = Result<T, BackgroundError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = &mut *self;
		match Pin::new(&mut this.rx).poll(cx) {
			Poll::Ready(result) => {
				this.slot = None;
				Poll::Ready(result.unwrap_or(Err(BackgroundError::Disconnected)))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_owned()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".to_owned()
	}
}
