use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::TaskClass;

/// Runtime used by owners that query from outside of any tokio context.
fn detached_runtime() -> &'static Runtime {
	static DETACHED: OnceLock<Runtime> = OnceLock::new();
	DETACHED.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.thread_name("strata-blocking")
			.build()
			.expect("strata-worker detached runtime must build")
	})
}

/// Runs `f` on the blocking pool of the current runtime, or of a detached
/// single-worker runtime when called outside of one.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let handle = Handle::try_current().unwrap_or_else(|_| detached_runtime().handle().clone());
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	handle.spawn_blocking(f)
}

/// Starts the OS thread that owns a background resource.
pub fn spawn_named_thread<F, R>(class: TaskClass, name: impl Into<String>, f: F) -> std::io::Result<std::thread::JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let name = name.into();
	tracing::trace!(worker_class = class.as_str(), thread = %name, "worker.spawn_named_thread");
	std::thread::Builder::new().name(name).spawn(f)
}
