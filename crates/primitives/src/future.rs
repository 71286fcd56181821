use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// A pinned, boxed future that is required to be Send and 'static.
pub type BoxFutureStatic<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Polls a future once without registering for wakeups.
///
/// Owners use this to collect finished background work on their own turn.
/// A `None` result says nothing about when the future will be ready.
pub fn poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
	let mut cx = Context::from_waker(Waker::noop());
	match Pin::new(&mut fut).poll(&mut cx) {
		Poll::Ready(res) => Some(res),
		Poll::Pending => None,
	}
}

/// Wraps an already computed value.
pub fn ready<T: Send + 'static>(value: T) -> BoxFutureStatic<T> {
	Box::pin(std::future::ready(value))
}
