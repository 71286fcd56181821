use strata_primitives::{BoxFutureStatic, Span, VersionedSpan};

use crate::validator::ValidationOutcome;

/// Performs validation work for a [`crate::SinglePhaseRangeValidator`].
///
/// A provider may answer inline from [`Self::validate_sync`] or decline with
/// `None`, in which case the request is retried through
/// [`Self::validate_async`].
pub trait ValidationProvider<V>: Send {
	fn validate_sync(&mut self, span: &VersionedSpan<V>) -> Option<ValidationOutcome>;

	fn validate_async(&mut self, span: VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome>;
}

type SyncFn<V> = Box<dyn FnMut(&VersionedSpan<V>) -> Option<ValidationOutcome> + Send>;
type AsyncFn<V> = Box<dyn FnMut(VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> + Send>;

/// A [`ValidationProvider`] built from a pair of closures.
pub struct HybridProvider<V> {
	sync: SyncFn<V>,
	async_fn: AsyncFn<V>,
}

impl<V> HybridProvider<V> {
	pub fn new<S, A>(sync: S, async_fn: A) -> Self
	where
		S: FnMut(&VersionedSpan<V>) -> Option<ValidationOutcome> + Send + 'static,
		A: FnMut(VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> + Send + 'static,
	{
		Self {
			sync: Box::new(sync),
			async_fn: Box::new(async_fn),
		}
	}

	/// A provider that never answers inline.
	pub fn asynchronous<A>(async_fn: A) -> Self
	where
		A: FnMut(VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> + Send + 'static,
	{
		Self::new(|_| None, async_fn)
	}
}

impl<V> ValidationProvider<V> for HybridProvider<V> {
	fn validate_sync(&mut self, span: &VersionedSpan<V>) -> Option<ValidationOutcome> {
		(self.sync)(span)
	}

	fn validate_async(&mut self, span: VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> {
		(self.async_fn)(span)
	}
}

/// Performs the delayed, expensive pass of a [`crate::ThreePhaseRangeValidator`].
pub trait SecondaryProvider<V>: Send {
	fn validate(&mut self, span: VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome>;
}

impl<V, F> SecondaryProvider<V> for F
where
	F: FnMut(VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> + Send,
{
	fn validate(&mut self, span: VersionedSpan<V>) -> BoxFutureStatic<ValidationOutcome> {
		self(span)
	}
}

/// Synchronous handler run by the fallback phase for every span the primary
/// phase has just validated.
pub type FallbackHandler = Box<dyn FnMut(Span) + Send>;
