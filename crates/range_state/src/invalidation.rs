use strata_primitives::Target;

/// Receives invalidated regions.
pub type InvalidationHandler = Box<dyn FnMut(Target) + Send>;

/// Coalesces invalidations raised while a batch of edits is in progress.
///
/// Outside of buffering every target goes straight to the handler. Buffering
/// nests; the union of everything invalidated is delivered once, when the
/// outermost [`Self::end_buffering`] runs.
pub struct RangeInvalidationBuffer {
	handler: InvalidationHandler,
	depth: usize,
	buffered: Option<Target>,
}

impl RangeInvalidationBuffer {
	pub fn new(handler: impl FnMut(Target) + Send + 'static) -> Self {
		Self {
			handler: Box::new(handler),
			depth: 0,
			buffered: None,
		}
	}

	pub fn is_buffering(&self) -> bool {
		self.depth > 0
	}

	pub fn invalidate(&mut self, target: Target) {
		if !self.is_buffering() {
			(self.handler)(target);
			return;
		}

		self.buffered = Some(match self.buffered.take() {
			Some(buffered) => buffered.union(&target),
			None => target,
		});
	}

	pub fn begin_buffering(&mut self) {
		self.depth += 1;
	}

	/// # Panics
	///
	/// Panics if buffering was never begun.
	pub fn end_buffering(&mut self) {
		assert!(self.depth > 0, "invalidation buffering ended while not buffering");
		self.depth -= 1;
		if self.depth > 0 {
			return;
		}

		if let Some(target) = self.buffered.take() {
			tracing::trace!(?target, "invalidation.flush");
			(self.handler)(target);
		}
	}
}
