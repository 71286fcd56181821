use strata_primitives::{Mutation, OffsetSet, Span, Target, VersionedContent, VersionedSpan};

#[cfg(test)]
mod tests;

/// Result every validation provider must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationOutcome {
	/// The content changed underneath the request; nothing was validated.
	Stale,
	/// The given span is now valid.
	Success(Span),
}

/// Decision returned by [`RangeValidator::begin_validation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<V> {
	/// Nothing in the target needs work right now.
	None,
	/// This span must be validated against this content version.
	Needed(VersionedSpan<V>),
}

impl<V> Action<V> {
	pub fn is_needed(&self) -> bool {
		matches!(self, Action::Needed(_))
	}
}

/// Valid/pending/invalid bookkeeping over versioned content.
///
/// The validator performs no work itself. Callers ask it which span to
/// validate next, run the validation however they like, then report the
/// outcome. Every offset is in exactly one state: valid, pending (a request
/// is in flight), or invalid (everything else).
pub struct RangeValidator<C: VersionedContent> {
	content: C,
	valid: OffsetSet,
	pending: OffsetSet,
	outstanding: usize,
}

impl<C: VersionedContent> RangeValidator<C> {
	pub fn new(content: C) -> Self {
		Self {
			content,
			valid: OffsetSet::new(),
			pending: OffsetSet::new(),
			outstanding: 0,
		}
	}

	pub fn content(&self) -> &C {
		&self.content
	}

	pub fn valid_set(&self) -> &OffsetSet {
		&self.valid
	}

	pub fn pending_set(&self) -> &OffsetSet {
		&self.pending
	}

	/// Returns true while any begun validation has not been completed.
	pub fn has_outstanding_validations(&self) -> bool {
		self.outstanding > 0
	}

	fn length(&self) -> usize {
		self.content.current_length()
	}

	/// Marks a region invalid, including any part of it that is in flight.
	pub fn invalidate(&mut self, target: &Target) {
		let set = target.materialize(self.length());
		if set.is_empty() {
			return;
		}

		self.valid.subtract_in_place(&set);
		self.pending.subtract_in_place(&set);
		tracing::trace!(?set, "validator.invalidate");
	}

	pub fn is_valid(&self, target: &Target) -> bool {
		self.valid.contains_set(&target.materialize(self.length()))
	}

	fn next_needed_span(&self, target: &Target, priority: Option<&OffsetSet>) -> Option<Span> {
		let length = self.length();
		let candidates = OffsetSet::full(length)
			.subtract(&self.valid)
			.intersection(&target.materialize(length))
			.subtract(&self.pending);

		let limit = priority.and_then(OffsetSet::first).unwrap_or(0);
		candidates
			.iter()
			.find(|span| span.end > limit)
			.or_else(|| candidates.iter().next())
	}

	/// Picks the next invalid span of `target` and marks it pending.
	///
	/// Runs whose end extends past the first offset of `priority` are preferred.
	pub fn begin_validation(&mut self, target: &Target, priority: Option<&OffsetSet>) -> Action<C::Version> {
		let Some(span) = self.next_needed_span(target, priority) else {
			return Action::None;
		};

		self.pending.insert_span(span);
		self.outstanding += 1;

		let version = self.content.current_version();
		tracing::trace!(?span, ?version, outstanding = self.outstanding, "validator.begin");
		Action::Needed(VersionedSpan::new(span, version))
	}

	/// Records the outcome of a request made by [`Self::begin_validation`].
	///
	/// Results for an outdated content version discard all pending work.
	/// Parts of the request invalidated while it was in flight stay invalid.
	///
	/// # Panics
	///
	/// Panics if no validation is outstanding.
	pub fn complete_validation(&mut self, request: &VersionedSpan<C::Version>, outcome: ValidationOutcome) {
		assert!(self.outstanding > 0, "completed {request:?} with no validation outstanding");
		self.outstanding -= 1;

		if request.version != self.content.current_version() {
			tracing::trace!(span = ?request.value, "validator.complete.version_mismatch");
			self.pending = OffsetSet::new();
			return;
		}

		match outcome {
			ValidationOutcome::Stale => {
				self.pending.remove_span(request.value);
			}
			ValidationOutcome::Success(span) => {
				let revoked = OffsetSet::from_span(request.value).subtract(&self.pending);
				self.pending.remove_span(request.value);
				self.pending.remove_span(span);

				let validated = OffsetSet::from_span(span).subtract(&revoked);
				self.valid.union_in_place(&validated);
			}
		}
	}

	/// Moves the valid set through an edit and drops all pending work.
	///
	/// `span` is in pre-edit coordinates and the content must already report
	/// its post-edit length. Inserting "d" at the end of "abc" is
	/// `([3, 3), 1)`; deleting the "b" is `([1, 2), -1)`.
	pub fn content_changed(&mut self, span: Span, delta: isize) {
		let length = self.length();
		let limit = match length.checked_add_signed(-delta) {
			Some(limit) => limit,
			None => panic!("content length {length} is inconsistent with delta {delta}"),
		};

		self.valid = Mutation::with_limit(span, delta, limit).transform(&self.valid);
		self.pending = OffsetSet::new();
	}
}
