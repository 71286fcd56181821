//! Demand-driven sequential processing of a linear domain.
//!
//! A [`RangeProcessor`] tracks how far into some content an expensive,
//! strictly sequential pass (typically an incremental parse) has gotten. It
//! turns "I need offset X" requests into fill mutations and forwards content
//! edits that touch the processed prefix, serializing both through one FIFO.

use std::collections::VecDeque;
use std::future::Future;

use strata_primitives::{LengthProvider, Mutation, Span, Versioned};
use tokio::sync::oneshot;

#[cfg(test)]
mod tests;

/// How much work a location request may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
	/// Never process; only report the current state.
	None,
	/// Process later, on the next [`RangeProcessor::pump`].
	///
	/// Both the minimum and maximum fill deltas apply.
	Optional,
	/// Process now. The maximum fill delta is ignored.
	Required,
}

/// What the owner did with a mutation handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
	/// The mutation was fully applied before returning.
	Applied,
	/// The mutation will be completed later with [`RangeProcessor::complete_change`].
	Deferred,
}

/// Receives every mutation the processor emits.
///
/// The mutation's [`Mutation::post_apply_limit`] is the furthest offset the
/// handler may read once the mutation is applied.
pub trait ChangeHandler {
	fn handle_change(&mut self, mutation: &Mutation) -> ChangeStatus;
}

impl<F> ChangeHandler for F
where
	F: FnMut(&Mutation) -> ChangeStatus,
{
	fn handle_change(&mut self, mutation: &Mutation) -> ChangeStatus {
		self(mutation)
	}
}

/// Fill step bounds for a [`RangeProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeProcessorCfg {
	/// Smallest fill mutation, used for every fill mode.
	pub min_delta: usize,
	/// Largest fill mutation, only used for optional fills.
	pub max_delta: usize,
}

impl Default for RangeProcessorCfg {
	fn default() -> Self {
		Self {
			min_delta: 1,
			max_delta: usize::MAX,
		}
	}
}

enum Event {
	Change(Versioned<u64, Mutation>),
	Waiter(oneshot::Sender<()>),
}

/// Lazily processes a prefix of linear content.
///
/// `processed(x)` becomes true once everything before `x` has gone through the
/// change handler and been completed. Fill requests and content edits are
/// queued in one FIFO; completions must arrive in that order.
pub struct RangeProcessor {
	cfg: RangeProcessorCfg,
	length: LengthProvider,
	events: VecDeque<Event>,
	processed_upper_bound: usize,
	projected_upper_bound: usize,
	target_location: usize,
	version: u64,
	processed_version: u64,
	fill_scheduled: bool,
}

impl RangeProcessor {
	pub fn new(cfg: RangeProcessorCfg, length: LengthProvider) -> Self {
		Self {
			cfg,
			length,
			events: VecDeque::new(),
			processed_upper_bound: 0,
			projected_upper_bound: 0,
			target_location: 0,
			version: 0,
			processed_version: 0,
			fill_scheduled: false,
		}
	}

	pub fn cfg(&self) -> &RangeProcessorCfg {
		&self.cfg
	}

	fn content_length(&self) -> usize {
		(self.length)()
	}

	/// Exclusive end of the completed, contiguous processed prefix.
	pub fn processed_upper_bound(&self) -> usize {
		self.processed_upper_bound
	}

	/// Processed bound once every queued change has completed.
	pub fn projected_upper_bound(&self) -> usize {
		self.projected_upper_bound
	}

	pub fn processed(&self, offset: usize) -> bool {
		offset <= self.processed_upper_bound
	}

	pub fn processed_span(&self, span: Span) -> bool {
		self.processed(span.end)
	}

	pub fn has_pending_changes(&self) -> bool {
		self.events.iter().any(|event| matches!(event, Event::Change(_)))
	}

	/// Returns true if a deferred fill is waiting for [`Self::pump`].
	pub fn has_scheduled_fill(&self) -> bool {
		self.fill_scheduled
	}

	/// Queued mutations in the order they will complete.
	///
	/// Offsets computed before these mutations complete can be brought into
	/// current coordinates with [`strata_primitives::OffsetSet::apply`].
	pub fn pending_mutations(&self) -> impl Iterator<Item = &Mutation> + '_ {
		self.events.iter().filter_map(|event| match event {
			Event::Change(change) => Some(&change.value),
			Event::Waiter(_) => None,
		})
	}

	fn fill_mutation_needed(&self, offset: usize, mode: FillMode) -> Option<Mutation> {
		let length = self.content_length();
		assert!(offset <= length, "offset {offset} is beyond content length {length}");

		let start = self.projected_upper_bound;
		if offset <= start {
			return None;
		}

		let max_delta = match mode {
			FillMode::Required => usize::MAX,
			FillMode::None | FillMode::Optional => self.cfg.max_delta.max(self.cfg.min_delta),
		};
		let delta = (offset - start)
			.clamp(self.cfg.min_delta, max_delta)
			.min(length.saturating_sub(start));

		(delta > 0).then(|| Mutation::new(Span::empty(start), delta as isize))
	}

	/// Makes sure `offset` is processed, as far as `mode` allows.
	///
	/// Returns whether `offset` is processed on return.
	///
	/// # Panics
	///
	/// Panics if `offset` is beyond the current content length.
	pub fn process_location(&mut self, offset: usize, mode: FillMode, handler: &mut impl ChangeHandler) -> bool {
		let Some(mutation) = self.fill_mutation_needed(offset, mode) else {
			return self.processed(offset);
		};

		match mode {
			FillMode::None => return false,
			FillMode::Optional => {
				self.target_location = self.target_location.max(offset);
				self.fill_scheduled = true;
				tracing::trace!(offset, target = self.target_location, "processor.fill.scheduled");
			}
			FillMode::Required => self.process_mutation(mutation, handler),
		}

		self.processed(offset)
	}

	/// Forwards a content edit that touches the processed prefix.
	///
	/// Edits starting past the processed prefix, or arriving before anything
	/// was processed, are ignored since that content has never been read.
	/// Edits straddling the boundary are trimmed to the processed part. Every
	/// edit except an append at the processed end carries the processed bound
	/// as its limit.
	pub fn did_change_content(&mut self, span: Span, delta: isize, handler: &mut impl ChangeHandler) {
		let bound = self.projected_upper_bound;
		if bound == 0 || span.start > bound {
			tracing::trace!(?span, delta, bound, "processor.change.unprocessed");
			return;
		}

		let trimmed = Span::new(span.start, span.end.min(bound));
		let delta = delta.max(-(trimmed.len() as isize));
		if trimmed.is_empty() && delta == 0 {
			return;
		}

		let mutation = if trimmed.is_empty() && trimmed.start == bound {
			Mutation::new(trimmed, delta)
		} else {
			Mutation::with_limit(trimmed, delta, bound)
		};

		self.process_mutation(mutation, handler);
	}

	fn process_mutation(&mut self, mutation: Mutation, handler: &mut impl ChangeHandler) {
		let version = self.version;
		self.version += 1;
		self.events.push_back(Event::Change(Versioned::new(mutation, version)));

		self.projected_upper_bound = shift(self.projected_upper_bound, mutation.delta);
		tracing::trace!(
			version,
			span = ?mutation.span,
			delta = mutation.delta,
			projected = self.projected_upper_bound,
			"processor.change.queued"
		);

		match handler.handle_change(&mutation) {
			ChangeStatus::Applied => self.complete_change(&mutation),
			ChangeStatus::Deferred => {}
		}
	}

	/// Completes the oldest queued mutation.
	///
	/// # Panics
	///
	/// Panics if `mutation` is not the oldest queued mutation.
	pub fn complete_change(&mut self, mutation: &Mutation) {
		self.resume_leading_waiters();

		let Some(Event::Change(head)) = self.events.pop_front() else {
			panic!("completed {mutation:?} with no change pending");
		};
		assert_eq!(head.version, self.processed_version, "changes must always be completed in order");
		assert_eq!(&head.value, mutation, "completed mutation does not match the oldest pending change");
		self.processed_version += 1;

		self.resume_leading_waiters();

		self.processed_upper_bound = shift(self.processed_upper_bound, mutation.delta);
		self.fill_scheduled = true;
		tracing::trace!(version = head.version, bound = self.processed_upper_bound, "processor.change.completed");
	}

	/// Resolves once every change queued before this call has completed.
	///
	/// Completing changes can schedule more fill, so callers waiting for
	/// quiescence should re-check [`Self::has_pending_changes`].
	pub fn processing_completed(&mut self) -> impl Future<Output = ()> + Send + 'static {
		let waiter = self.has_pending_changes().then(|| {
			let (tx, rx) = oneshot::channel();
			self.events.push_back(Event::Waiter(tx));
			rx
		});

		async move {
			if let Some(rx) = waiter {
				let _ = rx.await;
			}
		}
	}

	/// Runs a fill towards the optional-fill watermark if nothing is queued.
	pub fn continue_filling_if_needed(&mut self, handler: &mut impl ChangeHandler) {
		if self.has_pending_changes() {
			return;
		}
		self.fill_scheduled = false;

		self.target_location = self.target_location.min(self.content_length());
		if let Some(mutation) = self.fill_mutation_needed(self.target_location, FillMode::Optional) {
			self.process_mutation(mutation, handler);
		}
	}

	/// Runs deferred work. Returns true if a mutation was emitted.
	pub fn pump(&mut self, handler: &mut impl ChangeHandler) -> bool {
		if !self.fill_scheduled {
			return false;
		}

		let version = self.version;
		self.continue_filling_if_needed(handler);
		self.version != version
	}

	fn resume_leading_waiters(&mut self) {
		while let Some(Event::Waiter(_)) = self.events.front() {
			if let Some(Event::Waiter(waiter)) = self.events.pop_front() {
				let _ = waiter.send(());
			}
		}
	}
}

fn shift(bound: usize, delta: isize) -> usize {
	match bound.checked_add_signed(delta) {
		Some(bound) => bound,
		None => panic!("processed bound {bound} cannot shrink by {}", delta.unsigned_abs()),
	}
}
