use std::collections::VecDeque;

use strata_primitives::{BoxFutureStatic, OffsetSet, Span, Target, VersionedContent, VersionedSpan, poll_once};
use tokio::sync::mpsc;

use crate::provider::ValidationProvider;
use crate::validator::{Action, RangeValidator, ValidationOutcome};


/// Published to subscribers after every successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
	pub span: Span,
	/// Whether the target that triggered the validation is now fully valid.
	pub target_complete: bool,
}

struct Request<V> {
	span: VersionedSpan<V>,
	target: Target,
	priority: Option<OffsetSet>,
}

struct InFlight<V> {
	request: Request<V>,
	fut: BoxFutureStatic<ValidationOutcome>,
}

/// Drives a [`RangeValidator`] through a single [`ValidationProvider`].
///
/// Requests the provider answers inline complete before `validate` returns.
/// The rest run asynchronously, one at a time, and are collected by the owner
/// through [`Self::pump`] or [`Self::validation_completed`].
pub struct SinglePhaseRangeValidator<C: VersionedContent, P> {
	validator: RangeValidator<C>,
	provider: P,
	queue: VecDeque<Request<C::Version>>,
	in_flight: Option<InFlight<C::Version>>,
	subscribers: Vec<mpsc::UnboundedSender<Validated>>,
}

impl<C, P> SinglePhaseRangeValidator<C, P>
where
	C: VersionedContent,
	P: ValidationProvider<C::Version>,
{
	pub fn new(content: C, provider: P) -> Self {
		Self {
			validator: RangeValidator::new(content),
			provider,
			queue: VecDeque::new(),
			in_flight: None,
			subscribers: Vec::new(),
		}
	}

	pub fn validator(&self) -> &RangeValidator<C> {
		&self.validator
	}

	pub fn provider_mut(&mut self) -> &mut P {
		&mut self.provider
	}

	/// Registers an observer for every span validated from now on.
	pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Validated> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.subscribers.push(tx);
		rx
	}

	pub fn has_pending_validations(&self) -> bool {
		self.in_flight.is_some() || !self.queue.is_empty()
	}

	pub fn is_valid(&self, target: &Target) -> bool {
		self.validator.is_valid(target)
	}

	pub fn invalidate(&mut self, target: &Target) {
		self.validator.invalidate(target);
	}

	/// See [`RangeValidator::content_changed`].
	///
	/// Requests already queued or in flight still run; their results are
	/// recognised as outdated and the affected targets are validated again.
	pub fn content_changed(&mut self, span: Span, delta: isize) {
		self.validator.content_changed(span, delta);
	}

	/// Starts validating the next invalid span of `target`.
	///
	/// Inline answers are chained until the target is valid, the provider
	/// declines, or a request has to queue. Returns the first action taken.
	pub fn validate(&mut self, mut target: Target, mut priority: Option<OffsetSet>) -> Action<C::Version> {
		let mut first = None;
		loop {
			let outstanding = self.has_pending_validations();
			let action = self.validator.begin_validation(&target, priority.as_ref());
			let Action::Needed(span) = &action else {
				return first.unwrap_or(action);
			};

			let request = Request {
				span: span.clone(),
				target,
				priority,
			};
			let taken = first.get_or_insert(action).clone();

			if outstanding {
				tracing::trace!(span = ?request.span.value, "single_phase.queued");
				self.queue.push_back(request);
				return taken;
			}

			let Some(outcome) = self.provider.validate_sync(&request.span) else {
				self.queue.push_back(request);
				self.start_next();
				return taken;
			};
			match self.complete(request, outcome) {
				Some(next) => (target, priority) = next,
				None => return taken,
			}
		}
	}

	fn start_next(&mut self) -> bool {
		if self.in_flight.is_some() {
			return false;
		}
		let Some(request) = self.queue.pop_front() else {
			return false;
		};

		tracing::trace!(span = ?request.span.value, "single_phase.async.start");
		let fut = self.provider.validate_async(request.span.clone());
		self.in_flight = Some(InFlight { request, fut });
		true
	}

	fn finish_in_flight(&mut self, outcome: ValidationOutcome) {
		if let Some(flight) = self.in_flight.take()
			&& let Some((target, priority)) = self.complete(flight.request, outcome)
		{
			self.validate(target, priority);
		}
	}

	/// Records `outcome`. Returns the request's target and priority when the
	/// target still needs validating.
	fn complete(
		&mut self,
		request: Request<C::Version>,
		outcome: ValidationOutcome,
	) -> Option<(Target, Option<OffsetSet>)> {
		let Request { span, target, priority } = request;
		self.validator.complete_validation(&span, outcome);

		let changed = span.version != self.validator.content().current_version();
		match outcome {
			_ if changed => {
				tracing::trace!(span = ?span.value, "single_phase.retry.version_changed");
				Some((target, priority))
			}
			ValidationOutcome::Success(validated) => {
				let target_complete = self.validator.is_valid(&target);
				self.publish(Validated {
					span: validated,
					target_complete,
				});
				(!target_complete).then_some((target, priority))
			}
			ValidationOutcome::Stale => {
				tracing::warn!(span = ?span.value, version = ?span.version, "single_phase.stale_without_change");
				None
			}
		}
	}

	fn publish(&mut self, event: Validated) {
		tracing::trace!(span = ?event.span, complete = event.target_complete, "single_phase.validated");
		self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
	}

	/// Collects a finished async validation and starts the next queued one.
	///
	/// Never blocks. Returns true if any validation completed.
	pub fn pump(&mut self) -> bool {
		let mut progressed = false;
		loop {
			if self.in_flight.is_none() && !self.start_next() {
				return progressed;
			}
			let Some(flight) = self.in_flight.as_mut() else {
				return progressed;
			};
			let Some(outcome) = poll_once(flight.fut.as_mut()) else {
				return progressed;
			};

			self.finish_in_flight(outcome);
			progressed = true;
		}
	}

	/// Runs queued validations until none are left.
	pub async fn validation_completed(&mut self) {
		loop {
			if self.in_flight.is_none() && !self.start_next() {
				return;
			}
			let Some(flight) = self.in_flight.as_mut() else {
				return;
			};

			let outcome = flight.fut.as_mut().await;
			self.finish_in_flight(outcome);
		}
	}
}
