//! Primary, fallback and delayed secondary validation over one content.

use std::time::Duration;

use strata_primitives::{BoxFutureStatic, OffsetSet, Span, Target, VersionedContent, VersionedSpan, poll_once};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::provider::{FallbackHandler, SecondaryProvider, ValidationProvider};
use crate::single_phase::{SinglePhaseRangeValidator, Validated};
use crate::validator::{Action, RangeValidator, ValidationOutcome};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreePhaseCfg {
	/// Quiet period after the last primary result before the secondary pass runs.
	pub secondary_delay: Duration,
}

impl Default for ThreePhaseCfg {
	fn default() -> Self {
		Self {
			secondary_delay: Duration::from_secs(2),
		}
	}
}

enum Secondary<V> {
	Idle,
	Waiting {
		deadline: Instant,
		version: V,
		target: Target,
	},
	Running {
		request: VersionedSpan<V>,
		target: Target,
		fut: BoxFutureStatic<ValidationOutcome>,
	},
}

/// Layers a cheap synchronous fallback and a debounced secondary pass on top
/// of a [`SinglePhaseRangeValidator`].
///
/// Each span the primary phase validates is immediately handed to the
/// fallback handler. Once the primary phase goes quiet for
/// [`ThreePhaseCfg::secondary_delay`] without any edit, the secondary
/// provider validates the same region. Edits cancel a waiting or running
/// secondary pass outright.
pub struct ThreePhaseRangeValidator<C: VersionedContent, P> {
	cfg: ThreePhaseCfg,
	primary: SinglePhaseRangeValidator<C, P>,
	primary_events: mpsc::UnboundedReceiver<Validated>,
	fallback: RangeValidator<C>,
	fallback_handler: Option<FallbackHandler>,
	secondary: RangeValidator<C>,
	secondary_provider: Option<Box<dyn SecondaryProvider<C::Version>>>,
	secondary_state: Secondary<C::Version>,
}

impl<C, P> ThreePhaseRangeValidator<C, P>
where
	C: VersionedContent + Clone,
	P: ValidationProvider<C::Version>,
{
	pub fn new(cfg: ThreePhaseCfg, content: C, provider: P) -> Self {
		let mut primary = SinglePhaseRangeValidator::new(content.clone(), provider);
		let primary_events = primary.subscribe();
		Self {
			cfg,
			primary,
			primary_events,
			fallback: RangeValidator::new(content.clone()),
			fallback_handler: None,
			secondary: RangeValidator::new(content),
			secondary_provider: None,
			secondary_state: Secondary::Idle,
		}
	}

	pub fn with_fallback(mut self, handler: impl FnMut(Span) + Send + 'static) -> Self {
		self.fallback_handler = Some(Box::new(handler));
		self
	}

	pub fn with_secondary(mut self, provider: impl SecondaryProvider<C::Version> + 'static) -> Self {
		self.secondary_provider = Some(Box::new(provider));
		self
	}

	pub fn primary(&self) -> &SinglePhaseRangeValidator<C, P> {
		&self.primary
	}

	pub fn fallback_validator(&self) -> &RangeValidator<C> {
		&self.fallback
	}

	pub fn secondary_validator(&self) -> &RangeValidator<C> {
		&self.secondary
	}

	/// Returns true while the secondary pass is waiting out its delay or running.
	pub fn has_scheduled_secondary(&self) -> bool {
		!matches!(self.secondary_state, Secondary::Idle)
	}

	pub fn is_valid(&self, target: &Target) -> bool {
		self.primary.is_valid(target)
	}

	fn current_version(&self) -> C::Version {
		self.primary.validator().content().current_version()
	}

	/// Drives the primary phase for `target`.
	pub fn validate(&mut self, target: Target, priority: Option<OffsetSet>) -> Action<C::Version> {
		let action = self.primary.validate(target.clone(), priority);
		self.drain_primary_events();

		if !action.is_needed() && !self.primary.has_pending_validations() {
			self.schedule_secondary(target);
		}
		action
	}

	pub fn invalidate(&mut self, target: &Target) {
		self.primary.invalidate(target);
		self.fallback.invalidate(target);
		self.secondary.invalidate(target);
	}

	pub fn content_changed(&mut self, span: Span, delta: isize) {
		self.cancel_secondary();
		self.primary.content_changed(span, delta);
		self.fallback.content_changed(span, delta);
		self.secondary.content_changed(span, delta);
	}

	fn drain_primary_events(&mut self) {
		while let Ok(event) = self.primary_events.try_recv() {
			let span = Target::Span(event.span);
			self.fallback.invalidate(&span);
			self.secondary.invalidate(&span);
			self.run_fallback(&span);
			self.schedule_secondary(span);
		}
	}

	fn run_fallback(&mut self, target: &Target) {
		let Some(handler) = self.fallback_handler.as_mut() else {
			return;
		};

		while let Action::Needed(request) = self.fallback.begin_validation(target, None) {
			tracing::trace!(span = ?request.value, "three_phase.fallback");
			handler(request.value);
			self.fallback
				.complete_validation(&request, ValidationOutcome::Success(request.value));
		}
	}

	fn schedule_secondary(&mut self, target: Target) {
		if self.secondary_provider.is_none() {
			return;
		}

		let target = match self.cancel_secondary() {
			Some(previous) => previous.union(&target),
			None => target,
		};
		let deadline = Instant::now() + self.cfg.secondary_delay;
		tracing::trace!(?target, "three_phase.secondary.scheduled");
		self.secondary_state = Secondary::Waiting {
			deadline,
			version: self.current_version(),
			target,
		};
	}

	/// Drops any waiting or running secondary pass, returning its target.
	fn cancel_secondary(&mut self) -> Option<Target> {
		match std::mem::replace(&mut self.secondary_state, Secondary::Idle) {
			Secondary::Idle => None,
			Secondary::Waiting { target, .. } => Some(target),
			Secondary::Running { request, target, .. } => {
				tracing::trace!(span = ?request.value, "three_phase.secondary.cancelled");
				self.secondary.complete_validation(&request, ValidationOutcome::Stale);
				Some(target)
			}
		}
	}

	/// Begins the next secondary request for `target`, if the content still
	/// matches `version`.
	fn start_secondary(&mut self, target: Target, version: &C::Version) {
		if *version != self.current_version() {
			tracing::trace!("three_phase.secondary.version_changed");
			return;
		}
		let Some(provider) = self.secondary_provider.as_mut() else {
			return;
		};
		let Action::Needed(request) = self.secondary.begin_validation(&target, None) else {
			return;
		};

		tracing::trace!(span = ?request.value, "three_phase.secondary.start");
		let fut = provider.validate(request.clone());
		self.secondary_state = Secondary::Running { request, target, fut };
	}

	fn finish_secondary(&mut self, outcome: ValidationOutcome) {
		let Secondary::Running { request, target, .. } = std::mem::replace(&mut self.secondary_state, Secondary::Idle)
		else {
			return;
		};

		self.secondary.complete_validation(&request, outcome);
		if matches!(outcome, ValidationOutcome::Success(_)) && !self.secondary.is_valid(&target) {
			self.start_secondary(target, &request.version);
		}
	}

	fn pump_secondary(&mut self) -> bool {
		let mut progressed = false;
		loop {
			match &mut self.secondary_state {
				Secondary::Idle => return progressed,
				Secondary::Waiting { deadline, .. } => {
					if Instant::now() < *deadline {
						return progressed;
					}
					if let Secondary::Waiting { version, target, .. } =
						std::mem::replace(&mut self.secondary_state, Secondary::Idle)
					{
						self.start_secondary(target, &version);
					}
				}
				Secondary::Running { fut, .. } => {
					let Some(outcome) = poll_once(fut.as_mut()) else {
						return progressed;
					};
					self.finish_secondary(outcome);
					progressed = true;
				}
			}
		}
	}

	/// Collects finished work of every phase without blocking.
	///
	/// Returns true if any primary or secondary validation completed.
	pub fn pump(&mut self) -> bool {
		let primary = self.primary.pump();
		self.drain_primary_events();
		let secondary = self.pump_secondary();
		primary || secondary
	}

	/// Waits for the primary phase to drain, then for the secondary pass
	/// including its delay.
	pub async fn validation_completed(&mut self) {
		self.primary.validation_completed().await;
		self.drain_primary_events();

		loop {
			match &mut self.secondary_state {
				Secondary::Idle => return,
				Secondary::Waiting { deadline, .. } => {
					tokio::time::sleep_until(*deadline).await;
					if let Secondary::Waiting { version, target, .. } =
						std::mem::replace(&mut self.secondary_state, Secondary::Idle)
					{
						self.start_secondary(target, &version);
					}
				}
				Secondary::Running { fut, .. } => {
					let outcome = fut.as_mut().await;
					self.finish_secondary(outcome);
				}
			}
		}
	}
}
