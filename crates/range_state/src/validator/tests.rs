use std::sync::Arc;

use pretty_assertions::assert_eq;
use strata_primitives::TextContent;

use super::*;

fn validator(text: &str) -> (Arc<TextContent>, RangeValidator<Arc<TextContent>>) {
	let content = Arc::new(TextContent::new(text));
	let validator = RangeValidator::new(Arc::clone(&content));
	(content, validator)
}

fn needed(action: Action<u64>) -> VersionedSpan<u64> {
	match action {
		Action::Needed(span) => span,
		Action::None => panic!("expected a validation request"),
	}
}

fn set(spans: &[(usize, usize)]) -> OffsetSet {
	spans.iter().map(|&(start, end)| Span::new(start, end)).collect()
}

#[test]
fn begin_is_idempotent_until_completion() {
	let (_, mut validator) = validator("0123456789");

	let request = needed(validator.begin_validation(&Target::Everything, None));
	assert_eq!(request.value, Span::new(0, 10));
	assert_eq!(
		validator.begin_validation(&Target::Everything, None),
		Action::None,
		"in-flight work is never requested twice"
	);
	assert!(validator.has_outstanding_validations());

	validator.complete_validation(&request, ValidationOutcome::Success(request.value));
	assert!(validator.is_valid(&Target::Everything));
	assert!(!validator.has_outstanding_validations());
	assert_eq!(validator.begin_validation(&Target::Everything, None), Action::None);
}

#[test]
fn stale_outcome_releases_the_span() {
	let (_, mut validator) = validator("abcdef");

	let request = needed(validator.begin_validation(&Target::Span(Span::new(1, 4)), None));
	validator.complete_validation(&request, ValidationOutcome::Stale);

	assert!(validator.pending_set().is_empty());
	assert!(!validator.is_valid(&Target::Span(Span::new(1, 4))));
	let retry = needed(validator.begin_validation(&Target::Span(Span::new(1, 4)), None));
	assert_eq!(retry.value, Span::new(1, 4));
}

#[test]
fn results_for_old_versions_never_mark_anything_valid() {
	let (content, mut validator) = validator("abcdef");

	let request = needed(validator.begin_validation(&Target::Everything, None));
	let delta = content.replace(Span::new(2, 3), "xy");
	validator.content_changed(Span::new(2, 3), delta);
	validator.complete_validation(&request, ValidationOutcome::Success(Span::new(0, 6)));

	assert!(validator.valid_set().is_empty());
	assert!(validator.pending_set().is_empty());
	assert_eq!(needed(validator.begin_validation(&Target::Everything, None)).value, Span::new(0, 7));
}

#[test]
fn priority_prefers_the_run_past_the_priority_offset() {
	let (_, mut validator) = validator("aaabbbccc");
	let request = needed(validator.begin_validation(&Target::Everything, None));
	validator.complete_validation(&request, ValidationOutcome::Success(request.value));
	validator.invalidate(&Target::Set(set(&[(0, 3), (6, 9)])));

	let priority = OffsetSet::from_span(Span::new(7, 8));
	let first = needed(validator.begin_validation(&Target::Everything, Some(&priority)));
	assert_eq!(first.value, Span::new(6, 9));

	let second = needed(validator.begin_validation(&Target::Everything, Some(&priority)));
	assert_eq!(second.value, Span::new(0, 3), "with nothing past the priority the first run is used");
}

#[test]
fn success_un_pends_the_returned_span_too() {
	let (_, mut validator) = validator("0123456789");

	let first = needed(validator.begin_validation(&Target::Span(Span::new(0, 4)), None));
	let second = needed(validator.begin_validation(&Target::Span(Span::new(4, 10)), None));
	validator.complete_validation(&first, ValidationOutcome::Success(Span::new(0, 6)));

	assert_eq!(validator.valid_set(), &set(&[(0, 6)]));
	assert_eq!(validator.pending_set(), &set(&[(6, 10)]));

	validator.complete_validation(&second, ValidationOutcome::Success(second.value));
	assert!(validator.is_valid(&Target::Everything));
}

#[test]
fn regions_invalidated_in_flight_stay_invalid() {
	let (_, mut validator) = validator("0123456789");

	let request = needed(validator.begin_validation(&Target::Everything, None));
	validator.invalidate(&Target::Span(Span::new(2, 4)));
	validator.complete_validation(&request, ValidationOutcome::Success(request.value));

	assert_eq!(validator.valid_set(), &set(&[(0, 2), (4, 10)]));
	assert_eq!(needed(validator.begin_validation(&Target::Everything, None)).value, Span::new(2, 4));
}

#[test]
fn edits_move_the_valid_set() {
	let (content, mut validator) = validator("0123456789");
	let request = needed(validator.begin_validation(&Target::Everything, None));
	validator.complete_validation(&request, ValidationOutcome::Success(request.value));

	let delta = content.replace(Span::empty(3), "ab");
	validator.content_changed(Span::empty(3), delta);

	assert_eq!(validator.valid_set(), &set(&[(0, 3), (5, 12)]));
	assert!(validator.is_valid(&Target::Span(Span::new(6, 12))));
	assert_eq!(needed(validator.begin_validation(&Target::Everything, None)).value, Span::new(3, 5));
}

#[test]
fn deleting_the_tail_clips_the_valid_set() {
	let (content, mut validator) = validator("abcde");
	let request = needed(validator.begin_validation(&Target::Everything, None));
	validator.complete_validation(&request, ValidationOutcome::Success(request.value));

	let delta = content.replace(Span::new(3, 5), "");
	validator.content_changed(Span::new(3, 5), delta);

	assert_eq!(validator.valid_set(), &set(&[(0, 3)]));
	assert!(validator.is_valid(&Target::Everything));
}

#[test]
fn empty_targets_are_trivially_valid() {
	let (_, mut validator) = validator("abc");
	assert!(validator.is_valid(&Target::empty()));
	assert_eq!(validator.begin_validation(&Target::empty(), None), Action::None);
}

#[test]
#[should_panic(expected = "no validation outstanding")]
fn completing_without_beginning_panics() {
	let (content, mut validator) = validator("abc");
	let request = VersionedSpan::new(Span::new(0, 3), content.current_version());
	validator.complete_validation(&request, ValidationOutcome::Stale);
}
