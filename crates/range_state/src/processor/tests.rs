use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use strata_primitives::{TextContent, VersionedContent, poll_once};

use super::*;

#[derive(Default)]
struct Recorder {
	mutations: Vec<Mutation>,
	defer: bool,
}

impl Recorder {
	fn deferring() -> Self {
		Self {
			defer: true,
			..Self::default()
		}
	}
}

impl ChangeHandler for Recorder {
	fn handle_change(&mut self, mutation: &Mutation) -> ChangeStatus {
		self.mutations.push(*mutation);
		if self.defer { ChangeStatus::Deferred } else { ChangeStatus::Applied }
	}
}

fn fixed_length(length: usize) -> LengthProvider {
	Arc::new(move || length)
}

fn text_length(content: &Arc<TextContent>) -> LengthProvider {
	let content = Arc::clone(content);
	Arc::new(move || content.current_length())
}

#[test]
fn required_fill_is_synchronous() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(100));
	let mut handler = Recorder::default();

	assert!(processor.process_location(10, FillMode::Required, &mut handler));
	assert_eq!(handler.mutations, vec![Mutation::new(Span::empty(0), 10)]);
	assert!(processor.processed(10));
	assert!(!processor.processed(11));
}

#[test]
fn optional_fill_waits_for_pump() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(100));
	let mut handler = Recorder::default();

	assert!(!processor.process_location(10, FillMode::Optional, &mut handler));
	assert!(handler.mutations.is_empty(), "optional fills never run inline");
	assert!(processor.has_scheduled_fill());

	assert!(processor.pump(&mut handler));
	assert_eq!(handler.mutations, vec![Mutation::new(Span::empty(0), 10)]);
	assert!(processor.processed(10));
}

#[test]
fn optional_fill_is_chunked_by_max_delta() {
	let cfg = RangeProcessorCfg {
		min_delta: 1,
		max_delta: 4,
	};
	let mut processor = RangeProcessor::new(cfg, fixed_length(100));
	let mut handler = Recorder::default();

	processor.process_location(10, FillMode::Optional, &mut handler);
	while processor.pump(&mut handler) {}

	let deltas: Vec<isize> = handler.mutations.iter().map(|m| m.delta).collect();
	assert_eq!(deltas, vec![4, 4, 2]);
	assert_eq!(processor.processed_upper_bound(), 10);
}

#[test]
fn required_fill_honours_min_delta_but_not_max_delta() {
	let cfg = RangeProcessorCfg {
		min_delta: 128,
		max_delta: 4,
	};
	let mut processor = RangeProcessor::new(cfg, fixed_length(1000));
	let mut handler = Recorder::default();

	processor.process_location(10, FillMode::Required, &mut handler);
	processor.process_location(600, FillMode::Required, &mut handler);
	assert_eq!(
		handler.mutations,
		vec![Mutation::new(Span::empty(0), 128), Mutation::new(Span::empty(128), 472)]
	);
}

#[test]
fn fill_is_capped_by_content_length() {
	let cfg = RangeProcessorCfg {
		min_delta: 128,
		..RangeProcessorCfg::default()
	};
	let mut processor = RangeProcessor::new(cfg, fixed_length(3));
	let mut handler = Recorder::default();

	assert!(processor.process_location(1, FillMode::Required, &mut handler));
	assert_eq!(handler.mutations, vec![Mutation::new(Span::empty(0), 3)]);
}

#[test]
#[should_panic(expected = "beyond content length")]
fn processing_past_content_length_panics() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(3));
	processor.process_location(10, FillMode::Required, &mut Recorder::default());
}

#[test]
fn empty_content_needs_no_processing() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(0));
	let mut handler = Recorder::default();

	assert!(processor.process_location(0, FillMode::Required, &mut handler));
	assert!(handler.mutations.is_empty());
}

#[test]
fn none_mode_only_reports() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(10));
	let mut handler = Recorder::default();

	assert!(!processor.process_location(5, FillMode::None, &mut handler));
	assert!(!processor.has_scheduled_fill());
	assert!(handler.mutations.is_empty());
}

#[test]
fn insert_at_end_after_processing_everything() {
	let content = Arc::new(TextContent::new("abcde"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	assert!(processor.process_location(5, FillMode::Required, &mut handler));
	assert_eq!(handler.mutations, vec![Mutation::new(Span::empty(0), 5)]);

	let delta = content.replace(Span::empty(5), "f");
	processor.did_change_content(Span::empty(5), delta, &mut handler);
	assert!(processor.process_location(6, FillMode::Required, &mut handler));

	assert_eq!(
		handler.mutations,
		vec![Mutation::new(Span::empty(0), 5), Mutation::new(Span::empty(5), 1)]
	);
	assert_eq!(handler.mutations[1].limit, None, "pure insertions carry no limit");
}

#[test]
fn insertions_inside_the_prefix_keep_the_rest_readable() {
	let content = Arc::new(TextContent::new("abcde"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	processor.process_location(5, FillMode::Required, &mut handler);
	let delta = content.replace(Span::empty(1), "xy");
	processor.did_change_content(Span::empty(1), delta, &mut handler);

	assert_eq!(handler.mutations[1], Mutation::with_limit(Span::empty(1), 2, 5));
	assert_eq!(handler.mutations[1].post_apply_limit(), 7);
	assert_eq!(processor.processed_upper_bound(), 7);
}

#[test]
fn delete_at_end_after_processing_everything() {
	let content = Arc::new(TextContent::new("abcde"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	processor.process_location(5, FillMode::Required, &mut handler);
	let delta = content.replace(Span::new(4, 5), "");
	processor.did_change_content(Span::new(4, 5), delta, &mut handler);

	assert_eq!(handler.mutations[1], Mutation::with_limit(Span::new(4, 5), -1, 5));
	assert_eq!(processor.processed_upper_bound(), 4);
	assert_eq!(handler.mutations[1].post_apply_limit(), 4);
}

#[test]
fn delete_everything_after_processing() {
	let content = Arc::new(TextContent::new("abcde"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	processor.process_location(5, FillMode::Required, &mut handler);
	content.set_text("");
	processor.did_change_content(Span::new(0, 5), -5, &mut handler);

	assert_eq!(handler.mutations[1], Mutation::with_limit(Span::new(0, 5), -5, 5));
	assert_eq!(processor.processed_upper_bound(), 0);
}

#[test]
fn straddling_edit_is_trimmed_to_the_processed_prefix() {
	let content = Arc::new(TextContent::new("0123456789"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	processor.process_location(5, FillMode::Required, &mut handler);
	let delta = content.replace(Span::new(0, 10), "abcdefghij");
	processor.did_change_content(Span::new(0, 10), delta, &mut handler);

	assert_eq!(handler.mutations[1], Mutation::with_limit(Span::new(0, 5), 0, 5));
	assert_eq!(processor.processed_upper_bound(), 5);
}

#[test]
fn straddling_delete_only_removes_processed_units() {
	let content = Arc::new(TextContent::new("0123456789"));
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), text_length(&content));
	let mut handler = Recorder::default();

	processor.process_location(5, FillMode::Required, &mut handler);
	let delta = content.replace(Span::new(3, 10), "");
	processor.did_change_content(Span::new(3, 10), delta, &mut handler);

	assert_eq!(handler.mutations[1], Mutation::with_limit(Span::new(3, 5), -2, 5));
	assert_eq!(processor.processed_upper_bound(), 3);
}

#[test]
fn edits_in_unprocessed_content_are_ignored() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(10));
	let mut handler = Recorder::default();

	processor.did_change_content(Span::empty(0), 10, &mut handler);
	assert!(handler.mutations.is_empty(), "nothing has been read yet");

	processor.process_location(3, FillMode::Required, &mut handler);
	processor.did_change_content(Span::new(6, 8), -2, &mut handler);
	assert_eq!(handler.mutations.len(), 1);
}

#[test]
fn deferred_changes_complete_in_order() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(20));
	let mut handler = Recorder::deferring();

	assert!(!processor.process_location(5, FillMode::Required, &mut handler));
	assert!(processor.has_pending_changes());
	assert!(!processor.process_location(5, FillMode::Required, &mut handler));
	assert_eq!(handler.mutations.len(), 1, "a queued fill already covers the request");

	processor.did_change_content(Span::new(1, 2), -1, &mut handler);
	assert_eq!(processor.projected_upper_bound(), 4);
	assert_eq!(processor.pending_mutations().count(), 2);

	processor.complete_change(&handler.mutations[0]);
	assert!(processor.processed(5));
	processor.complete_change(&handler.mutations[1]);
	assert_eq!(processor.processed_upper_bound(), 4);
	assert!(!processor.has_pending_changes());
}

#[test]
#[should_panic(expected = "oldest pending change")]
fn out_of_order_completion_is_fatal() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(20));
	let mut handler = Recorder::deferring();

	processor.process_location(5, FillMode::Required, &mut handler);
	processor.did_change_content(Span::new(1, 2), -1, &mut handler);
	processor.complete_change(&handler.mutations[1]);
}

#[tokio::test]
async fn waiters_resolve_once_queued_changes_complete() {
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), fixed_length(20));
	let mut handler = Recorder::deferring();

	processor.process_location(8, FillMode::Required, &mut handler);
	let mut waiter = Box::pin(processor.processing_completed());
	assert!(poll_once(&mut waiter).is_none(), "waiter must park while a change is pending");

	processor.complete_change(&handler.mutations[0]);
	waiter.await;
	assert!(processor.processed(8));

	let idle = Box::pin(processor.processing_completed());
	assert!(poll_once(idle).is_some(), "an idle processor resolves immediately");
}

#[test]
fn fill_scheduled_during_pending_changes_runs_after_completion() {
	let length = Arc::new(AtomicUsize::new(50));
	let provider: LengthProvider = {
		let length = Arc::clone(&length);
		Arc::new(move || length.load(Ordering::Relaxed))
	};
	let mut processor = RangeProcessor::new(RangeProcessorCfg::default(), provider);
	let mut handler = Recorder::deferring();

	processor.process_location(10, FillMode::Required, &mut handler);
	processor.process_location(30, FillMode::Optional, &mut handler);
	assert!(!processor.pump(&mut handler), "fills wait for pending changes");

	processor.complete_change(&handler.mutations[0]);
	length.store(20, Ordering::Relaxed);
	assert!(processor.pump(&mut handler));
	assert_eq!(handler.mutations[1], Mutation::new(Span::empty(10), 10), "watermark is clamped to the current length");
}

proptest! {
	/// Required fills always leave the requested offset processed, and the
	/// bound only moves backwards through deletions.
	#[test]
	fn prop_bound_is_monotonic_without_deletions(
		requests in prop::collection::vec(0usize..200, 1..20),
		min_delta in 1usize..64,
	) {
		let cfg = RangeProcessorCfg { min_delta, ..RangeProcessorCfg::default() };
		let mut processor = RangeProcessor::new(cfg, fixed_length(200));
		let mut handler = Recorder::default();
		let mut last = 0;

		for offset in requests {
			prop_assert!(processor.process_location(offset, FillMode::Required, &mut handler));
			prop_assert!(processor.processed_upper_bound() >= last);
			last = processor.processed_upper_bound();
		}
	}
}
