use crate::offset_set::OffsetSet;
use crate::span::{Offset, Span};


/// An edit descriptor in pre-edit coordinates.
///
/// `span` was replaced by content that is `delta` units longer (or shorter).
/// `limit`, when known, is the pre-edit length of the region the mutation is
/// allowed to describe. Transforms never produce offsets at or past
/// `limit + delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mutation {
	pub span: Span,
	pub delta: isize,
	pub limit: Option<usize>,
}

impl Mutation {
	/// Creates a mutation without a length bound.
	///
	/// # Panics
	///
	/// Panics if `delta` removes more than `span` covers.
	pub fn new(span: Span, delta: isize) -> Self {
		Self::build(span, delta, None)
	}

	/// Creates a mutation bounded by the pre-edit length `limit`.
	pub fn with_limit(span: Span, delta: isize, limit: usize) -> Self {
		Self::build(span, delta, Some(limit))
	}

	fn build(span: Span, delta: isize, limit: Option<usize>) -> Self {
		assert!(
			delta >= 0 || delta.unsigned_abs() <= span.len(),
			"mutation {span:?} cannot remove {} units",
			delta.unsigned_abs()
		);
		Self { span, delta, limit }
	}

	/// Maximum readable offset once the mutation has been applied.
	pub fn post_apply_limit(&self) -> usize {
		offset_by(self.limit.unwrap_or(self.span.end), self.delta)
	}

	/// Length of the replacement content.
	pub fn inserted_len(&self) -> usize {
		offset_by(self.span.len(), self.delta)
	}

	fn bound(&self) -> Option<usize> {
		self.limit.map(|limit| offset_by(limit, self.delta))
	}

	/// Maps a single pre-edit offset to post-edit coordinates.
	///
	/// Offsets inside the replaced span collapse onto its start. Returns `None`
	/// when the result falls outside the post-edit bound.
	pub fn transform_offset(&self, offset: Offset) -> Option<Offset> {
		let mapped = if offset < self.span.start {
			offset
		} else if offset < self.span.end {
			self.span.start
		} else {
			offset_by(offset, self.delta)
		};

		match self.bound() {
			Some(bound) if mapped >= bound => None,
			_ => Some(mapped),
		}
	}

	/// Maps every offset of `set` to post-edit coordinates.
	pub fn transform(&self, set: &OffsetSet) -> OffsetSet {
		let mut out = OffsetSet::new();
		let edit = self.span;

		for span in set.iter() {
			if span.start < edit.start {
				out.insert_span(Span::new(span.start, span.end.min(edit.start)));
			}
			if span.intersects(edit) {
				out.insert_span(Span::with_len(edit.start, 1));
			}
			if span.end > edit.end {
				let start = span.start.max(edit.end);
				out.insert_span(Span::new(offset_by(start, self.delta), offset_by(span.end, self.delta)));
			}
		}

		match self.bound() {
			Some(bound) => out.clamped(bound),
			None => out,
		}
	}

	/// Maps a span to post-edit coordinates, returning the smallest span
	/// covering the surviving offsets.
	pub fn transform_span(&self, span: Span) -> Option<Span> {
		self.transform(&OffsetSet::from_span(span)).spanning_span()
	}
}

impl OffsetSet {
	/// Applies mutations in edit order.
	pub fn apply<'a>(&self, mutations: impl IntoIterator<Item = &'a Mutation>) -> OffsetSet {
		mutations.into_iter().fold(self.clone(), |set, mutation| mutation.transform(&set))
	}
}

fn offset_by(offset: Offset, delta: isize) -> Offset {
	match offset.checked_add_signed(delta) {
		Some(value) => value,
		None => panic!("offset {offset} shifted by {delta} is negative"),
	}
}
