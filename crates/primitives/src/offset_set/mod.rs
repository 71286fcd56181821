use std::fmt;

use smallvec::SmallVec;

use crate::span::{Offset, Span};


/// A sorted union of disjoint spans.
///
/// Stored spans are non-empty, ascending, and never touch: inserting `[0, 3)`
/// and `[3, 5)` yields the single span `[0, 5)`. Most sets seen in practice
/// (visible windows, validity sets of a single document) hold a handful of
/// spans, so storage is inline up to four entries.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OffsetSet {
	spans: SmallVec<[Span; 4]>,
}

impl OffsetSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a set holding every offset of `span`.
	pub fn from_span(span: Span) -> Self {
		let mut set = Self::new();
		set.insert_span(span);
		set
	}

	/// Creates a set holding `[0, length)`.
	pub fn full(length: usize) -> Self {
		Self::from_span(Span::new(0, length))
	}

	pub fn is_empty(&self) -> bool {
		self.spans.is_empty()
	}

	/// Returns the maximal contiguous runs in ascending order.
	pub fn spans(&self) -> &[Span] {
		&self.spans
	}

	/// Iterates the maximal contiguous runs in ascending order.
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = Span> + '_ {
		self.spans.iter().copied()
	}

	/// Iterates every individual offset in ascending order.
	pub fn offsets(&self) -> impl Iterator<Item = Offset> + '_ {
		self.spans.iter().flat_map(|span| span.range())
	}

	/// Number of offsets in the set.
	pub fn count(&self) -> usize {
		self.spans.iter().map(Span::len).sum()
	}

	/// Smallest offset in the set.
	pub fn first(&self) -> Option<Offset> {
		self.spans.first().map(|span| span.start)
	}

	/// Largest offset in the set.
	pub fn last(&self) -> Option<Offset> {
		self.spans.last().map(|span| span.end - 1)
	}

	/// Exclusive upper bound of the set.
	pub fn end(&self) -> Option<Offset> {
		self.spans.last().map(|span| span.end)
	}

	/// Smallest span containing every offset of the set.
	pub fn spanning_span(&self) -> Option<Span> {
		match (self.spans.first(), self.spans.last()) {
			(Some(first), Some(last)) => Some(Span::new(first.start, last.end)),
			_ => None,
		}
	}

	pub fn contains(&self, offset: Offset) -> bool {
		let idx = self.spans.partition_point(|span| span.end <= offset);
		self.spans.get(idx).is_some_and(|span| span.contains(offset))
	}

	/// Returns true if every offset of `span` is in the set.
	///
	/// Empty spans are always contained.
	pub fn contains_span(&self, span: Span) -> bool {
		if span.is_empty() {
			return true;
		}
		let idx = self.spans.partition_point(|s| s.end <= span.start);
		self.spans.get(idx).is_some_and(|s| s.contains_span(span))
	}

	/// Returns true if `other` is a subset of this set.
	pub fn contains_set(&self, other: &OffsetSet) -> bool {
		other.iter().all(|span| self.contains_span(span))
	}

	/// Returns true if the sets share at least one offset.
	pub fn intersects(&self, other: &OffsetSet) -> bool {
		!self.intersection(other).is_empty()
	}

	/// Adds every offset of `span`, coalescing touching runs.
	pub fn insert_span(&mut self, span: Span) {
		if span.is_empty() {
			return;
		}

		let lo = self.spans.partition_point(|s| s.end < span.start);
		let hi = self.spans.partition_point(|s| s.start <= span.end);

		let mut merged = span;
		if lo < hi {
			merged.start = merged.start.min(self.spans[lo].start);
			merged.end = merged.end.max(self.spans[hi - 1].end);
		}

		self.spans.drain(lo..hi);
		self.spans.insert(lo, merged);
	}

	/// Removes every offset of `span`.
	pub fn remove_span(&mut self, span: Span) {
		if span.is_empty() {
			return;
		}

		let lo = self.spans.partition_point(|s| s.end <= span.start);
		let hi = self.spans.partition_point(|s| s.start < span.end);
		if lo >= hi {
			return;
		}

		let first = self.spans[lo];
		let last = self.spans[hi - 1];
		let mut remainder: SmallVec<[Span; 2]> = SmallVec::new();
		if first.start < span.start {
			remainder.push(Span::new(first.start, span.start));
		}
		if last.end > span.end {
			remainder.push(Span::new(span.end, last.end));
		}

		self.spans.drain(lo..hi);
		self.spans.insert_many(lo, remainder);
	}

	/// Removes every offset of `other` in place.
	pub fn subtract_in_place(&mut self, other: &OffsetSet) {
		for span in other.iter() {
			self.remove_span(span);
		}
	}

	/// Adds every offset of `other` in place.
	pub fn union_in_place(&mut self, other: &OffsetSet) {
		for span in other.iter() {
			self.insert_span(span);
		}
	}

	pub fn union(&self, other: &OffsetSet) -> OffsetSet {
		let mut set = self.clone();
		set.union_in_place(other);
		set
	}

	pub fn subtract(&self, other: &OffsetSet) -> OffsetSet {
		let mut set = self.clone();
		set.subtract_in_place(other);
		set
	}

	pub fn intersection(&self, other: &OffsetSet) -> OffsetSet {
		let mut out = OffsetSet::new();
		let (mut i, mut j) = (0, 0);
		while i < self.spans.len() && j < other.spans.len() {
			let a = self.spans[i];
			let b = other.spans[j];
			if let Some(overlap) = a.intersection(b) {
				out.spans.push(overlap);
			}
			if a.end <= b.end {
				i += 1;
			} else {
				j += 1;
			}
		}
		out
	}

	/// Restricts the set to `[0, length)`.
	pub fn clamped(&self, length: usize) -> OffsetSet {
		self.intersection(&OffsetSet::full(length))
	}
}

impl From<Span> for OffsetSet {
	fn from(span: Span) -> Self {
		Self::from_span(span)
	}
}

impl FromIterator<Span> for OffsetSet {
	fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
		let mut set = OffsetSet::new();
		for span in iter {
			set.insert_span(span);
		}
		set
	}
}

impl<'a> IntoIterator for &'a OffsetSet {
	type Item = Span;
	type IntoIter = std::iter::Copied<std::slice::Iter<'a, Span>>;

	fn into_iter(self) -> Self::IntoIter {
		self.spans.iter().copied()
	}
}

impl fmt::Debug for OffsetSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.spans.iter()).finish()
	}
}
