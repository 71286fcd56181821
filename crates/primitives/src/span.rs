use std::fmt;
use std::ops::Range;

/// An offset into linear content, measured in content units.
pub type Offset = usize;

/// A half-open interval `[start, end)` of content offsets.
///
/// Spans are plain values. Every operation that changes a span returns a new
/// one, so a span captured before an edit keeps describing pre-edit content
/// until it is explicitly transformed with a [`crate::Mutation`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
	/// First offset covered by the span.
	pub start: Offset,
	/// First offset past the span.
	pub end: Offset,
}

impl Span {
	/// Creates a span covering `[start, end)`.
	///
	/// # Panics
	///
	/// Panics if `start > end`.
	#[inline]
	pub fn new(start: Offset, end: Offset) -> Self {
		assert!(start <= end, "span start {start} is past its end {end}");
		Self { start, end }
	}

	/// Creates an empty span positioned at `offset`.
	#[inline]
	pub fn empty(offset: Offset) -> Self {
		Self::new(offset, offset)
	}

	/// Creates the span `[start, start + len)`.
	#[inline]
	pub fn with_len(start: Offset, len: usize) -> Self {
		Self::new(start, start + len)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.end - self.start
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true if `offset` lies inside the span.
	#[inline]
	pub fn contains(&self, offset: Offset) -> bool {
		self.start <= offset && offset < self.end
	}

	/// Returns true if every offset of `other` lies inside this span.
	///
	/// Empty spans are contained when their position is within `[start, end]`.
	pub fn contains_span(&self, other: Span) -> bool {
		self.start <= other.start && other.end <= self.end
	}

	/// Returns true if the two spans share at least one offset.
	pub fn intersects(&self, other: Span) -> bool {
		self.intersection(other).is_some()
	}

	/// Returns the overlap of two spans, if any offset is shared.
	pub fn intersection(&self, other: Span) -> Option<Span> {
		let start = self.start.max(other.start);
		let end = self.end.min(other.end);
		(start < end).then(|| Span::new(start, end))
	}

	/// Returns the smallest span covering both spans.
	pub fn cover(&self, other: Span) -> Span {
		Span::new(self.start.min(other.start), self.end.max(other.end))
	}

	/// Clips the span to `[0, limit)`, keeping at least an empty span at `limit`.
	pub fn clamped(&self, limit: Offset) -> Span {
		Span::new(self.start.min(limit), self.end.min(limit))
	}

	/// Converts to a standard library range.
	#[inline]
	pub fn range(&self) -> Range<Offset> {
		self.start..self.end
	}
}

impl From<Range<Offset>> for Span {
	fn from(range: Range<Offset>) -> Self {
		Span::new(range.start, range.end)
	}
}

impl From<Span> for Range<Offset> {
	fn from(span: Span) -> Self {
		span.range()
	}
}

impl fmt::Debug for Span {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {})", self.start, self.end)
	}
}
