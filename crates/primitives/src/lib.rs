//! Value types shared by the range-validity and incremental-parse engines:
//! spans, offset sets, edit mutations, targets and versioned content.

/// Async future aliases and owner-side polling.
pub mod future;
/// Edit descriptors and their transforms.
pub mod mutation;
/// Sorted unions of disjoint spans.
pub mod offset_set;
/// Half-open offset intervals.
pub mod span;
/// Abstract content regions.
pub mod target;
/// Versioned values and content sources.
pub mod versioned;

pub use future::{BoxFutureStatic, poll_once};
pub use mutation::Mutation;
pub use offset_set::OffsetSet;
pub use span::{Offset, Span};
pub use target::Target;
pub use versioned::{LengthProvider, TextContent, UnversionedContent, Versioned, VersionedContent, VersionedSpan};
