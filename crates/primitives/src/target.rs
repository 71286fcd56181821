use std::fmt;

use crate::mutation::Mutation;
use crate::offset_set::OffsetSet;
use crate::span::Span;

/// A region of content described abstractly, before the length is known.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum Target {
	#[default]
	Everything,
	Span(Span),
	Set(OffsetSet),
}

impl Target {
	/// A target covering nothing.
	pub fn empty() -> Self {
		Target::Set(OffsetSet::new())
	}

	pub fn union(&self, other: &Target) -> Target {
		match (self, other) {
			(Target::Everything, _) | (_, Target::Everything) => Target::Everything,
			(Target::Span(a), Target::Span(b)) => Target::Set([*a, *b].into_iter().collect()),
			(Target::Set(set), Target::Span(span)) | (Target::Span(span), Target::Set(set)) => {
				let mut set = set.clone();
				set.insert_span(*span);
				Target::Set(set)
			}
			(Target::Set(a), Target::Set(b)) => Target::Set(a.union(b)),
		}
	}

	/// Resolves the target against content of `length`, clipping to `[0, length)`.
	pub fn materialize(&self, length: usize) -> OffsetSet {
		match self {
			Target::Everything => OffsetSet::full(length),
			Target::Span(span) => OffsetSet::from_span(span.clamped(length)),
			Target::Set(set) => set.clamped(length),
		}
	}

	/// Moves the target into post-edit coordinates.
	pub fn apply<'a>(&self, mutations: impl IntoIterator<Item = &'a Mutation>) -> Target {
		match self {
			Target::Everything => Target::Everything,
			Target::Span(span) => {
				let mut span = *span;
				for mutation in mutations {
					match mutation.transform_span(span) {
						Some(next) => span = next,
						None => return Target::empty(),
					}
				}
				Target::Span(span)
			}
			Target::Set(set) => Target::Set(set.apply(mutations)),
		}
	}
}

impl From<Span> for Target {
	fn from(span: Span) -> Self {
		Target::Span(span)
	}
}

impl From<OffsetSet> for Target {
	fn from(set: OffsetSet) -> Self {
		Target::Set(set)
	}
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Target::Everything => f.write_str("everything"),
			Target::Span(span) => write!(f, "{span:?}"),
			Target::Set(set) => write!(f, "{set:?}"),
		}
	}
}
