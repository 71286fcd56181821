//! Boundary between the layer tree and the parser binding.
//!
//! A [`LanguageLayer`] owns the root parse tree of a document together with
//! every nested-language layer discovered inside it. Implementations wrap a
//! concrete incremental parser; the tree and client in this crate only deal
//! in offsets, [`InputEdit`]s and named captures.

use std::fmt;
use std::sync::Arc;

use strata_primitives::{OffsetSet, Span};

use crate::error::LayerError;

/// Zero-based row and column (in bytes) of an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
	pub row: usize,
	pub column: usize,
}

impl Point {
	pub const fn new(row: usize, column: usize) -> Self {
		Self { row, column }
	}
}

/// Parser-native edit descriptor.
///
/// `old_end_*` refer to the content before the edit, everything else to the
/// content after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
	pub start_byte: usize,
	pub old_end_byte: usize,
	pub new_end_byte: usize,
	pub start_point: Point,
	pub old_end_point: Point,
	pub new_end_point: Point,
}

/// Readable prefix of the document handed to a layer.
///
/// Layers must treat `text` as the entire document; nothing past `limit` has
/// been processed yet.
#[derive(Clone, PartialEq, Eq)]
pub struct LayerContent {
	pub text: Arc<str>,
	pub limit: usize,
}

impl LayerContent {
	pub fn new(text: impl Into<Arc<str>>) -> Self {
		let text = text.into();
		let limit = text.len();
		Self { text, limit }
	}
}

impl fmt::Debug for LayerContent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LayerContent").field("limit", &self.limit).finish_non_exhaustive()
	}
}

/// Produces the document prefix `[0, limit)`.
pub type ContentProvider = Arc<dyn Fn(usize) -> LayerContent + Send + Sync>;

/// Returns the text of a span, for query predicates.
pub type TextProvider = Arc<dyn Fn(Span) -> Option<String> + Send + Sync>;

/// Converts an offset in the current content to a row/column position.
pub type LocationTransformer = Arc<dyn Fn(usize) -> Option<Point> + Send + Sync>;

/// Which query a layer should run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryDefinition {
	Highlights,
	Injections,
	Custom(String),
}

impl QueryDefinition {
	pub fn name(&self) -> &str {
		match self {
			Self::Highlights => "highlights",
			Self::Injections => "injections",
			Self::Custom(name) => name,
		}
	}
}

/// A single query match capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCapture {
	pub name: String,
	pub span: Span,
	/// Nesting depth of the layer that produced the capture; the root is 0.
	pub depth: usize,
}

/// A capture name attached to a span, as returned by highlight queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedRange {
	pub name: String,
	pub span: Span,
}

impl From<QueryCapture> for NamedRange {
	fn from(capture: QueryCapture) -> Self {
		Self {
			name: capture.name,
			span: capture.span,
		}
	}
}

/// The parse tree of one document and all of its nested-language layers.
///
/// Every method returning an [`OffsetSet`] reports the regions whose
/// syntactic meaning changed, in post-operation coordinates.
///
/// Implementations own grammar lookup. Injections found by
/// [`Self::resolve_sublayers`] are resolved by name to a grammar and its
/// queries; a name with no grammar yields no layer (and no error), so the
/// region stays part of its parent. Nesting stops at a depth the
/// implementation picks, reported per capture as [`QueryCapture::depth`].
/// [`Self::language_configuration_changed`] is how the owner announces that
/// a grammar registered under `name` became available or changed, and must
/// re-resolve every layer that could use it.
///
/// All methods run on one thread at a time, either the owner's or the
/// layer tree's worker, never concurrently.
pub trait LanguageLayer: Send + 'static {
	/// Edits the tree and reparses `content`.
	fn apply_edit(&mut self, content: &LayerContent, edit: &InputEdit) -> Result<OffsetSet, LayerError>;

	/// Discovers and parses nested-language layers intersecting `set`.
	fn resolve_sublayers(&mut self, content: &LayerContent, set: &OffsetSet) -> Result<OffsetSet, LayerError>;

	/// Re-resolves every layer that uses the language called `name`.
	fn language_configuration_changed(&mut self, name: &str, content: &LayerContent) -> Result<OffsetSet, LayerError>;

	fn execute_query(
		&self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
	) -> Result<Vec<QueryCapture>, LayerError>;

	/// Returns an immutable copy that can be queried off the worker thread.
	fn snapshot(&self) -> Option<Box<dyn LayerSnapshot>>;
}

/// Immutable view of a [`LanguageLayer`] at some committed version.
pub trait LayerSnapshot: Send + 'static {
	fn execute_query(
		&self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
	) -> Result<Vec<QueryCapture>, LayerError>;
}
