use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::span::Span;

/// A value tagged with the content version it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Versioned<V, T> {
	pub value: T,
	pub version: V,
}

impl<V, T> Versioned<V, T> {
	pub fn new(value: T, version: V) -> Self {
		Self { value, version }
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<V, U> {
		Versioned {
			value: f(self.value),
			version: self.version,
		}
	}
}

/// A span tagged with the content version it refers to.
pub type VersionedSpan<V> = Versioned<V, Span>;

/// Linear content that changes over time.
///
/// Versions are only compared for equality. `length` returning `None` for a
/// version is how every consumer detects that work started against that
/// version has gone stale.
pub trait VersionedContent {
	type Version: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

	fn current_version(&self) -> Self::Version;

	fn length(&self, version: &Self::Version) -> Option<usize>;

	/// Length of the current version, tagged with that version.
	///
	/// # Panics
	///
	/// Panics if the content cannot report the length of its current version.
	fn current_versioned_length(&self) -> Versioned<Self::Version, usize> {
		let version = self.current_version();
		match self.length(&version) {
			Some(length) => Versioned::new(length, version),
			None => panic!("length of current version {version:?} must always be available"),
		}
	}

	fn current_length(&self) -> usize {
		self.current_versioned_length().value
	}
}

impl<T: VersionedContent + ?Sized> VersionedContent for Arc<T> {
	type Version = T::Version;

	fn current_version(&self) -> Self::Version {
		(**self).current_version()
	}

	fn length(&self, version: &Self::Version) -> Option<usize> {
		(**self).length(version)
	}
}

impl<T: VersionedContent + ?Sized> VersionedContent for &T {
	type Version = T::Version;

	fn current_version(&self) -> Self::Version {
		(**self).current_version()
	}

	fn length(&self, version: &Self::Version) -> Option<usize> {
		(**self).length(version)
	}
}

/// Reports the current length of some content.
pub type LengthProvider = Arc<dyn Fn() -> usize + Send + Sync>;

/// Content where only the current version has a known length.
///
/// The version is a counter bumped by [`UnversionedContent::content_changed`].
pub struct UnversionedContent {
	version: AtomicU64,
	length: LengthProvider,
}

impl UnversionedContent {
	pub fn new(length: LengthProvider) -> Self {
		Self {
			version: AtomicU64::new(0),
			length,
		}
	}

	pub fn content_changed(&self) {
		self.version.fetch_add(1, Ordering::AcqRel);
	}
}

impl VersionedContent for UnversionedContent {
	type Version = u64;

	fn current_version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	fn length(&self, version: &u64) -> Option<usize> {
		(*version == self.current_version()).then(|| (self.length)())
	}
}

impl fmt::Debug for UnversionedContent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UnversionedContent")
			.field("version", &self.current_version())
			.finish_non_exhaustive()
	}
}

/// A minimal shared text buffer with a version bumped on every edit.
///
/// Offsets are byte offsets into the UTF-8 text. Meant for tests and for
/// embedding owners that have no buffer of their own; editors normally
/// implement [`VersionedContent`] over their existing storage instead.
#[derive(Debug, Default)]
pub struct TextContent {
	text: RwLock<String>,
	version: AtomicU64,
}

impl TextContent {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: RwLock::new(text.into()),
			version: AtomicU64::new(0),
		}
	}

	/// Replaces the whole text.
	pub fn set_text(&self, text: impl Into<String>) {
		*self.text.write() = text.into();
		self.version.fetch_add(1, Ordering::AcqRel);
	}

	/// Replaces `span` with `replacement` and returns the length delta.
	///
	/// # Panics
	///
	/// Panics if `span` is out of bounds or splits a character.
	pub fn replace(&self, span: Span, replacement: &str) -> isize {
		let mut text = self.text.write();
		text.replace_range(span.range(), replacement);
		self.version.fetch_add(1, Ordering::AcqRel);
		replacement.len() as isize - span.len() as isize
	}

	pub fn text(&self) -> String {
		self.text.read().clone()
	}

	/// Returns the text of `span`, clipped to the current length.
	pub fn slice(&self, span: Span) -> Option<String> {
		let text = self.text.read();
		let span = span.clamped(text.len());
		text.get(span.range()).map(str::to_owned)
	}

	pub fn len(&self) -> usize {
		self.text.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl VersionedContent for TextContent {
	type Version = u64;

	fn current_version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	fn length(&self, version: &u64) -> Option<usize> {
		(*version == self.current_version()).then(|| self.len())
	}
}
