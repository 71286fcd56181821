//! Word-splitting [`LanguageLayer`] used by the tree and client tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strata_primitives::{OffsetSet, Span, TextContent};

use crate::error::LayerError;
use crate::layer::{
	ContentProvider, InputEdit, LanguageLayer, LayerContent, LayerSnapshot, LocationTransformer, Point, QueryCapture,
	QueryDefinition, TextProvider,
};

pub(crate) const WORKER_THREAD: &str = "strata-layer-tree";

#[derive(Debug, Default)]
pub(crate) struct LayerLog {
	pub(crate) edits: Vec<InputEdit>,
	pub(crate) edit_threads: Vec<Option<String>>,
	pub(crate) resolved: Vec<OffsetSet>,
	pub(crate) reloads: Vec<String>,
}

/// Treats every alphanumeric run as a node. `fn` and `let` are keywords and
/// the word `inject` marks a nested layer.
#[derive(Default)]
pub(crate) struct WordLayer {
	text: String,
	log: Arc<Mutex<LayerLog>>,
	pub(crate) snapshots: bool,
	pub(crate) fail_edits: bool,
	/// Blocks the worker in every sublayer resolution.
	pub(crate) resolve_delay: Option<Duration>,
}

impl WordLayer {
	pub(crate) fn new() -> (Self, Arc<Mutex<LayerLog>>) {
		let layer = Self {
			snapshots: true,
			..Self::default()
		};
		let log = Arc::clone(&layer.log);
		(layer, log)
	}
}

fn words(text: &str) -> Vec<Span> {
	let mut spans = Vec::new();
	let mut start = None;
	for (offset, ch) in text.char_indices() {
		match (ch.is_alphanumeric(), start) {
			(true, None) => start = Some(offset),
			(false, Some(s)) => {
				spans.push(Span::new(s, offset));
				start = None;
			}
			_ => {}
		}
	}
	if let Some(s) = start {
		spans.push(Span::new(s, text.len()));
	}
	spans
}

fn query_words(
	source: &str,
	query: &QueryDefinition,
	set: &OffsetSet,
	text: &TextProvider,
) -> Result<Vec<QueryCapture>, LayerError> {
	let depth = match query {
		QueryDefinition::Highlights => 0,
		QueryDefinition::Injections => 1,
		QueryDefinition::Custom(name) => return Err(LayerError::Query(format!("unknown query {name}"))),
	};

	let mut captures: Vec<QueryCapture> = words(source)
		.into_iter()
		.filter(|word| set.intersects(&OffsetSet::from_span(*word)))
		.filter_map(|span| {
			let word = text(span)?;
			let name = match (query, word.as_str()) {
				(QueryDefinition::Injections, "inject") => "injection",
				(QueryDefinition::Injections, _) => return None,
				(_, "fn" | "let") => "keyword",
				_ => "variable",
			};
			Some(QueryCapture {
				name: name.to_owned(),
				span,
				depth,
			})
		})
		.collect();

	// Real layers report matches grouped by layer rather than by position.
	captures.reverse();
	Ok(captures)
}

impl LanguageLayer for WordLayer {
	fn apply_edit(&mut self, content: &LayerContent, edit: &InputEdit) -> Result<OffsetSet, LayerError> {
		{
			let mut log = self.log.lock();
			log.edits.push(*edit);
			log.edit_threads.push(std::thread::current().name().map(str::to_owned));
		}
		if self.fail_edits {
			return Err(LayerError::Resolution("edit rejected".to_owned()));
		}

		self.text = content.text.get(..content.limit).unwrap_or(&content.text[..]).to_owned();
		let changed = Span::new(edit.start_byte, edit.new_end_byte.max(edit.start_byte));
		Ok(OffsetSet::from_span(changed.clamped(self.text.len())))
	}

	fn resolve_sublayers(&mut self, _content: &LayerContent, set: &OffsetSet) -> Result<OffsetSet, LayerError> {
		if let Some(delay) = self.resolve_delay {
			std::thread::sleep(delay);
		}
		self.log.lock().resolved.push(set.clone());
		Ok(words(&self.text)
			.into_iter()
			.filter(|word| self.text.get(word.range()) == Some("inject"))
			.filter(|word| set.intersects(&OffsetSet::from_span(*word)))
			.collect())
	}

	fn language_configuration_changed(&mut self, name: &str, _content: &LayerContent) -> Result<OffsetSet, LayerError> {
		self.log.lock().reloads.push(name.to_owned());
		match name {
			"words" => Ok(OffsetSet::full(self.text.len())),
			other => Err(LayerError::LanguageUnavailable(other.to_owned())),
		}
	}

	fn execute_query(
		&self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
	) -> Result<Vec<QueryCapture>, LayerError> {
		query_words(&self.text, query, set, text)
	}

	fn snapshot(&self) -> Option<Box<dyn LayerSnapshot>> {
		self.snapshots
			.then(|| Box::new(WordSnapshot { text: self.text.clone() }) as Box<dyn LayerSnapshot>)
	}
}

struct WordSnapshot {
	text: String,
}

impl LayerSnapshot for WordSnapshot {
	fn execute_query(
		&self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
	) -> Result<Vec<QueryCapture>, LayerError> {
		query_words(&self.text, query, set, text)
	}
}

pub(crate) fn locations(content: &Arc<TextContent>) -> LocationTransformer {
	let content = Arc::clone(content);
	Arc::new(move |offset| {
		let text = content.text();
		let before = text.get(..offset)?;
		let row = before.matches('\n').count();
		let column = before.rfind('\n').map_or(offset, |newline| offset - newline - 1);
		Some(Point::new(row, column))
	})
}

pub(crate) fn content_provider(content: &Arc<TextContent>) -> ContentProvider {
	let content = Arc::clone(content);
	Arc::new(move |limit| LayerContent::new(content.slice(Span::new(0, limit)).unwrap_or_default()))
}

pub(crate) fn text_provider(content: &Arc<TextContent>) -> TextProvider {
	let content = Arc::clone(content);
	Arc::new(move |span| content.slice(span))
}

pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
