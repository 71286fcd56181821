use std::sync::Arc;

use strata_primitives::{LengthProvider, Mutation, OffsetSet, Span, Target, UnversionedContent, VersionedContent, VersionedSpan};
use strata_range_state::{
	Action, ChangeHandler, ChangeStatus, FillMode, RangeInvalidationBuffer, RangeProcessor, RangeProcessorCfg,
	RangeValidator, ValidationOutcome,
};

use crate::error::LayerTreeError;
use crate::layer::{ContentProvider, LanguageLayer, LocationTransformer, NamedRange, QueryCapture, QueryDefinition, TextProvider};
use crate::tree::{BackgroundingLanguageLayerTree, EditApplication, FinishedJob, JobKind, LayerTreeCfg};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCfg {
	/// Smallest parse step; keeps short requests from reparsing a few bytes at a time.
	pub min_fill_delta: usize,
	/// Largest step taken by best-effort fills.
	pub max_fill_delta: usize,
	pub layer_tree: LayerTreeCfg,
}

impl Default for ClientCfg {
	fn default() -> Self {
		Self {
			min_fill_delta: 128,
			max_fill_delta: 2048,
			layer_tree: LayerTreeCfg::default(),
		}
	}
}

/// Routes processor mutations into the layer tree.
struct TreeChangeHandler<'a, L: LanguageLayer> {
	tree: &'a mut BackgroundingLanguageLayerTree<L>,
	content: &'a ContentProvider,
	applied: &'a mut Vec<OffsetSet>,
}

impl<L: LanguageLayer> ChangeHandler for TreeChangeHandler<'_, L> {
	fn handle_change(&mut self, mutation: &Mutation) -> ChangeStatus {
		let content = (self.content)(mutation.post_apply_limit());
		match self.tree.did_change_content(content, mutation) {
			EditApplication::Applied(invalidated) => {
				self.applied.push(invalidated);
				ChangeStatus::Applied
			}
			EditApplication::Pending => ChangeStatus::Deferred,
		}
	}
}

/// Incremental parsing facade for one document.
///
/// Parsing is demand driven: nothing is parsed until a query needs it, and
/// only as far as the query reaches. Nested-language layers are resolved
/// lazily per region. Every region whose meaning changes (through edits,
/// finished background parses, newly resolved layers or reloaded language
/// configurations) is reported to the invalidation handler in current
/// coordinates.
pub struct TreeSitterClient<L: LanguageLayer> {
	processor: RangeProcessor,
	sublayer_content: Arc<UnversionedContent>,
	sublayers: RangeValidator<Arc<UnversionedContent>>,
	tree: BackgroundingLanguageLayerTree<L>,
	content: ContentProvider,
	invalidations: RangeInvalidationBuffer,
}

impl<L: LanguageLayer> TreeSitterClient<L> {
	pub fn new(
		cfg: ClientCfg,
		layer: L,
		length: LengthProvider,
		content: ContentProvider,
		locations: LocationTransformer,
		invalidation_handler: impl FnMut(Target) + Send + 'static,
	) -> Result<Self, LayerTreeError> {
		let processor_cfg = RangeProcessorCfg {
			min_delta: cfg.min_fill_delta,
			max_delta: cfg.max_fill_delta,
		};
		let sublayer_content = Arc::new(UnversionedContent::new(Arc::clone(&length)));

		Ok(Self {
			processor: RangeProcessor::new(processor_cfg, length),
			sublayers: RangeValidator::new(Arc::clone(&sublayer_content)),
			sublayer_content,
			tree: BackgroundingLanguageLayerTree::new(cfg.layer_tree, layer, locations)?,
			content,
			invalidations: RangeInvalidationBuffer::new(invalidation_handler),
		})
	}

	pub fn processor(&self) -> &RangeProcessor {
		&self.processor
	}

	pub fn tree(&self) -> &BackgroundingLanguageLayerTree<L> {
		&self.tree
	}

	pub fn sublayer_validator(&self) -> &RangeValidator<Arc<UnversionedContent>> {
		&self.sublayers
	}

	/// Must be called before every content edit.
	///
	/// Invalidations raised until the matching [`Self::did_change_content`]
	/// are delivered together.
	pub fn will_change_content(&mut self, span: Span) {
		self.invalidations.begin_buffering();

		let bound = self.processor.projected_upper_bound();
		if bound > 0 && span.start <= bound {
			self.tree.will_change_content(Span::new(span.start, span.end.min(bound)));
		}
	}

	/// Must be called after every content edit, with the pre-edit span and
	/// the length delta.
	pub fn did_change_content(&mut self, span: Span, delta: isize) {
		self.sublayer_content.content_changed();
		self.sublayers.content_changed(span, delta);

		let mut applied = Vec::new();
		let mut handler = TreeChangeHandler {
			tree: &mut self.tree,
			content: &self.content,
			applied: &mut applied,
		};
		self.processor.did_change_content(span, delta, &mut handler);
		self.publish(applied);

		if self.invalidations.is_buffering() {
			self.invalidations.end_buffering();
		}
	}

	/// Reports `target` to the invalidation handler.
	pub fn invalidate(&mut self, target: Target) {
		self.invalidations.invalidate(target);
	}

	fn publish(&mut self, sets: Vec<OffsetSet>) {
		for set in sets.into_iter().filter(|set| !set.is_empty()) {
			self.invalidations.invalidate(Target::Set(set));
		}
	}

	fn finish_job(&mut self, job: FinishedJob) {
		match job.kind {
			JobKind::Edit => {
				let Some(&head) = self.processor.pending_mutations().next() else {
					panic!("finished edit has no pending mutation");
				};
				let later: Vec<Mutation> = self.processor.pending_mutations().skip(1).copied().collect();
				let invalidated = job.invalidated.apply(&later);

				let mut applied = Vec::new();
				let mut handler = TreeChangeHandler {
					tree: &mut self.tree,
					content: &self.content,
					applied: &mut applied,
				};
				self.processor.complete_change(&head);
				self.processor.continue_filling_if_needed(&mut handler);

				self.publish(vec![invalidated]);
				self.publish(applied);
			}
			JobKind::ConfigurationReload => {
				let later: Vec<Mutation> = self.processor.pending_mutations().copied().collect();
				let invalidated = job.invalidated.apply(&later);
				self.sublayers.invalidate(&Target::Set(invalidated.clone()));
				self.publish(vec![invalidated]);
			}
		}
	}

	fn run_fill(&mut self, offset: usize, mode: FillMode) -> bool {
		let mut applied = Vec::new();
		let mut handler = TreeChangeHandler {
			tree: &mut self.tree,
			content: &self.content,
			applied: &mut applied,
		};
		let processed = self.processor.process_location(offset, mode, &mut handler);
		self.publish(applied);
		processed
	}

	/// Collects finished background work and runs scheduled fills.
	///
	/// Never blocks. Returns true if anything happened.
	pub fn pump(&mut self) -> bool {
		let finished = self.tree.drain_finished();
		let mut progressed = !finished.is_empty();
		for job in finished {
			self.finish_job(job);
		}

		let mut applied = Vec::new();
		let mut handler = TreeChangeHandler {
			tree: &mut self.tree,
			content: &self.content,
			applied: &mut applied,
		};
		progressed |= self.processor.pump(&mut handler);
		self.publish(applied);
		progressed
	}

	/// Waits until every queued edit, reload and scheduled fill has finished.
	pub async fn processing_completed(&mut self) {
		loop {
			if let Some(job) = self.tree.next_completion().await {
				self.finish_job(job);
				continue;
			}
			if !self.pump() && self.tree.is_up_to_date() && !self.processor.has_pending_changes() {
				return;
			}
		}
	}

	/// Re-resolves every layer using the language called `name`.
	pub fn language_configuration_changed(&mut self, name: &str) {
		let content = (self.content)(self.processor.projected_upper_bound());
		tracing::debug!(name, limit = content.limit, "client.language_configuration_changed");

		if let EditApplication::Applied(invalidated) = self.tree.language_configuration_changed(name, content) {
			self.sublayers.invalidate(&Target::Set(invalidated.clone()));
			self.publish(vec![invalidated]);
		}
	}

	/// Exclusive end of a query over `set`, clipped to the content.
	fn query_end(&self, set: &OffsetSet) -> Option<usize> {
		let end = set.end()?;
		Some(end.min(self.sublayer_content.current_length()))
	}

	fn sublayer_target(set: &OffsetSet, end: usize) -> Target {
		Target::Set(set.clamped(end))
	}

	/// Resolves sublayers for `set` inline. Returns false when the tree is
	/// busy with background work.
	fn resolve_sublayers(&mut self, set: &OffsetSet, end: usize) -> bool {
		let target = Self::sublayer_target(set, end);
		while let Action::Needed(request) = self.sublayers.begin_validation(&target, None) {
			let content = (self.content)(self.processor.processed_upper_bound());
			let result = self.tree.resolve_sublayers(&content, &OffsetSet::from_span(request.value));
			let Some(outcome) = self.sublayer_outcome(&request, result) else {
				self.sublayers.complete_validation(&request, ValidationOutcome::Stale);
				return false;
			};
			self.sublayers.complete_validation(&request, outcome);
		}
		true
	}

	async fn resolve_sublayers_async(&mut self, set: &OffsetSet, end: usize) {
		let target = Self::sublayer_target(set, end);
		while let Action::Needed(request) = self.sublayers.begin_validation(&target, None) {
			let content = (self.content)(self.processor.processed_upper_bound());
			let resolution = self
				.tree
				.resolve_sublayers_async(content, OffsetSet::from_span(request.value));

			let guard = AbandonedResolution {
				sublayers: &mut self.sublayers,
				request: Some(request),
			};
			let result = resolution.await;
			guard.disarm();

			let Some(outcome) = self.sublayer_outcome(&request, result) else {
				self.sublayers.complete_validation(&request, ValidationOutcome::Stale);
				break;
			};
			self.sublayers.complete_validation(&request, outcome);
		}
	}

	/// Maps a resolution result to a validation outcome, publishing the
	/// regions newly resolved layers cover. `None` means the tree was busy.
	fn sublayer_outcome(
		&mut self,
		request: &VersionedSpan<u64>,
		result: Result<OffsetSet, LayerTreeError>,
	) -> Option<ValidationOutcome> {
		match result {
			Ok(invalidated) => {
				self.publish(vec![invalidated]);
				Some(ValidationOutcome::Success(request.value))
			}
			Err(LayerTreeError::Unavailable) => None,
			Err(error) => {
				tracing::warn!(span = ?request.value, %error, "client.sublayers.resolution_failed");
				Some(ValidationOutcome::Success(request.value))
			}
		}
	}

	/// Runs `query` over `set` if everything it needs is available now.
	///
	/// Parses up to the end of `set` as far as `mode` allows. Returns
	/// `Ok(None)` when the region is not parsed yet or background work is
	/// outstanding. Captures are ordered by position.
	pub fn execute_query(
		&mut self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
		mode: FillMode,
	) -> Result<Option<Vec<QueryCapture>>, LayerTreeError> {
		self.pump();
		let Some(end) = self.query_end(set) else {
			return Ok(Some(Vec::new()));
		};

		if !self.run_fill(end, mode) || !self.tree.is_up_to_date() || !self.resolve_sublayers(set, end) {
			tracing::trace!(end, "client.query.unavailable");
			return Ok(None);
		}

		match self.tree.execute_query(query, &set.clamped(end), text) {
			Ok(captures) => Ok(Some(sorted(captures))),
			Err(LayerTreeError::Unavailable) => Ok(None),
			Err(error) => Err(error),
		}
	}

	/// Runs `query` over `set`, waiting for whatever parsing it needs.
	pub async fn execute_query_async(
		&mut self,
		query: QueryDefinition,
		set: OffsetSet,
		text: TextProvider,
	) -> Result<Vec<QueryCapture>, LayerTreeError> {
		let Some(end) = self.query_end(&set) else {
			return Ok(Vec::new());
		};

		while !self.run_fill(end, FillMode::Required) {
			let Some(job) = self.tree.next_completion().await else {
				break;
			};
			self.finish_job(job);
		}
		self.resolve_sublayers_async(&set, end).await;

		let captures = self.tree.execute_query_async(query, set.clamped(end), text).await?;
		Ok(sorted(captures))
	}

	/// Highlight captures for `set`, if available now.
	pub fn highlights(
		&mut self,
		set: &OffsetSet,
		text: &TextProvider,
		mode: FillMode,
	) -> Result<Option<Vec<NamedRange>>, LayerTreeError> {
		let captures = self.execute_query(&QueryDefinition::Highlights, set, text, mode)?;
		Ok(captures.map(|captures| captures.into_iter().map(NamedRange::from).collect()))
	}

	/// Highlight captures for `set`, waiting for parsing as needed.
	pub async fn highlights_async(&mut self, set: OffsetSet, text: TextProvider) -> Result<Vec<NamedRange>, LayerTreeError> {
		let captures = self.execute_query_async(QueryDefinition::Highlights, set, text).await?;
		Ok(captures.into_iter().map(NamedRange::from).collect())
	}
}

/// Releases a sublayer request whose resolution future was dropped before
/// it finished, so the region can be requested again.
struct AbandonedResolution<'a> {
	sublayers: &'a mut RangeValidator<Arc<UnversionedContent>>,
	request: Option<VersionedSpan<u64>>,
}

impl AbandonedResolution<'_> {
	fn disarm(mut self) {
		self.request = None;
	}
}

impl Drop for AbandonedResolution<'_> {
	fn drop(&mut self) {
		if let Some(request) = self.request.take() {
			tracing::debug!(span = ?request.value, "client.sublayers.abandoned");
			self.sublayers.complete_validation(&request, ValidationOutcome::Stale);
		}
	}
}

fn sorted(mut captures: Vec<QueryCapture>) -> Vec<QueryCapture> {
	captures.sort_by_key(|capture| (capture.span.start, capture.span.end, capture.depth));
	captures
}
