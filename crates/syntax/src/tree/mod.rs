use std::collections::VecDeque;
use std::future::Future;

use strata_primitives::{Mutation, OffsetSet, Span, poll_once};
use strata_worker::{BackgroundError, BackgroundProcessor, TaskClass, Ticket, spawn_blocking};

use crate::error::{LayerError, LayerTreeError};
use crate::layer::{InputEdit, LanguageLayer, LayerContent, LocationTransformer, Point, QueryCapture, QueryDefinition, TextProvider};


/// Limits for applying edits inline on the owner thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerTreeCfg {
	/// Edits whose span length or delta reach this many units go to the worker.
	pub synchronous_length_threshold: usize,
	/// Edits ending at or past this offset go to the worker.
	pub synchronous_document_size: usize,
}

impl Default for LayerTreeCfg {
	fn default() -> Self {
		Self {
			synchronous_length_threshold: 2048,
			synchronous_document_size: 2048 * 512,
		}
	}
}

/// How [`BackgroundingLanguageLayerTree`] handled an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditApplication {
	/// Applied inline; carries the invalidated offsets.
	Applied(OffsetSet),
	/// Queued on the worker; the result arrives through
	/// [`BackgroundingLanguageLayerTree::drain_finished`].
	Pending,
}

/// Kind of a finished background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
	Edit,
	ConfigurationReload,
}

/// Result of a background job, delivered in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedJob {
	pub kind: JobKind,
	/// Invalidated offsets in the coordinates of the job's submission.
	pub invalidated: OffsetSet,
}

struct InflightJob {
	kind: JobKind,
	ticket: Ticket<Result<OffsetSet, LayerError>>,
	/// Content limit at submission, invalidated wholesale if the job fails.
	limit: usize,
}

/// Holds a [`LanguageLayer`] behind a [`BackgroundProcessor`].
///
/// Small edits on small documents are applied inline when the tree is up to
/// date. Everything else runs on the worker thread in submission order and is
/// collected by the owner. Each edit must be announced with
/// [`Self::will_change_content`] so the pre-edit end point can be captured
/// before the content changes.
pub struct BackgroundingLanguageLayerTree<L: LanguageLayer> {
	cfg: LayerTreeCfg,
	processor: BackgroundProcessor<L>,
	locations: LocationTransformer,
	old_end: Option<(usize, Point)>,
	inflight: VecDeque<InflightJob>,
	version: u64,
	committed_version: u64,
}

impl<L: LanguageLayer> BackgroundingLanguageLayerTree<L> {
	pub fn new(cfg: LayerTreeCfg, layer: L, locations: LocationTransformer) -> Result<Self, LayerTreeError> {
		Ok(Self {
			cfg,
			processor: BackgroundProcessor::new("strata-layer-tree", layer)?,
			locations,
			old_end: None,
			inflight: VecDeque::new(),
			version: 0,
			committed_version: 0,
		})
	}

	pub fn cfg(&self) -> &LayerTreeCfg {
		&self.cfg
	}

	/// Version of the most recently submitted edit.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Version of the most recently applied edit the owner has collected.
	pub fn committed_version(&self) -> u64 {
		self.committed_version
	}

	/// Returns true when every submitted job has been collected.
	pub fn is_up_to_date(&self) -> bool {
		self.inflight.is_empty()
	}

	fn point(&self, offset: usize) -> Point {
		match (self.locations)(offset) {
			Some(point) => point,
			None => {
				tracing::warn!(offset, "layer_tree.location_unavailable");
				Point::default()
			}
		}
	}

	/// Captures the pre-edit position of `span.end`.
	pub fn will_change_content(&mut self, span: Span) {
		self.old_end = Some((span.end, self.point(span.end)));
	}

	fn input_edit(&mut self, mutation: &Mutation) -> InputEdit {
		let span = mutation.span;
		let new_end = span.start + mutation.inserted_len();

		// Fills append past the old end, which therefore keeps its position.
		let old_end_point = match self.old_end.take() {
			Some((offset, point)) if offset == span.end => point,
			_ => self.point(span.end),
		};

		InputEdit {
			start_byte: span.start,
			old_end_byte: span.end,
			new_end_byte: new_end,
			start_point: self.point(span.start),
			old_end_point,
			new_end_point: self.point(new_end),
		}
	}

	fn is_small(&self, mutation: &Mutation) -> bool {
		let threshold = self.cfg.synchronous_length_threshold;
		mutation.delta.unsigned_abs() < threshold
			&& mutation.span.len() < threshold
			&& mutation.span.end < self.cfg.synchronous_document_size
	}

	/// Applies an edit, inline when possible.
	///
	/// `content` must be the post-edit document clipped to the mutation's
	/// [`Mutation::post_apply_limit`].
	pub fn did_change_content(&mut self, content: LayerContent, mutation: &Mutation) -> EditApplication {
		let edit = self.input_edit(mutation);
		self.version += 1;

		if self.is_small(mutation)
			&& self.is_up_to_date()
			&& let Ok(result) = self.processor.access_synchronously(|layer| layer.apply_edit(&content, &edit))
		{
			self.committed_version = self.version;
			tracing::trace!(version = self.version, ?edit, "layer_tree.edit.inline");
			let invalidated = job_result(JobKind::Edit, content.limit, result.map_err(LayerTreeError::from));
			return EditApplication::Applied(invalidated);
		}

		tracing::trace!(version = self.version, ?edit, "layer_tree.edit.dispatched");
		let limit = content.limit;
		let ticket = self.processor.dispatch(move |layer: &mut L| layer.apply_edit(&content, &edit));
		self.inflight.push_back(InflightJob {
			kind: JobKind::Edit,
			ticket,
			limit,
		});
		EditApplication::Pending
	}

	/// Re-resolves layers using the language called `name`.
	///
	/// Runs inline when the tree is idle, otherwise after queued jobs.
	pub fn language_configuration_changed(&mut self, name: &str, content: LayerContent) -> EditApplication {
		let limit = content.limit;
		let name = name.to_owned();

		if self.is_up_to_date()
			&& let Ok(result) = self
				.processor
				.access_synchronously(|layer| layer.language_configuration_changed(&name, &content))
		{
			let invalidated = job_result(JobKind::ConfigurationReload, limit, result.map_err(LayerTreeError::from));
			return EditApplication::Applied(invalidated);
		}

		let ticket = self
			.processor
			.dispatch(move |layer: &mut L| layer.language_configuration_changed(&name, &content));
		self.inflight.push_back(InflightJob {
			kind: JobKind::ConfigurationReload,
			ticket,
			limit,
		});
		EditApplication::Pending
	}

	fn collect(&mut self, result: Result<Result<OffsetSet, LayerError>, BackgroundError>) -> Option<FinishedJob> {
		let job = self.inflight.pop_front()?;
		if job.kind == JobKind::Edit {
			self.committed_version += 1;
		}

		let flattened = result.map_err(LayerTreeError::from).and_then(|r| r.map_err(LayerTreeError::from));
		Some(FinishedJob {
			kind: job.kind,
			invalidated: job_result(job.kind, job.limit, flattened),
		})
	}

	/// Collects finished jobs without blocking, oldest first.
	pub fn drain_finished(&mut self) -> Vec<FinishedJob> {
		let mut finished = Vec::new();
		while let Some(job) = self.inflight.front_mut() {
			let Some(result) = poll_once(&mut job.ticket) else {
				break;
			};
			finished.extend(self.collect(result));
		}
		finished
	}

	/// Waits for the oldest job. Returns `None` when nothing is in flight.
	pub async fn next_completion(&mut self) -> Option<FinishedJob> {
		let job = self.inflight.front_mut()?;
		let result = (&mut job.ticket).await;
		self.collect(result)
	}

	/// Runs a query inline. Fails with [`LayerTreeError::Unavailable`] while
	/// jobs are in flight.
	pub fn execute_query(
		&self,
		query: &QueryDefinition,
		set: &OffsetSet,
		text: &TextProvider,
	) -> Result<Vec<QueryCapture>, LayerTreeError> {
		if !self.is_up_to_date() {
			return Err(LayerTreeError::Unavailable);
		}

		let result = self
			.processor
			.access_synchronously(|layer| layer.execute_query(query, set, text))
			.map_err(unavailable)?;
		Ok(result?)
	}

	/// Snapshots the tree after all queued jobs and queries the snapshot on
	/// the blocking pool.
	pub fn execute_query_async(
		&self,
		query: QueryDefinition,
		set: OffsetSet,
		text: TextProvider,
	) -> impl Future<Output = Result<Vec<QueryCapture>, LayerTreeError>> + Send + 'static {
		let snapshot = self.processor.dispatch(|layer: &mut L| layer.snapshot());
		async move {
			let snapshot = snapshot.await?.ok_or(LayerTreeError::UnableToSnapshot)?;
			let captures = spawn_blocking(TaskClass::CpuBlocking, move || snapshot.execute_query(&query, &set, &text)).await??;
			Ok(captures)
		}
	}

	/// Resolves sublayers inline. Fails with [`LayerTreeError::Unavailable`]
	/// while jobs are in flight.
	pub fn resolve_sublayers(&self, content: &LayerContent, set: &OffsetSet) -> Result<OffsetSet, LayerTreeError> {
		if !self.is_up_to_date() {
			return Err(LayerTreeError::Unavailable);
		}

		let result = self
			.processor
			.access_synchronously(|layer| layer.resolve_sublayers(content, set))
			.map_err(unavailable)?;
		Ok(result?)
	}

	/// Resolves sublayers on the worker, after all queued jobs.
	pub fn resolve_sublayers_async(
		&self,
		content: LayerContent,
		set: OffsetSet,
	) -> impl Future<Output = Result<OffsetSet, LayerTreeError>> + Send + 'static {
		let ticket = self.processor.dispatch(move |layer: &mut L| layer.resolve_sublayers(&content, &set));
		async move { Ok(ticket.await??) }
	}
}

fn unavailable(error: BackgroundError) -> LayerTreeError {
	match error {
		BackgroundError::Unavailable => LayerTreeError::Unavailable,
		error => LayerTreeError::Background(error),
	}
}

/// Failed jobs invalidate everything they could have touched.
fn job_result(kind: JobKind, limit: usize, result: Result<OffsetSet, LayerTreeError>) -> OffsetSet {
	match result {
		Ok(invalidated) => invalidated,
		Err(error) => {
			tracing::error!(?kind, %error, limit, "layer_tree.job_failed");
			OffsetSet::full(limit)
		}
	}
}
