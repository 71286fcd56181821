use strata_worker::BackgroundError;

/// Failures raised by a [`crate::LanguageLayer`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
	#[error("language {0:?} is not available")]
	LanguageUnavailable(String),
	#[error("query failed: {0}")]
	Query(String),
	#[error("sublayer resolution failed: {0}")]
	Resolution(String),
}

/// Failures of [`crate::BackgroundingLanguageLayerTree`] access paths.
#[derive(Debug, thiserror::Error)]
pub enum LayerTreeError {
	/// The tree has edits in flight, so it cannot be used synchronously.
	#[error("layer tree is busy applying edits")]
	Unavailable,
	/// The layer cannot produce a snapshot for off-thread queries.
	#[error("layer tree could not be snapshotted")]
	UnableToSnapshot,
	#[error(transparent)]
	Layer(#[from] LayerError),
	#[error(transparent)]
	Background(#[from] BackgroundError),
	#[error("query task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}
