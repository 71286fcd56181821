//! Incremental, layered parsing driven by demand.
//!
//! [`BackgroundingLanguageLayerTree`] keeps a [`LanguageLayer`] on a worker
//! thread and decides per edit whether to reparse inline or in the
//! background. [`TreeSitterClient`] sits in front of it: a range processor
//! decides how far the document has been parsed, a validator tracks which
//! regions have had their nested layers resolved, and every region whose
//! meaning changed is reported back to the owner.

mod client;
mod error;
mod layer;
#[cfg(test)]
mod test_layer;
mod tree;

pub use client::{ClientCfg, TreeSitterClient};
pub use error::{LayerError, LayerTreeError};
pub use layer::{
	ContentProvider, InputEdit, LanguageLayer, LayerContent, LayerSnapshot, LocationTransformer, NamedRange, Point,
	QueryCapture, QueryDefinition, TextProvider,
};
pub use tree::{BackgroundingLanguageLayerTree, EditApplication, FinishedJob, JobKind, LayerTreeCfg};
