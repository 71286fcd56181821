//! Range-validity engine.
//!
//! [`RangeProcessor`] tracks how far a strictly sequential pass has read into
//! some content. [`RangeValidator`] keeps valid/pending/invalid bookkeeping
//! that survives edits, and the single- and three-phase validators drive it
//! through pluggable providers.

mod invalidation;
mod processor;
mod provider;
mod single_phase;
mod three_phase;
mod validator;

pub use invalidation::{InvalidationHandler, RangeInvalidationBuffer};
pub use processor::{ChangeHandler, ChangeStatus, FillMode, RangeProcessor, RangeProcessorCfg};
pub use provider::{FallbackHandler, HybridProvider, SecondaryProvider, ValidationProvider};
pub use single_phase::{SinglePhaseRangeValidator, Validated};
pub use three_phase::{ThreePhaseCfg, ThreePhaseRangeValidator};
pub use validator::{Action, RangeValidator, ValidationOutcome};
