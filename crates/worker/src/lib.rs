//! Worker primitives: classified task spawning and [`BackgroundProcessor`],
//! the guard that serializes access to a resource owned by a worker thread.

mod background;
mod class;
mod spawn;

pub use background::{Access, BackgroundError, BackgroundProcessor, Ticket};
pub use class::TaskClass;
pub use spawn::{spawn_blocking, spawn_named_thread};
