//! Core types - pure abstractions shared across the codebase.

mod event;
mod state;

pub use event::{EventLabel, NormalizedEvent};
pub use state::{Lifecycle, Phase, setup_shutdown_handler};
