//! Actor System for File Watching
//!
//! Message-passing concurrency for the watch loop:
//!
//! ```text
//! WatchSession --> Coordinator --> Dispatcher
//!  (notify)     (normalize/loop)   (sink tasks)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Signal types between the watch session and the loop
//! - `fs` - Watch session, path filter, normalizer and coalescing
//! - `dispatch` - Spawned, fire-and-forget sink deliveries
//! - `coordinator` - Lifecycle and the dispatch loop

pub mod coordinator;
pub mod dispatch;
pub mod fs;
pub mod messages;

pub use coordinator::Coordinator;
