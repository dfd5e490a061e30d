//! Message types flowing from the watch session to the dispatch loop.
//!
//! ```text
//! WatchSession --WatchSignal--> Coordinator --NormalizedEvent--> Sink
//! ```

use std::path::PathBuf;
use std::time::Instant;

use super::fs::WatchError;

/// What the OS reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Create,
    Modify,
    Delete,
}

impl RawKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// What kind of entry the path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// A single filesystem change, produced and consumed within one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub path: PathBuf,
    pub kind: RawKind,
    pub entry: EntryType,
    pub at: Instant,
}

impl RawNotification {
    pub fn new(path: impl Into<PathBuf>, kind: RawKind, entry: EntryType) -> Self {
        Self {
            path: path.into(),
            kind,
            entry,
            at: Instant::now(),
        }
    }
}

/// Messages from the watch session
#[derive(Debug)]
pub enum WatchSignal {
    /// A change below one of the targets
    Raw(RawNotification),
    /// A target-level failure; the session keeps running for other targets
    Error(WatchError),
    /// Initial scan of every target finished
    Ready {
        /// Targets with a live watch after the scan
        attached: usize,
    },
}
