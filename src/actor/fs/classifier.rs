use std::path::PathBuf;
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

use super::debouncer::Coalescer;
use super::filter::PathFilter;
use crate::actor::messages::{EntryType, RawKind, RawNotification};
use crate::config::WatchOptions;
use crate::core::{EventLabel, NormalizedEvent};

/// One path-level change pulled out of a notify event.
///
/// `entry` is set only when the backend reported it; otherwise the watch
/// targets resolve it from the filesystem. `renamed` marks the new name of a
/// rename, which may replace an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawChange {
    pub path: PathBuf,
    pub kind: RawKind,
    pub entry: Option<EntryType>,
    pub renamed: bool,
}

impl RawChange {
    pub(super) fn new(path: PathBuf, kind: RawKind, entry: Option<EntryType>) -> Self {
        Self {
            path,
            kind,
            entry,
            renamed: false,
        }
    }

    pub(super) fn renamed(mut self) -> Self {
        self.renamed = true;
        self
    }
}

/// Split a notify event into per-path changes.
///
/// Renames become a delete of the old name plus a create of the new one.
/// Metadata-only and access notifications yield nothing.
///
/// Backends that pair a rename also report each side on its own (`From`,
/// then `To`), so the paired `Both` notification is skipped.
pub(super) fn raw_changes(event: &notify::Event) -> Vec<RawChange> {
    let each = |kind: RawKind, entry: Option<EntryType>| -> Vec<RawChange> {
        event
            .paths
            .iter()
            .map(|path| RawChange::new(path.clone(), kind, entry))
            .collect()
    };

    match event.kind {
        EventKind::Create(kind) => each(RawKind::Create, create_entry(kind)),
        EventKind::Remove(kind) => each(RawKind::Delete, remove_entry(kind)),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => rename_changes(mode, &event.paths),
        EventKind::Modify(_) => each(RawKind::Modify, None),
        _ => Vec::new(),
    }
}

fn create_entry(kind: CreateKind) -> Option<EntryType> {
    match kind {
        CreateKind::File => Some(EntryType::File),
        CreateKind::Folder => Some(EntryType::Directory),
        _ => None,
    }
}

fn remove_entry(kind: RemoveKind) -> Option<EntryType> {
    match kind {
        RemoveKind::File => Some(EntryType::File),
        RemoveKind::Folder => Some(EntryType::Directory),
        _ => None,
    }
}

fn rename_changes(mode: RenameMode, paths: &[PathBuf]) -> Vec<RawChange> {
    let from = |path: &PathBuf| RawChange::new(path.clone(), RawKind::Delete, None);
    let to = |path: &PathBuf| RawChange::new(path.clone(), RawKind::Create, None).renamed();

    match mode {
        RenameMode::From => paths.iter().map(from).collect(),
        RenameMode::To => paths.iter().map(to).collect(),
        RenameMode::Both => Vec::new(),
        // Backend could not tell which side this is.
        _ => paths
            .iter()
            .map(|path| {
                if path.symlink_metadata().is_ok() {
                    to(path)
                } else {
                    from(path)
                }
            })
            .collect(),
    }
}

/// Map a raw kind and entry type to its delivered label.
///
/// Directory modifications carry no information and are suppressed.
pub fn label_for(kind: RawKind, entry: EntryType) -> Option<EventLabel> {
    match (kind, entry) {
        (RawKind::Create, EntryType::File) => Some(EventLabel::Added),
        (RawKind::Modify, EntryType::File) => Some(EventLabel::Changed),
        (RawKind::Delete, EntryType::File) => Some(EventLabel::Removed),
        (RawKind::Create, EntryType::Directory) => Some(EventLabel::DirectoryAdded),
        (RawKind::Delete, EntryType::Directory) => Some(EventLabel::DirectoryRemoved),
        (RawKind::Modify, EntryType::Directory) => None,
    }
}

/// Turns raw notifications into normalized events.
///
/// Filters at dispatch time, labels, and coalesces. Once closed it accepts
/// nothing and releases nothing.
pub struct EventNormalizer {
    filter: PathFilter,
    coalescer: Coalescer,
    build: Option<String>,
    closed: bool,
}

impl EventNormalizer {
    pub fn new(roots: Vec<PathBuf>, options: &WatchOptions, build: Option<String>) -> Self {
        Self {
            filter: PathFilter::new(roots, options.depth),
            coalescer: Coalescer::new(options.atomic, options.write_stability),
            build,
            closed: false,
        }
    }

    pub fn accept(&mut self, raw: RawNotification) {
        if self.closed {
            return;
        }
        if !self.filter.should_observe(&raw.path) {
            crate::debug!("watch"; "filtered {}: {}", raw.kind.label(), raw.path.display());
            return;
        }
        let Some(label) = label_for(raw.kind, raw.entry) else {
            return;
        };
        self.coalescer.push(raw.path, label, raw.at);
    }

    /// Events whose coalescing window has passed, in emission order.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<NormalizedEvent> {
        if self.closed {
            return Vec::new();
        }
        self.coalescer
            .take_ready(now)
            .into_iter()
            .map(|(path, label)| NormalizedEvent::new(&path, label, self.build.clone()))
            .collect()
    }

    pub fn sleep_duration(&self) -> Duration {
        self.coalescer.sleep_duration(Instant::now())
    }

    pub fn has_pending(&self) -> bool {
        !self.coalescer.is_empty()
    }

    /// Discard pending windows and refuse further input.
    pub fn close(&mut self) {
        self.closed = true;
        self.coalescer.clear();
    }
}
