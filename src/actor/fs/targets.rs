use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use super::WatchError;
use super::classifier::RawChange;
use super::filter::{observes, relative_depth};
use crate::actor::messages::{EntryType, RawKind, RawNotification, WatchSignal};
use crate::config::WatchOptions;

/// Watch bookkeeping for every target root.
///
/// Responsibility:
/// - Scan each root once and subscribe every directory within the depth limit
/// - Follow directories appearing or disappearing below a root
/// - Track observed files so a rename over one reads as a change
/// - Abandon a root that disappears
pub(super) struct WatchTargets {
    targets: Vec<Target>,
    depth: usize,
    follow_symlinks: bool,
}

struct Target {
    root: PathBuf,
    active: bool,
    /// Observed directories below the root (relative depth `1..=depth + 1`)
    known_dirs: FxHashSet<PathBuf>,
    /// Observed files below the root
    known_files: FxHashSet<PathBuf>,
    /// Directories holding a non-recursive OS watch
    watched: FxHashSet<PathBuf>,
    /// Watched directories already reported removed, awaiting the
    /// backend's second delete for the same path
    removed: FxHashSet<PathBuf>,
}

impl Target {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            active: false,
            known_dirs: FxHashSet::default(),
            known_files: FxHashSet::default(),
            watched: FxHashSet::default(),
            removed: FxHashSet::default(),
        }
    }
}

impl WatchTargets {
    pub(super) fn new(roots: Vec<PathBuf>, options: &WatchOptions) -> Self {
        Self {
            targets: roots.into_iter().map(Target::new).collect(),
            depth: options.depth,
            follow_symlinks: options.follow_symlinks,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.targets.len()
    }

    pub(super) fn active_count(&self) -> usize {
        self.targets.iter().filter(|t| t.active).count()
    }

    /// Scan target `index` and subscribe its directories.
    ///
    /// Existing entries are recorded without emitting anything. Only a
    /// failure to watch the root itself is an error; unreadable
    /// subdirectories are skipped.
    pub(super) fn attach<W: Watcher>(
        &mut self,
        watcher: &mut W,
        index: usize,
    ) -> Result<(), WatchError> {
        let (depth, follow) = (self.depth, self.follow_symlinks);
        let target = &mut self.targets[index];

        if !target.root.is_dir() {
            return Err(WatchError::MissingTarget(target.root.clone()));
        }

        watcher
            .watch(&target.root, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::from_notify(&target.root, e))?;
        target.watched.insert(target.root.clone());

        for (path, level, is_dir) in scan_entries(&target.root, depth + 1, follow) {
            if !is_dir {
                target.known_files.insert(path);
                continue;
            }
            if level <= depth {
                watch_dir(watcher, &mut target.watched, &path);
            }
            target.known_dirs.insert(path);
        }

        target.active = true;
        crate::debug!(
            "watch";
            "attached {} ({} dirs, {} files)",
            target.root.display(),
            target.watched.len(),
            target.known_files.len()
        );
        Ok(())
    }

    /// Resolve one raw change against the targets.
    ///
    /// Directory creates subscribe the new directory and synthesize creates
    /// for whatever it already contains. Directory deletes are emitted once
    /// even when the backend reports them twice.
    pub(super) fn translate<W: Watcher>(
        &mut self,
        watcher: &mut W,
        change: RawChange,
    ) -> Vec<WatchSignal> {
        let (depth, follow) = (self.depth, self.follow_symlinks);
        let Some(target) = self.target_of(&change.path) else {
            return Vec::new();
        };

        if change.path == target.root {
            if target.root.is_dir() {
                return Vec::new();
            }
            release(watcher, target);
            crate::debug!("watch"; "target lost: {}", target.root.display());
            return vec![WatchSignal::Error(WatchError::TargetRemoved(
                target.root.clone(),
            ))];
        }

        if change.kind == RawKind::Delete && target.removed.remove(&change.path) {
            return Vec::new();
        }

        let Some(entry) = resolve_entry(target, &change, follow) else {
            crate::debug!("watch"; "vanished before stat: {}", change.path.display());
            return Vec::new();
        };

        match (change.kind, entry) {
            (RawKind::Create, EntryType::Directory) => {
                on_dir_created(watcher, target, change.path, depth, follow)
            }
            (RawKind::Delete, EntryType::Directory) => on_dir_removed(watcher, target, change.path),
            (_, EntryType::File) => match track_file(target, &change, depth) {
                Some(kind) => vec![WatchSignal::Raw(RawNotification::new(
                    change.path,
                    kind,
                    EntryType::File,
                ))],
                None => {
                    crate::debug!("watch"; "already reported: {}", change.path.display());
                    Vec::new()
                }
            },
            (kind, entry) => vec![WatchSignal::Raw(RawNotification::new(
                change.path,
                kind,
                entry,
            ))],
        }
    }

    /// Drop every OS watch and deactivate all targets.
    pub(super) fn release_all<W: Watcher>(&mut self, watcher: &mut W) {
        for target in &mut self.targets {
            release(watcher, target);
        }
    }

    /// Innermost active target containing `path`.
    fn target_of(&mut self, path: &Path) -> Option<&mut Target> {
        self.targets
            .iter_mut()
            .filter(|t| t.active && path.starts_with(&t.root))
            .max_by_key(|t| t.root.components().count())
    }
}

/// Entries below `root` up to `max_depth`: path, relative depth, is-directory.
fn scan_entries(root: &Path, max_depth: usize, follow: bool) -> Vec<(PathBuf, usize, bool)> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .skip_hidden(true)
        .follow_links(follow)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                crate::debug!("watch"; "skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.depth() > 0)
        .map(|e| (e.path(), e.depth(), e.file_type().is_dir()))
        .collect()
}

fn watch_dir<W: Watcher>(watcher: &mut W, watched: &mut FxHashSet<PathBuf>, dir: &Path) {
    match watcher.watch(dir, RecursiveMode::NonRecursive) {
        Ok(()) => {
            watched.insert(dir.to_path_buf());
        }
        Err(e) => crate::debug!("watch"; "cannot watch {}: {}", dir.display(), e),
    }
}

fn release<W: Watcher>(watcher: &mut W, target: &mut Target) {
    for dir in target.watched.drain() {
        // Removed directories lose their watch on their own.
        let _ = watcher.unwatch(&dir);
    }
    target.known_dirs.clear();
    target.known_files.clear();
    target.removed.clear();
    target.active = false;
}

fn resolve_entry(target: &Target, change: &RawChange, follow: bool) -> Option<EntryType> {
    if change.kind == RawKind::Delete {
        if target.known_dirs.contains(&change.path) {
            return Some(EntryType::Directory);
        }
        return Some(change.entry.unwrap_or(EntryType::File));
    }

    if let Some(entry) = change.entry {
        return Some(entry);
    }

    let metadata = if follow {
        std::fs::metadata(&change.path)
    } else {
        std::fs::symlink_metadata(&change.path)
    };
    metadata.ok().map(|m| {
        if m.is_dir() {
            EntryType::Directory
        } else {
            EntryType::File
        }
    })
}

/// Record file presence and settle the kind to emit.
///
/// A create of an already known file is a repeated report and yields `None`,
/// unless a rename put a new file over it, which is a change.
fn track_file(target: &mut Target, change: &RawChange, depth: usize) -> Option<RawKind> {
    if !observes(&target.root, &change.path, depth) {
        return Some(change.kind);
    }

    match change.kind {
        RawKind::Delete => {
            target.known_files.remove(&change.path);
            Some(RawKind::Delete)
        }
        RawKind::Modify => {
            target.known_files.insert(change.path.clone());
            Some(RawKind::Modify)
        }
        RawKind::Create if target.known_files.insert(change.path.clone()) => Some(RawKind::Create),
        RawKind::Create if change.renamed => Some(RawKind::Modify),
        RawKind::Create => None,
    }
}

fn on_dir_created<W: Watcher>(
    watcher: &mut W,
    target: &mut Target,
    dir: PathBuf,
    depth: usize,
    follow: bool,
) -> Vec<WatchSignal> {
    let create = |path: PathBuf, entry| {
        WatchSignal::Raw(RawNotification::new(path, RawKind::Create, entry))
    };

    if !observes(&target.root, &dir, depth) {
        return vec![create(dir, EntryType::Directory)];
    }
    if !target.known_dirs.insert(dir.clone()) {
        return Vec::new();
    }
    target.removed.remove(&dir);

    let level = relative_depth(&target.root, &dir).unwrap_or(depth + 1);
    if level <= depth {
        watch_dir(watcher, &mut target.watched, &dir);
    }

    let mut signals = vec![create(dir.clone(), EntryType::Directory)];
    if level > depth {
        return signals;
    }

    // Entries written before the watch was in place.
    let entries = WalkDir::new(&dir)
        .max_depth(depth + 1 - level)
        .skip_hidden(true)
        .follow_links(follow)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.depth() > 0);

    for entry in entries {
        let path = entry.path();
        if entry.file_type().is_dir() {
            if !target.known_dirs.insert(path.clone()) {
                continue;
            }
            if relative_depth(&target.root, &path).is_some_and(|l| l <= depth) {
                watch_dir(watcher, &mut target.watched, &path);
            }
            signals.push(create(path, EntryType::Directory));
        } else if target.known_files.insert(path.clone()) {
            signals.push(create(path, EntryType::File));
        }
    }

    signals
}

fn on_dir_removed<W: Watcher>(
    watcher: &mut W,
    target: &mut Target,
    dir: PathBuf,
) -> Vec<WatchSignal> {
    if !target.known_dirs.remove(&dir) {
        return Vec::new();
    }

    if target.watched.contains(&dir) {
        target.removed.insert(dir.clone());
    }
    target.known_dirs.retain(|d| !d.starts_with(&dir));
    target.known_files.retain(|f| !f.starts_with(&dir));
    target.watched.retain(|d| {
        if d.starts_with(&dir) {
            let _ = watcher.unwatch(d);
            false
        } else {
            true
        }
    });

    vec![WatchSignal::Raw(RawNotification::new(
        dir,
        RawKind::Delete,
        EntryType::Directory,
    ))]
}
