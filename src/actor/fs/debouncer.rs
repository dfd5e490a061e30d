use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::WriteStability;
use crate::core::EventLabel;

/// Sleep used when nothing is pending.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// Timing and deduplication of labeled changes.
///
/// Only file deletes are held back by the atomic window: a create or modify
/// of the same path arriving before the window expires turns the pending
/// delete into one `changed`. Everything else is ready immediately unless
/// await-write-finish holds it until the file size settles.
pub(super) struct Coalescer {
    window: Duration,
    stability: Option<WriteStability>,
    pending: Vec<Pending>,
}

struct Pending {
    path: PathBuf,
    label: EventLabel,
    deadline: Instant,
    hold: Option<Hold>,
}

/// Size sampling state of a held write.
struct Hold {
    size: Option<u64>,
    since: Instant,
}

impl Hold {
    fn new(at: Instant) -> Self {
        Self { size: None, since: at }
    }
}

impl Coalescer {
    pub(super) fn new(window: Duration, stability: Option<WriteStability>) -> Self {
        Self {
            window,
            stability,
            pending: Vec::new(),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add a labeled change observed at `at`, applying dedup rules:
    /// - Removed + Added/Changed → Changed (atomic save)
    /// - Added + Changed → Added
    /// - Added + Removed → discard (file never settled)
    /// - Changed + Removed → Removed
    /// - Same label: first wins
    ///
    /// A directory label releases a file change pending at the same path
    /// first, and a removed directory drops held writes below it.
    pub(super) fn push(&mut self, path: PathBuf, label: EventLabel, at: Instant) {
        if label.is_directory() {
            for entry in self
                .pending
                .iter_mut()
                .filter(|p| p.path == path && !p.label.is_directory())
            {
                entry.deadline = entry.deadline.min(at);
                entry.hold = None;
            }
            if label == EventLabel::DirectoryRemoved {
                self.pending
                    .retain(|p| p.hold.is_none() || !p.path.starts_with(&path));
            }
            self.pending.push(Pending {
                path,
                label,
                deadline: at,
                hold: None,
            });
            return;
        }

        let existing = self
            .pending
            .iter()
            .rposition(|p| p.path == path && !p.label.is_directory());

        let Some(index) = existing else {
            let pending = self.fresh(path, label, at);
            self.pending.push(pending);
            return;
        };

        let entry = &mut self.pending[index];
        match (entry.label, label) {
            (EventLabel::Removed, EventLabel::Added | EventLabel::Changed) => {
                crate::debug!("watch"; "coalesce removed+{}: {}", label, path.display());
                entry.label = EventLabel::Changed;
                entry.deadline = at;
                entry.hold = self.stability.map(|_| Hold::new(at));
            }
            (EventLabel::Added | EventLabel::Changed, EventLabel::Added | EventLabel::Changed) => {
                if let Some(hold) = entry.hold.as_mut() {
                    hold.since = at;
                }
            }
            (EventLabel::Added, EventLabel::Removed) => {
                crate::debug!("watch"; "discard added+removed: {}", path.display());
                self.pending.remove(index);
            }
            (EventLabel::Changed, EventLabel::Removed) => {
                entry.label = EventLabel::Removed;
                entry.deadline = at + self.window;
                entry.hold = None;
            }
            _ => {}
        }
    }

    fn fresh(&self, path: PathBuf, label: EventLabel, at: Instant) -> Pending {
        match label {
            EventLabel::Removed => Pending {
                path,
                label,
                deadline: at + self.window,
                hold: None,
            },
            _ => Pending {
                path,
                label,
                deadline: at,
                hold: self.stability.map(|_| Hold::new(at)),
            },
        }
    }

    /// Take every change whose window has passed, in arrival order.
    pub(super) fn take_ready(&mut self, now: Instant) -> Vec<(PathBuf, EventLabel)> {
        self.take_ready_with(now, |path| std::fs::metadata(path).ok().map(|m| m.len()))
    }

    pub(super) fn take_ready_with(
        &mut self,
        now: Instant,
        size_of: impl Fn(&Path) -> Option<u64>,
    ) -> Vec<(PathBuf, EventLabel)> {
        let stability = self.stability;
        let mut ready = Vec::new();

        self.pending.retain_mut(|entry| {
            if entry.deadline > now {
                return true;
            }

            if let (Some(hold), Some(stability)) = (entry.hold.as_mut(), stability) {
                let size = size_of(&entry.path);
                if size != hold.size {
                    hold.size = size;
                    hold.since = now;
                }
                if now.duration_since(hold.since) < stability.threshold {
                    entry.deadline = now + stability.poll;
                    return true;
                }
                if size.is_none() {
                    crate::debug!("watch"; "gave up on vanished write: {}", entry.path.display());
                    return false;
                }
            }

            ready.push((std::mem::take(&mut entry.path), entry.label));
            false
        });

        ready
    }

    /// Precise sleep duration until the next pending deadline.
    pub(super) fn sleep_duration(&self, now: Instant) -> Duration {
        self.pending
            .iter()
            .map(|p| p.deadline.saturating_duration_since(now))
            .min()
            .map_or(IDLE_SLEEP, |d| d.max(Duration::from_millis(1)))
    }

    /// Drop everything pending.
    pub(super) fn clear(&mut self) {
        self.pending.clear();
    }
}
