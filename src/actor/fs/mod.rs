//! FileSystem watch session
//!
//! Owns the OS watcher and re-exposes its notifications for every target as
//! one ordered, bounded stream of [`WatchSignal`]s.
//!
//! Architecture:
//! ```text
//! notify callback → std sync_channel → bridge thread (WatchTargets) → tokio mpsc → Coordinator
//!                                                                 ↓
//!                                     EventNormalizer (filter → label → coalesce)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use notify::RecommendedWatcher;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::WatchSignal;
use crate::config::WatchOptions;

// Raw change extraction, labeling and dispatch-time normalization.
mod classifier;
// Pure timing and deduplication.
mod debouncer;
// Path predicate.
mod filter;
// Per-target watch bookkeeping.
mod targets;

#[cfg(test)]
mod tests;

pub use classifier::EventNormalizer;

use classifier::raw_changes;
use targets::WatchTargets;

/// Capacity of the signal stream; the bridge blocks when it is full.
pub const SIGNAL_BUFFER: usize = 256;

/// Capacity between the notify callback and the bridge thread.
const NOTIFY_BUFFER: usize = 4096;

type NotifyResult = notify::Result<notify::Event>;

/// Per-target and session-level watch failures
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("watch failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("permission denied watching {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("watch target removed: {}", .0.display())]
    TargetRemoved(PathBuf),

    #[error("watch target missing: {}", .0.display())]
    MissingTarget(PathBuf),

    #[error("no watch targets")]
    NoTargets,

    #[error("notification buffer full, changes were dropped")]
    Overflow,
}

impl WatchError {
    pub(crate) fn from_notify(path: &Path, err: notify::Error) -> Self {
        match &err.kind {
            notify::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(path.to_path_buf())
            }
            notify::ErrorKind::PathNotFound => Self::MissingTarget(path.to_path_buf()),
            _ => Self::Notify(err),
        }
    }

    /// Target the failure belongs to, if any.
    pub fn target(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied(p) | Self::TargetRemoved(p) | Self::MissingTarget(p) => {
                Some(p)
            }
            _ => None,
        }
    }
}

struct SessionState {
    /// `None` once closed
    watcher: Option<RecommendedWatcher>,
    targets: WatchTargets,
}

struct Shared {
    state: Mutex<SessionState>,
    closed: AtomicBool,
    /// Set by the notify callback when the buffer was full
    overflowed: Arc<AtomicBool>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Live OS watch over a set of target roots.
///
/// Created by [`WatchSession::open`], which starts watching immediately and
/// scans targets in the background. A single [`WatchSignal::Ready`] follows
/// the scan. [`WatchSession::close`] releases every OS handle; dropping the
/// session closes it too.
pub struct WatchSession {
    shared: Arc<Shared>,
}

impl WatchSession {
    /// Open a session over `roots` and stream its signals into `signal_tx`.
    pub fn open(
        roots: Vec<PathBuf>,
        options: &WatchOptions,
        signal_tx: mpsc::Sender<WatchSignal>,
    ) -> Result<Self, WatchError> {
        if roots.is_empty() {
            return Err(WatchError::NoTargets);
        }

        // notify does not support async; bridge through a sync channel.
        let (notify_tx, notify_rx) = std::sync::mpsc::sync_channel(NOTIFY_BUFFER);
        let overflowed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&overflowed);
        let watcher = notify::recommended_watcher(move |res| forward(&notify_tx, &flag, res))?;

        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                watcher: Some(watcher),
                targets: WatchTargets::new(roots, options),
            }),
            closed: AtomicBool::new(false),
            overflowed,
        });

        let bridge = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("fswatcher-bridge".into())
            .spawn(move || run_bridge(&bridge, &notify_rx, &signal_tx))?;

        Ok(Self { shared })
    }

    /// Release every OS watch. Returns true only for the call that closed.
    pub fn close(&self) -> bool {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut state = self.shared.state.lock();
        let SessionState { watcher, targets } = &mut *state;
        if let Some(mut watcher) = watcher.take() {
            targets.release_all(&mut watcher);
        }
        crate::debug!("watch"; "session closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Targets still holding a live watch.
    pub fn active_targets(&self) -> usize {
        self.shared.state.lock().targets.active_count()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Hand one notification to the bridge without blocking the backend.
///
/// The backend thread also serves `watch` calls made by the bridge, so it
/// must never wait on the bridge. A full buffer drops the notification and
/// raises `overflowed`.
fn forward(tx: &SyncSender<NotifyResult>, overflowed: &AtomicBool, res: NotifyResult) {
    if let Err(TrySendError::Full(_)) = tx.try_send(res) {
        overflowed.store(true, Ordering::SeqCst);
    }
}

/// Bridge thread: initial scan, then forward notifications until the
/// session closes or the receiving side goes away.
fn run_bridge(
    shared: &Shared,
    notify_rx: &Receiver<NotifyResult>,
    signal_tx: &mpsc::Sender<WatchSignal>,
) {
    let send = |signal: WatchSignal| !shared.is_closed() && signal_tx.blocking_send(signal).is_ok();

    let count = shared.state.lock().targets.len();
    for index in 0..count {
        let result = {
            let mut state = shared.state.lock();
            let SessionState { watcher, targets } = &mut *state;
            let Some(watcher) = watcher.as_mut() else {
                return;
            };
            targets.attach(watcher, index)
        };
        if let Err(e) = result
            && !send(WatchSignal::Error(e))
        {
            return;
        }
    }

    let attached = shared.state.lock().targets.active_count();
    if !send(WatchSignal::Ready { attached }) {
        return;
    }

    // Ends once the watcher is dropped and its handler with it.
    while let Ok(result) = notify_rx.recv() {
        if shared.overflowed.swap(false, Ordering::SeqCst)
            && !send(WatchSignal::Error(WatchError::Overflow))
        {
            return;
        }

        let signals = match result {
            Ok(event) => {
                let mut state = shared.state.lock();
                let SessionState { watcher, targets } = &mut *state;
                let Some(watcher) = watcher.as_mut() else {
                    return;
                };
                raw_changes(&event)
                    .into_iter()
                    .flat_map(|change| targets.translate(watcher, change))
                    .collect::<Vec<_>>()
            }
            Err(e) => vec![WatchSignal::Error(WatchError::Notify(e))],
        };

        for signal in signals {
            if !send(signal) {
                return;
            }
        }
    }
}
