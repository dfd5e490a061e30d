//! Lifecycle state for the watcher process.
//!
//! Phases advance in one direction only:
//!
//! ```text
//! Starting -> Watching -> Draining -> Stopped
//! ```
//!
//! - `Starting`: targets resolved, watch session opening, initial scan running
//! - `Watching`: initial scan complete, events are delivered
//! - `Draining`: termination requested, session closing
//! - `Stopped`: terminal
//!
//! Shutdown requests are latched: the first one wins, later ones are no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::watch;

/// Process lifecycle phase
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting = 0,
    Watching = 1,
    Draining = 2,
    Stopped = 3,
}

impl Phase {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Watching,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Shared lifecycle context, passed explicitly to whoever needs it.
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
    /// Latched on the first termination request
    shutdown: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
            shutdown: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// `Starting -> Watching`. Returns false if the phase had already moved on.
    pub fn enter_watching(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Starting as u8,
                Phase::Watching as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Move to `Draining` from `Starting` or `Watching`.
    ///
    /// Returns true only for the call that performed the transition.
    pub fn begin_draining(&self) -> bool {
        self.phase
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < Phase::Draining as u8).then_some(Phase::Draining as u8)
            })
            .is_ok()
    }

    /// Terminal transition.
    pub fn stop(&self) {
        self.phase.store(Phase::Stopped as u8, Ordering::SeqCst);
    }

    /// Request shutdown. Returns true only for the first request.
    pub fn request_shutdown(&self) -> bool {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown_tx.send_replace(true);
        true
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` once shutdown is requested.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

/// Install the process-wide termination handler (SIGINT, SIGTERM, SIGHUP).
///
/// Call once at program start. Repeated signals are absorbed by
/// [`Lifecycle::request_shutdown`], so the session is closed once and the
/// process exits once.
pub fn setup_shutdown_handler(lifecycle: Arc<Lifecycle>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if lifecycle.request_shutdown() {
            crate::log!("watch"; "termination signal received, shutting down...");
        } else {
            crate::debug!("watch"; "shutdown already in progress");
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set termination handler: {}", e))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Starting);

        assert!(lifecycle.enter_watching());
        assert!(!lifecycle.enter_watching());
        assert_eq!(lifecycle.phase(), Phase::Watching);

        assert!(lifecycle.begin_draining());
        assert!(!lifecycle.begin_draining());
        assert_eq!(lifecycle.phase(), Phase::Draining);

        lifecycle.stop();
        assert_eq!(lifecycle.phase(), Phase::Stopped);
        assert!(!lifecycle.begin_draining());
    }

    #[test]
    fn test_draining_from_starting_blocks_watching() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.begin_draining());
        assert!(!lifecycle.enter_watching());
        assert_eq!(lifecycle.phase(), Phase::Draining);
    }

    #[test]
    fn test_shutdown_latched_once_across_threads() {
        let lifecycle = Arc::new(Lifecycle::new());
        let rx = lifecycle.subscribe();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                std::thread::spawn(move || lifecycle.request_shutdown())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(lifecycle.is_shutdown());
        assert!(*rx.borrow());
    }

    #[test]
    fn test_late_subscriber_sees_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.request_shutdown();
        assert!(*lifecycle.subscribe().borrow());
    }
}
