//! Session tests against the real OS watcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::{EventNormalizer, SIGNAL_BUFFER, WatchError, WatchSession, forward};
use crate::actor::messages::WatchSignal;
use crate::config::WatchOptions;
use crate::core::{EventLabel, NormalizedEvent};
use crate::utils::path::normalize_path;

const WAIT: Duration = Duration::from_secs(5);
/// Quiet period after the expected events, to catch stragglers.
const SETTLE: Duration = Duration::from_millis(400);

struct Harness {
    _temp: TempDir,
    root: PathBuf,
    session: WatchSession,
    signals: mpsc::Receiver<WatchSignal>,
    normalizer: EventNormalizer,
}

impl Harness {
    async fn open() -> Self {
        let temp = TempDir::new().unwrap();
        let root = normalize_path(temp.path());
        Self::open_at(temp, root).await
    }

    async fn open_at(temp: TempDir, root: PathBuf) -> Self {
        let options = WatchOptions::default();
        let (tx, mut signals) = mpsc::channel(SIGNAL_BUFFER);
        let session = WatchSession::open(vec![root.clone()], &options, tx).unwrap();

        match timeout(WAIT, signals.recv()).await.unwrap() {
            Some(WatchSignal::Ready { attached }) => assert_eq!(attached, 1),
            other => panic!("expected ready, got {other:?}"),
        }

        let normalizer = EventNormalizer::new(vec![root.clone()], &options, None);
        Self {
            _temp: temp,
            root,
            session,
            signals,
            normalizer,
        }
    }

    /// Collect events until `done` holds, then for a short quiet period.
    async fn collect_until(
        &mut self,
        done: impl Fn(&[NormalizedEvent]) -> bool,
    ) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        let start = Instant::now();
        let mut settled_at = None;

        loop {
            let now = Instant::now();
            if now.duration_since(start) > WAIT {
                panic!("timed out, collected {events:?}");
            }
            if settled_at.is_none() && done(&events) {
                settled_at = Some(now);
            }
            if settled_at.is_some_and(|t| now.duration_since(t) >= SETTLE) {
                return events;
            }

            let tick = self
                .normalizer
                .sleep_duration()
                .min(Duration::from_millis(50));
            tokio::select! {
                Some(signal) = self.signals.recv() => match signal {
                    WatchSignal::Raw(raw) => self.normalizer.accept(raw),
                    other => panic!("unexpected signal {other:?}"),
                },
                _ = tokio::time::sleep(tick) => {}
            }
            events.extend(self.normalizer.drain_ready(Instant::now()));
        }
    }
}

fn has(events: &[NormalizedEvent], path: &Path, label: EventLabel) -> bool {
    events
        .iter()
        .any(|e| Path::new(e.path()) == path && e.label() == label)
}

#[tokio::test]
async fn test_created_file_is_one_added() {
    let mut h = Harness::open().await;
    let foo = h.root.join("foo.txt");
    fs::File::create(&foo).unwrap();

    let events = h
        .collect_until(|events| has(events, &foo, EventLabel::Added))
        .await;

    assert_eq!(events.len(), 1, "{events:?}");
    assert_eq!(Path::new(events[0].path()), foo);
}

#[tokio::test]
async fn test_hidden_directory_content_ignored() {
    let mut h = Harness::open().await;
    fs::create_dir(h.root.join(".hidden")).unwrap();
    fs::File::create(h.root.join(".hidden/foo.txt")).unwrap();
    let marker = h.root.join("marker");
    fs::File::create(&marker).unwrap();

    let events = h
        .collect_until(|events| has(events, &marker, EventLabel::Added))
        .await;

    assert_eq!(events.len(), 1, "{events:?}");
}

#[tokio::test]
async fn test_delete_and_recreate_is_one_change() {
    let temp = TempDir::new().unwrap();
    let root = normalize_path(temp.path());
    let foo = root.join("foo.txt");
    fs::File::create(&foo).unwrap();

    let mut h = Harness::open_at(temp, root).await;
    fs::remove_file(&foo).unwrap();
    fs::File::create(&foo).unwrap();

    let events = h
        .collect_until(|events| has(events, &foo, EventLabel::Changed))
        .await;

    assert_eq!(events.len(), 1, "{events:?}");
}

#[tokio::test]
async fn test_plain_rename_is_one_added_and_one_removed() {
    let temp = TempDir::new().unwrap();
    let root = normalize_path(temp.path());
    let (a, b) = (root.join("a.txt"), root.join("b.txt"));
    fs::write(&a, "x").unwrap();

    let mut h = Harness::open_at(temp, root).await;
    fs::rename(&a, &b).unwrap();

    let events = h
        .collect_until(|events| {
            has(events, &b, EventLabel::Added) && has(events, &a, EventLabel::Removed)
        })
        .await;

    assert_eq!(events.len(), 2, "{events:?}");
}

#[tokio::test]
async fn test_rename_over_existing_file_is_changed() {
    let temp = TempDir::new().unwrap();
    let root = normalize_path(temp.path());
    let foo = root.join("foo.txt");
    fs::write(&foo, "v1").unwrap();

    let mut h = Harness::open_at(temp, root).await;
    let tmp = h.root.join("foo.txt.tmp");
    fs::write(&tmp, "v2").unwrap();
    fs::rename(&tmp, &foo).unwrap();

    let events = h
        .collect_until(|events| {
            has(events, &foo, EventLabel::Changed) && has(events, &tmp, EventLabel::Removed)
        })
        .await;

    let for_foo: Vec<_> = events
        .iter()
        .filter(|e| Path::new(e.path()) == foo)
        .map(|e| e.label())
        .collect();
    assert_eq!(for_foo, vec![EventLabel::Changed], "{events:?}");
}

#[tokio::test]
async fn test_directory_added_and_removed() {
    let mut h = Harness::open().await;
    let sub = h.root.join("sub");
    fs::create_dir(&sub).unwrap();

    let added = h
        .collect_until(|events| has(events, &sub, EventLabel::DirectoryAdded))
        .await;
    assert_eq!(added.len(), 1, "{added:?}");

    fs::remove_dir(&sub).unwrap();
    let removed = h
        .collect_until(|events| has(events, &sub, EventLabel::DirectoryRemoved))
        .await;
    assert_eq!(removed.len(), 1, "{removed:?}");
}

#[tokio::test]
async fn test_beyond_depth_ignored() {
    let temp = TempDir::new().unwrap();
    let root = normalize_path(temp.path());
    fs::create_dir_all(root.join("a/b/c")).unwrap();

    let mut h = Harness::open_at(temp, root).await;
    fs::File::create(h.root.join("a/b/c/deep.txt")).unwrap();
    let marker = h.root.join("a/shallow.txt");
    fs::File::create(&marker).unwrap();

    let events = h
        .collect_until(|events| has(events, &marker, EventLabel::Added))
        .await;

    assert_eq!(events.len(), 1, "{events:?}");
}

#[tokio::test]
async fn test_close_is_idempotent_and_silences() {
    let mut h = Harness::open().await;
    assert_eq!(h.session.active_targets(), 1);

    assert!(h.session.close());
    assert!(!h.session.close());
    assert!(h.session.is_closed());
    assert_eq!(h.session.active_targets(), 0);

    fs::File::create(h.root.join("late.txt")).unwrap();

    // The bridge exits once the watcher is gone, closing the stream.
    let drained = timeout(WAIT, async {
        while let Some(signal) = h.signals.recv().await {
            assert!(!matches!(signal, WatchSignal::Raw(_)), "{signal:?}");
        }
    })
    .await;
    assert!(drained.is_ok());
}

#[tokio::test]
async fn test_removed_target_reported() {
    let keep = TempDir::new().unwrap();
    let lose = TempDir::new().unwrap();
    let roots = vec![normalize_path(keep.path()), normalize_path(lose.path())];
    let lost = roots[1].clone();

    let (tx, mut signals) = mpsc::channel(SIGNAL_BUFFER);
    let session = WatchSession::open(roots, &WatchOptions::default(), tx).unwrap();
    assert!(matches!(
        timeout(WAIT, signals.recv()).await.unwrap(),
        Some(WatchSignal::Ready { attached: 2 })
    ));

    drop(lose);

    let error = timeout(WAIT, async {
        loop {
            match signals.recv().await {
                Some(WatchSignal::Error(e)) => return e,
                Some(_) => continue,
                None => panic!("stream closed"),
            }
        }
    })
    .await
    .unwrap();

    assert!(matches!(&error, WatchError::TargetRemoved(p) if *p == lost));
    assert_eq!(session.active_targets(), 1);
}

#[tokio::test]
async fn test_missing_target_reported_before_ready() {
    let temp = TempDir::new().unwrap();
    let present = normalize_path(temp.path());
    let missing = present.join("missing");

    let (tx, mut signals) = mpsc::channel(SIGNAL_BUFFER);
    let session =
        WatchSession::open(vec![missing.clone(), present], &WatchOptions::default(), tx).unwrap();

    assert!(matches!(
        timeout(WAIT, signals.recv()).await.unwrap(),
        Some(WatchSignal::Error(WatchError::MissingTarget(p))) if p == missing
    ));
    assert!(matches!(
        timeout(WAIT, signals.recv()).await.unwrap(),
        Some(WatchSignal::Ready { attached: 1 })
    ));
    assert_eq!(session.active_targets(), 1);
}

#[test]
fn test_open_without_targets() {
    let (tx, _rx) = mpsc::channel(1);
    assert!(matches!(
        WatchSession::open(Vec::new(), &WatchOptions::default(), tx),
        Err(WatchError::NoTargets)
    ));
}

#[test]
fn test_full_notify_buffer_raises_overflow() {
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    let overflowed = AtomicBool::new(false);
    let event = || Ok(notify::Event::new(notify::EventKind::Any));

    forward(&tx, &overflowed, event());
    assert!(!overflowed.load(Ordering::SeqCst));

    // Returns instead of blocking on the full buffer.
    forward(&tx, &overflowed, event());
    assert!(overflowed.load(Ordering::SeqCst));
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}
