//! Coordinator - drives the watcher lifecycle
//!
//! # Responsibility
//!
//! The Coordinator is the single dispatch loop:
//! - Resolves watch targets and opens the watch session
//! - Feeds session signals through the event normalizer
//! - Hands ready events to the dispatcher
//! - Closes everything once on shutdown
//!
//! # Architecture
//!
//! ```text
//! WatchSession --signals--> Coordinator --events--> Dispatcher --> Sink
//!                                |
//!                                +--failures--> Reporter
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use serde_json::json;
use tokio::sync::{mpsc, watch};

use super::dispatch::Dispatcher;
use super::fs::{EventNormalizer, SIGNAL_BUFFER, WatchError, WatchSession};
use super::messages::WatchSignal;
use crate::config::{WatchConfig, WatchOptions};
use crate::core::{Lifecycle, Phase};
use crate::report::Reporter;
use crate::sink::Sink;
use crate::utils::path::normalize_path;

/// Coordinator - owns the watch session for the life of the process
pub struct Coordinator<S: Sink> {
    watches: Vec<PathBuf>,
    options: WatchOptions,
    /// Any missing target is fatal
    strict: bool,
    build: Option<String>,
    dispatcher: Dispatcher<S>,
    reporter: Arc<dyn Reporter>,
    lifecycle: Arc<Lifecycle>,
}

impl<S: Sink> Coordinator<S> {
    pub fn new(
        watches: Vec<PathBuf>,
        options: WatchOptions,
        sink: Arc<S>,
        reporter: Arc<dyn Reporter>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            watches,
            options,
            strict: false,
            build: None,
            dispatcher: Dispatcher::new(sink, Arc::clone(&reporter)),
            reporter,
            lifecycle,
        }
    }

    /// Create from a loaded configuration
    pub fn from_config(
        config: &WatchConfig,
        sink: Arc<S>,
        reporter: Arc<dyn Reporter>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self::new(
            config.watches.clone(),
            config.watch_options(),
            sink,
            reporter,
            lifecycle,
        )
        .with_strict(config.strict)
        .with_build(config.build.clone())
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Build tag stamped on every event
    pub fn with_build(mut self, build: Option<String>) -> Self {
        self.build = build;
        self
    }

    /// Existing, deduplicated target roots.
    ///
    /// Missing targets are dropped with a warning unless strict.
    fn resolve_targets(&self) -> Result<Vec<PathBuf>, WatchError> {
        let mut roots: Vec<PathBuf> = Vec::with_capacity(self.watches.len());

        for path in &self.watches {
            if !path.is_dir() {
                if self.strict {
                    return Err(WatchError::MissingTarget(path.clone()));
                }
                self.reporter.warn(&format!(
                    "watch target {} does not exist, skipping",
                    path.display()
                ));
                continue;
            }

            let root = normalize_path(path);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        if roots.is_empty() {
            return Err(WatchError::NoTargets);
        }
        Ok(roots)
    }

    /// Run until shutdown is requested or every target is lost.
    pub async fn run(self) -> Result<()> {
        let roots = self.resolve_targets()?;
        crate::debug!("watch"; "targets: {:?}", roots);

        let (signal_tx, mut signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        let session = WatchSession::open(roots.clone(), &self.options, signal_tx)?;
        let mut normalizer = EventNormalizer::new(roots, &self.options, self.build.clone());
        let mut shutdown = self.lifecycle.subscribe();

        let result = self
            .event_loop(&session, &mut normalizer, &mut signal_rx, &mut shutdown)
            .await;

        // In-flight deliveries are not awaited.
        self.lifecycle.begin_draining();
        session.close();
        if normalizer.has_pending() {
            crate::debug!("watch"; "discarding pending events");
        }
        normalizer.close();
        self.lifecycle.stop();
        crate::debug!("watch"; "stopped");

        result
    }

    async fn event_loop(
        &self,
        session: &WatchSession,
        normalizer: &mut EventNormalizer,
        signal_rx: &mut mpsc::Receiver<WatchSignal>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return Ok(()),
                signal = signal_rx.recv() => match signal {
                    Some(signal) => self.handle_signal(signal, session, normalizer)?,
                    None => bail!("watch session ended unexpectedly"),
                },
                _ = tokio::time::sleep(normalizer.sleep_duration()) => {}
            }

            self.flush(normalizer);
        }
    }

    fn handle_signal(
        &self,
        signal: WatchSignal,
        session: &WatchSession,
        normalizer: &mut EventNormalizer,
    ) -> Result<()> {
        match signal {
            WatchSignal::Raw(raw) => normalizer.accept(raw),
            WatchSignal::Ready { attached } => {
                if attached == 0 {
                    bail!("no watch target could be attached");
                }
                if self.lifecycle.enter_watching() {
                    crate::log!("watch"; "initial scan complete, watching for file changes...");
                }
            }
            WatchSignal::Error(e) => {
                let context = json!({
                    "target": e.target().map(|p| p.display().to_string()),
                });
                self.reporter
                    .report(&format!("watch error: {e}"), Some(&context));

                if self.lifecycle.phase() == Phase::Watching && session.active_targets() == 0 {
                    bail!("all watch targets lost");
                }
            }
        }
        Ok(())
    }

    /// Dispatch every event whose window has passed.
    fn flush(&self, normalizer: &mut EventNormalizer) {
        let events = normalizer.drain_ready(Instant::now());
        if events.is_empty() {
            return;
        }

        if self.lifecycle.phase() != Phase::Watching {
            crate::debug!("watch"; "dropping {} events outside watching", events.len());
            return;
        }

        for event in events {
            crate::debug!("watch"; "{}", event);
            self.dispatcher.dispatch(event);
        }
    }
}

/// Resolves once shutdown is requested.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel means the lifecycle is gone; treat it as shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
