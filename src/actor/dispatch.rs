//! Fire-and-forget delivery of normalized events.
//!
//! Each event gets its own task; the dispatch loop never waits on a sink.
//! A failed or panicking delivery is reported and the event discarded.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;

use crate::core::NormalizedEvent;
use crate::report::Reporter;
use crate::sink::Sink;

pub struct Dispatcher<S: Sink> {
    sink: Arc<S>,
    reporter: Arc<dyn Reporter>,
}

impl<S: Sink> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl<S: Sink> Dispatcher<S> {
    pub fn new(sink: Arc<S>, reporter: Arc<dyn Reporter>) -> Self {
        Self { sink, reporter }
    }

    /// Spawn delivery of `event`. The handle is only useful to tests.
    pub fn dispatch(&self, event: NormalizedEvent) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let reporter = Arc::clone(&self.reporter);

        tokio::spawn(async move {
            let mut context = json!({ "path": event.path(), "event": event.label() });
            let shown = event.to_string();

            // Inner task so a panicking sink surfaces as a JoinError.
            let delivery = tokio::spawn(async move { sink.deliver(event).await });

            match delivery.await {
                Ok(Ok(())) => crate::debug!("dispatch"; "delivered: {}", shown),
                Ok(Err(e)) => {
                    context["error"] = json!(e.to_string());
                    reporter.report("failed sending event", Some(&context));
                }
                Err(e) if e.is_panic() => {
                    context["error"] = json!("delivery task panicked");
                    reporter.report("failed sending event", Some(&context));
                }
                Err(_) => crate::debug!("dispatch"; "delivery cancelled: {}", shown),
            }
        })
    }
}
