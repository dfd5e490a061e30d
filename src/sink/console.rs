use std::io::{Write, stdout};

use super::{EventEntry, Sink, SinkError};
use crate::core::NormalizedEvent;

/// Writes one JSON entry per line to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    async fn deliver(&self, event: NormalizedEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(&EventEntry::from_event(&event)?)?;
        let mut stdout = stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Logs `<path> was <event>` under the `sink` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    async fn deliver(&self, event: NormalizedEvent) -> Result<(), SinkError> {
        crate::log!("sink"; "{}", event);
        Ok(())
    }
}
