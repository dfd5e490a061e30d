//! Delivery sinks.
//!
//! A sink receives each [`NormalizedEvent`] exactly once through
//! [`Sink::deliver`]. Calls may run concurrently; a failed call is reported
//! by the caller and never retried here.
//!
//! | Sink          | Output                                             |
//! |---------------|----------------------------------------------------|
//! | `StdoutSink`  | one JSON [`EventEntry`] per line                   |
//! | `LogSink`     | `[sink] <path> was <event>`                        |
//! | `CommandSink` | `[EventEntry]` JSON on the stdin of a command      |

mod command;
mod console;

pub use command::CommandSink;
pub use console::{LogSink, StdoutSink};

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::config::SinkConfig;
use crate::core::NormalizedEvent;

/// Source name stamped on every entry
pub const EVENT_SOURCE: &str = "fswatcher";

/// Delivery failures
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed encoding event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed writing event: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("delivery task failed: {0}")]
    Task(String),
}

/// Asynchronous delivery capability.
pub trait Sink: Send + Sync + 'static {
    fn deliver(&self, event: NormalizedEvent)
    -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Event-bus entry wrapping a normalized event.
///
/// Field names follow the common put-events entry layout so the JSON can be
/// handed to a bus client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEntry {
    pub source: &'static str,
    pub detail_type: String,
    /// The event shape `{path, event, build?}` encoded as a JSON string
    pub detail: String,
    pub resources: Vec<String>,
}

impl EventEntry {
    pub fn from_event(event: &NormalizedEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            source: EVENT_SOURCE,
            detail_type: format!("Path {}, Event {}", event.path(), event.label()),
            detail: serde_json::to_string(event)?,
            resources: Vec::new(),
        })
    }
}

/// Sink selected by configuration.
#[derive(Debug)]
pub enum ConfiguredSink {
    Stdout(StdoutSink),
    Log(LogSink),
    Command(CommandSink),
}

impl ConfiguredSink {
    pub fn from_config(config: &SinkConfig) -> Self {
        match config {
            SinkConfig::Stdout => Self::Stdout(StdoutSink),
            SinkConfig::Log => Self::Log(LogSink),
            SinkConfig::Command { command } => Self::Command(CommandSink::new(command.clone())),
        }
    }
}

impl Sink for ConfiguredSink {
    async fn deliver(&self, event: NormalizedEvent) -> Result<(), SinkError> {
        match self {
            Self::Stdout(sink) => sink.deliver(event).await,
            Self::Log(sink) => sink.deliver(event).await,
            Self::Command(sink) => sink.deliver(event).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::core::EventLabel;

    #[test]
    fn test_entry_layout() {
        let event = NormalizedEvent::new(Path::new("/srv/foo.txt"), EventLabel::Added, None);
        let entry = EventEntry::from_event(&event).unwrap();
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"Source":"fswatcher","DetailType":"Path /srv/foo.txt, Event added","Detail":"{\"path\":\"/srv/foo.txt\",\"event\":\"added\"}","Resources":[]}"#
        );
    }

    #[test]
    fn test_from_config() {
        assert!(matches!(
            ConfiguredSink::from_config(&SinkConfig::Stdout),
            ConfiguredSink::Stdout(_)
        ));
        assert!(matches!(
            ConfiguredSink::from_config(&SinkConfig::Command {
                command: vec!["cat".into()]
            }),
            ConfiguredSink::Command(_)
        ));
    }
}
