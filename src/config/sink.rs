//! `sink` section configuration.
//!
//! Selects where normalized events are delivered.
//!
//! # Example
//!
//! ```json
//! { "sink": { "kind": "command", "command": ["/usr/local/bin/notify-bus"] } }
//! ```

use serde::Deserialize;

/// Delivery target for normalized events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// One JSON event entry per line on stdout.
    #[default]
    Stdout,
    /// Human-readable `<path> was <event>` lines.
    Log,
    /// Run a command per event with the JSON entries on stdin.
    Command { command: Vec<String> },
}

impl SinkConfig {
    /// Short name used in startup logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Log => "log",
            Self::Command { .. } => "command",
        }
    }
}
