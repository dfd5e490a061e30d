use super::{EventEntry, Sink, SinkError};
use crate::core::NormalizedEvent;
use crate::utils::exec::Cmd;

/// Runs a command per event with `[EventEntry]` as JSON on stdin.
///
/// The process runs on the blocking pool so a slow command never holds up
/// the dispatch loop.
#[derive(Debug, Clone)]
pub struct CommandSink {
    command: Vec<String>,
}

impl CommandSink {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Sink for CommandSink {
    async fn deliver(&self, event: NormalizedEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(&[EventEntry::from_event(&event)?])?;
        let cmd = Cmd::from_slice(&self.command).stdin(payload);
        let program = cmd.program().to_string_lossy().into_owned();

        let output = tokio::task::spawn_blocking(move || cmd.run())
            .await
            .map_err(|e| SinkError::Task(e.to_string()))??;

        if !output.status.success() {
            return Err(SinkError::Command {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        crate::debug!("dispatch"; "{} accepted {}", program, event);
        Ok(())
    }
}
