//! External command execution.
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::from_slice(&["notify-bus", "--topic", "fs"])
//!     .stdin(payload)
//!     .run()?;
//! ```

use std::{
    ffi::{OsStr, OsString},
    io::{ErrorKind, Write},
    process::{Command, Output, Stdio},
};

/// Command builder for external process execution.
#[derive(Debug, Default, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    stdin_data: Option<Vec<u8>>,
}

impl Cmd {
    /// Create from a command array (e.g., `["logger"]` or `["aws", "events", "put-events"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Data written to the child's stdin before waiting on it.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit status is not an error here; inspect `Output::status`.
    /// A child that exits without reading all of stdin is still waited on.
    pub fn run(&self) -> std::io::Result<Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(if self.stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let written = match (&self.stdin_data, child.stdin.take()) {
            // stdin is dropped at the end of the arm so the child sees EOF.
            (Some(data), Some(mut stdin)) => match stdin.write_all(data) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            },
            _ => Ok(()),
        };

        let output = child.wait_with_output()?;
        written.map(|()| output)
    }
}
