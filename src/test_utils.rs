//! Test doubles shared across modules.

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::NormalizedEvent;
use crate::report::Reporter;
use crate::sink::{Sink, SinkError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    #[default]
    Record,
    Fail,
    Panic,
}

/// Sink keeping every delivered event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NormalizedEvent>>,
    behavior: Behavior,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            behavior: Behavior::Panic,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<NormalizedEvent> {
        self.events.lock().clone()
    }
}

impl Sink for RecordingSink {
    async fn deliver(&self, event: NormalizedEvent) -> Result<(), SinkError> {
        match self.behavior {
            Behavior::Record => {
                self.events.lock().push(event);
                Ok(())
            }
            Behavior::Fail => Err(SinkError::Task("rejected by test sink".into())),
            Behavior::Panic => panic!("test sink exploded"),
        }
    }
}

/// Reporter keeping reports and warnings in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, Option<Value>)>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, Option<Value>)> {
        self.reports.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, message: &str, context: Option<&Value>) {
        self.reports
            .lock()
            .push((message.to_string(), context.cloned()));
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}
