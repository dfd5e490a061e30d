//! Normalized event vocabulary handed to delivery sinks.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// The five stable event labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventLabel {
    #[serde(rename = "added")]
    Added,
    #[serde(rename = "changed")]
    Changed,
    #[serde(rename = "removed")]
    Removed,
    #[serde(rename = "directory added")]
    DirectoryAdded,
    #[serde(rename = "directory removed")]
    DirectoryRemoved,
}

impl EventLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
            Self::DirectoryAdded => "directory added",
            Self::DirectoryRemoved => "directory removed",
        }
    }

    pub const fn is_directory(self) -> bool {
        matches!(self, Self::DirectoryAdded | Self::DirectoryRemoved)
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change ready for delivery: `{ path, event, build? }`.
///
/// Immutable once constructed; each instance is consumed by exactly one
/// `Sink::deliver` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    path: String,
    event: EventLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<String>,
}

impl NormalizedEvent {
    pub fn new(path: &Path, event: EventLabel, build: Option<String>) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            event,
            build,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn label(&self) -> EventLabel {
        self.event
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} was {}", self.path, self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let event = NormalizedEvent::new(Path::new("/srv/foo.txt"), EventLabel::Added, None);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"path":"/srv/foo.txt","event":"added"}"#
        );
    }

    #[test]
    fn test_event_shape_with_build() {
        let event = NormalizedEvent::new(
            Path::new("/srv/sub"),
            EventLabel::DirectoryRemoved,
            Some("b7".into()),
        );
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"path":"/srv/sub","event":"directory removed","build":"b7"}"#
        );
    }

    #[test]
    fn test_label_text_matches_serialized() {
        for label in [
            EventLabel::Added,
            EventLabel::Changed,
            EventLabel::Removed,
            EventLabel::DirectoryAdded,
            EventLabel::DirectoryRemoved,
        ] {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
        }
    }

    #[test]
    fn test_display() {
        let event = NormalizedEvent::new(Path::new("/srv/a"), EventLabel::Changed, None);
        assert_eq!(event.to_string(), "/srv/a was changed");
    }
}
