//! Error reporting boundary.
//!
//! Every component failure (watch errors, delivery failures, unexpected
//! termination) is funneled through one [`Reporter`]. How reports leave the
//! process is the reporter's business; the pipeline only calls it.

use serde_json::{Map, Value, json};

/// Environment variable naming this host in reports
pub const ENV_SERVER: &str = "SERVER_NAME";

/// Narrow error-reporting interface.
pub trait Reporter: Send + Sync {
    /// Report a failure with optional structured context.
    fn report(&self, message: &str, context: Option<&Value>);

    /// Report a non-fatal condition worth an operator's attention.
    fn warn(&self, message: &str) {
        crate::log!("warn"; "{}", message);
    }
}

/// Correlation tags attached to every report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    pub server: String,
    pub build: String,
}

impl Tags {
    pub fn new(server: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            build: build.into(),
        }
    }

    /// Tags from `SERVER_NAME` and the configured build, defaulting to `local`.
    pub fn from_env(build: Option<&str>) -> Self {
        let server = std::env::var(ENV_SERVER)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "local".to_string());
        Self::new(server, build.unwrap_or("local"))
    }
}

/// Reporter writing `[error] message {json}` lines to stderr.
#[derive(Debug, Clone)]
pub struct LogReporter {
    tags: Tags,
}

impl LogReporter {
    pub fn new(tags: Tags) -> Self {
        Self { tags }
    }

    /// Structured payload: level, tags, and the caller's context as `extras`.
    fn payload(&self, context: Option<&Value>) -> Value {
        let mut payload = Map::new();
        payload.insert("level".into(), json!("error"));
        payload.insert(
            "tags".into(),
            json!({ "server": self.tags.server, "build": self.tags.build }),
        );
        if let Some(context) = context {
            payload.insert("extras".into(), context.clone());
        }
        Value::Object(payload)
    }
}

impl Reporter for LogReporter {
    fn report(&self, message: &str, context: Option<&Value>) {
        crate::log!("error"; "{} {}", message, self.payload(context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_context() {
        let reporter = LogReporter::new(Tags::new("web-1", "b9"));
        assert_eq!(
            reporter.payload(None).to_string(),
            r#"{"level":"error","tags":{"server":"web-1","build":"b9"}}"#
        );
    }

    #[test]
    fn test_payload_with_context() {
        let reporter = LogReporter::new(Tags::new("web-1", "local"));
        let context = json!({ "path": "/srv/a", "error": "broken pipe" });
        let payload = reporter.payload(Some(&context));
        assert_eq!(payload["extras"]["path"], "/srv/a");
        assert_eq!(payload["tags"]["build"], "local");
    }

    #[test]
    fn test_tags_default_build() {
        let tags = Tags::from_env(None);
        assert_eq!(tags.build, "local");
        let tags = Tags::from_env(Some("b1"));
        assert_eq!(tags.build, "b1");
    }
}
