//! Watcher configuration management.
//!
//! The configuration file is JSON unless its extension is `.toml`.
//!
//! ```json
//! {
//!   "watches": ["/etc", "~/deploy"],
//!   "depth": 1,
//!   "follow_symlinks": true,
//!   "atomic_ms": 100,
//!   "await_write_finish": false,
//!   "write_stability_ms": 2000,
//!   "write_poll_ms": 100,
//!   "strict": false,
//!   "build": "2024.10.1",
//!   "sink": { "kind": "stdout" }
//! }
//! ```
//!
//! | Field                | Purpose                                                  |
//! |----------------------|----------------------------------------------------------|
//! | `watches`            | Directories to monitor (required, non-empty)             |
//! | `depth`              | Subdirectory levels below each target that are observed  |
//! | `follow_symlinks`    | Descend into symlinked directories                       |
//! | `atomic_ms`          | Window merging delete + recreate into `changed` (0: off) |
//! | `await_write_finish` | Hold add/change until the file size settles              |
//! | `strict`             | Treat any missing target as fatal                        |
//! | `build`              | Correlation tag attached to events (`SERVER_BUILD`)      |
//! | `sink`               | Delivery target, see [`SinkConfig`]                      |

mod error;
mod sink;

pub use error::ConfigError;
pub use sink::SinkConfig;

use crate::log;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Environment variable providing the default build tag
pub const ENV_BUILD: &str = "SERVER_BUILD";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directories to watch
    pub watches: Vec<PathBuf>,

    /// Subdirectory levels observed below each target
    pub depth: usize,

    /// Descend into symlinked directories
    pub follow_symlinks: bool,

    /// Atomic-save coalescing window in milliseconds (0 disables)
    pub atomic_ms: u64,

    /// Hold `added`/`changed` until the file size is stable
    pub await_write_finish: bool,

    /// How long the size must stay unchanged (milliseconds)
    pub write_stability_ms: u64,

    /// Size polling interval while awaiting write finish (milliseconds)
    pub write_poll_ms: u64,

    /// Any missing target aborts startup
    pub strict: bool,

    /// Build identifier attached to every event
    pub build: Option<String>,

    /// Delivery target
    pub sink: SinkConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            watches: Vec::new(),
            depth: 1,
            follow_symlinks: true,
            atomic_ms: 100,
            await_write_finish: false,
            write_stability_ms: 2000,
            write_poll_ms: 100,
            strict: false,
            build: None,
            sink: SinkConfig::default(),
        }
    }
}

/// On-disk format of the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension (JSON unless `.toml`).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

impl WatchConfig {
    /// Load, normalize and validate the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content, ConfigFormat::from_path(path))?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
        config.finalize(std::env::var(ENV_BUILD).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse content, collecting any unknown fields.
    pub fn parse_with_ignored(
        content: &str,
        format: ConfigFormat,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let config = match format {
            ConfigFormat::Json => {
                let mut deserializer = serde_json::Deserializer::from_str(content);
                let config = serde_ignored::deserialize(&mut deserializer, |path| {
                    ignored.push(path.to_string());
                })?;
                deserializer.end()?;
                config
            }
            ConfigFormat::Toml => {
                let deserializer = toml::Deserializer::new(content);
                serde_ignored::deserialize(deserializer, |path| {
                    ignored.push(path.to_string());
                })?
            }
        };
        Ok((config, ignored))
    }

    /// Resolve watch paths and fill in the build tag.
    ///
    /// Watch paths get `~` expanded; relative paths are taken relative to
    /// the directory holding the config file.
    pub fn finalize(&mut self, env_build: Option<String>) {
        let base = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.watches = self
            .watches
            .iter()
            .map(|path| {
                let expanded = PathBuf::from(
                    shellexpand::tilde(&path.to_string_lossy()).into_owned(),
                );
                if expanded.is_absolute() {
                    expanded
                } else {
                    base.join(expanded)
                }
            })
            .collect();

        if self.build.as_deref().is_none_or(str::is_empty) {
            self.build = env_build.filter(|b| !b.is_empty());
        }
    }

    /// Reject configurations the watcher cannot start from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watches.is_empty() {
            return Err(ConfigError::Validation(
                "invalid 'watches' property, it must be a non-empty array of directories".into(),
            ));
        }
        if self.await_write_finish && self.write_poll_ms == 0 {
            return Err(ConfigError::Validation(
                "'write_poll_ms' must be greater than 0 when 'await_write_finish' is set".into(),
            ));
        }
        if let SinkConfig::Command { command } = &self.sink
            && command.first().is_none_or(|program| program.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "'sink.command' must name a program to run".into(),
            ));
        }
        Ok(())
    }

    /// Watch settings handed to the watch session.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            depth: self.depth,
            follow_symlinks: self.follow_symlinks,
            atomic: Duration::from_millis(self.atomic_ms),
            write_stability: self.await_write_finish.then(|| WriteStability {
                threshold: Duration::from_millis(self.write_stability_ms),
                poll: Duration::from_millis(self.write_poll_ms),
            }),
        }
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        log!("warn"; "unknown fields in {}, ignoring:", path.display());
        for field in fields {
            eprintln!("- {}", field);
        }
    }
}

// ============================================================================
// watch options
// ============================================================================

/// Explicit watch behavior, resolved from [`WatchConfig`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Subdirectory levels observed below each target root
    pub depth: usize,
    /// Descend into symlinked directories
    pub follow_symlinks: bool,
    /// Delete + recreate coalescing window (zero disables)
    pub atomic: Duration,
    /// Hold writes until the file size settles
    pub write_stability: Option<WriteStability>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchConfig::default().watch_options()
    }
}

/// Await-write-finish parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStability {
    /// How long the size must stay unchanged
    pub threshold: Duration,
    /// How often the size is sampled
    pub poll: Duration,
}

// ============================================================================
// tests
// ============================================================================
