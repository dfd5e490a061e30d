//! Logging utilities with colored module prefixes.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro for output only shown with `--verbose`
//!
//! Only the `sink` module writes to stdout, next to the JSON lines of the
//! stdout sink. Every other module goes to stderr.
//!
//! # Example
//!
//! ```ignore
//! log!("watch"; "{} was {}", path.display(), label);
//! debug!("watch"; "raw notify: {:?}", event.kind);
//! ```

use owo_colors::OwoColorize;
use std::{
    io::{Write, stderr, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    if is_output(&module_lower) {
        let mut stdout = stdout().lock();
        writeln!(stdout, "{prefix} {message}").ok();
        stdout.flush().ok();
    } else {
        let mut stderr = stderr().lock();
        writeln!(stderr, "{prefix} {message}").ok();
        stderr.flush().ok();
    }
}

/// Modules whose output belongs on stdout
#[inline]
fn is_output(module_lower: &str) -> bool {
    module_lower == "sink"
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "watch" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warn" | "warning" => prefix.bright_yellow().bold().to_string(),
        "sink" => prefix.bright_cyan().bold().to_string(),
        _ => prefix.bright_blue().bold().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_contains_module() {
        assert!(colorize_prefix("watch", "watch").contains("[watch]"));
        assert!(colorize_prefix("Error", "error").contains("[Error]"));
    }

    #[test]
    fn test_only_sink_output_goes_to_stdout() {
        assert!(is_output("sink"));
        for module in ["watch", "error", "warn", "config"] {
            assert!(!is_output(module), "{module}");
        }
    }
}
