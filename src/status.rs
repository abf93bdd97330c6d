//! Leveled status messages for the person running the keylogger.
//!
//! Every component reports what it is doing through a [`StatusSink`]. The sink is passed in
//! explicitly, so it can be swapped for [`NullStatus`] to silence the output, or for
//! [`RecordingStatus`] to inspect it in tests.

use owo_colors::{OwoColorize, Style};
use std::fmt;
use std::sync::{Mutex, PoisonError};

const PREFIX_PAD_BEFORE: usize = 5;
const PREFIX_MARKER: &str = "\\___ ";
const PREFIX_PAD_AFTER: usize = 1;

/// The severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Plain output, e.g. a copy of a logged line.
    Normal,
    Info,
    Ok,
    Warning,
    Error,
    Fatal,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Normal => "NORMAL",
            Level::Info => "INFO",
            Level::Ok => "OK",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Render a status line, indenting it by `depth`.
///
/// Top-level messages look like `[INFO]: message`. Nested messages get an indent and a marker:
///
/// ```text
/// [INFO]: Validating /home/user/keylogs/keylog.txt
///      \___  [WARNING]: File does not exist
/// ```
pub fn format_status(level: Level, depth: usize, message: &str) -> String {
    if depth == 0 {
        return format!("[{level}]: {message}");
    }

    format!(
        "{}{PREFIX_MARKER}{}[{level}]: {message}",
        " ".repeat(PREFIX_PAD_BEFORE * depth),
        " ".repeat(PREFIX_PAD_AFTER * depth),
    )
}

/// A destination for status messages.
pub trait StatusSink: Send + Sync {
    fn emit(&self, level: Level, depth: usize, message: &str);

    fn print(&self, depth: usize, message: &str) {
        self.emit(Level::Normal, depth, message);
    }

    fn info(&self, depth: usize, message: &str) {
        self.emit(Level::Info, depth, message);
    }

    fn ok(&self, depth: usize, message: &str) {
        self.emit(Level::Ok, depth, message);
    }

    fn warn(&self, depth: usize, message: &str) {
        self.emit(Level::Warning, depth, message);
    }

    fn error(&self, depth: usize, message: &str) {
        self.emit(Level::Error, depth, message);
    }

    fn fatal(&self, depth: usize, message: &str) {
        self.emit(Level::Fatal, depth, message);
    }
}

/// Writes status lines to the terminal. Errors go to stderr, everything else to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleStatus {
    color: bool,
}

impl Default for ConsoleStatus {
    fn default() -> Self {
        Self { color: true }
    }
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors (for piped output).
    pub fn no_color() -> Self {
        Self { color: false }
    }

    fn style(level: Level) -> Style {
        match level {
            Level::Normal => Style::new(),
            Level::Info => Style::new().blue(),
            Level::Ok => Style::new().green(),
            Level::Warning => Style::new().yellow(),
            Level::Error => Style::new().red(),
            Level::Fatal => Style::new().bright_red().bold(),
        }
    }
}

impl StatusSink for ConsoleStatus {
    fn emit(&self, level: Level, depth: usize, message: &str) {
        let line = format_status(level, depth, message);
        let style = if self.color {
            Self::style(level)
        } else {
            Style::new()
        };

        if level >= Level::Error {
            eprintln!("{}", line.style(style));
        } else {
            println!("{}", line.style(style));
        }
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn emit(&self, _level: Level, _depth: usize, _message: &str) {}
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded messages (without indentation), oldest first.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.lock().clone()
    }

    /// The recorded messages of the given level.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn count(&self, level: Level) -> usize {
        self.lock().iter().filter(|(l, _)| *l == level).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusSink for RecordingStatus {
    fn emit(&self, level: Level, _depth: usize, message: &str) {
        self.lock().push((level, message.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_lines_have_no_indent() {
        assert_eq!(
            format_status(Level::Info, 0, "Starting keyboard listener"),
            "[INFO]: Starting keyboard listener"
        );
    }

    #[test]
    fn nested_lines_are_indented_by_depth() {
        assert_eq!(
            format_status(Level::Warning, 1, "File exists"),
            "     \\___  [WARNING]: File exists"
        );
        assert_eq!(
            format_status(Level::Info, 2, "Consider enabling overwrite"),
            "          \\___   [INFO]: Consider enabling overwrite"
        );
    }

    #[test]
    fn recording_status_keeps_order_and_levels() {
        let status = RecordingStatus::new();
        status.info(0, "one");
        status.error(1, "two");
        status.error(0, "three");

        assert_eq!(
            status.entries(),
            vec![
                (Level::Info, "one".to_owned()),
                (Level::Error, "two".to_owned()),
                (Level::Error, "three".to_owned()),
            ]
        );
        assert_eq!(status.count(Level::Error), 2);
        assert_eq!(status.messages(Level::Info), vec!["one".to_owned()]);
    }
}
