use std::fmt;
use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter};

pub const DEFAULT_TARGET: &str = "w65c02";

/// Sink for the CPU's textual diagnostics (register dumps, memory dumps, traces).
///
/// The CPU owns one sink, handed to it at construction, and never touches a
/// global logger directly.
pub trait Diagnostics: fmt::Debug + Send {
    fn enabled(&self, level: Level) -> bool;

    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn trace(&self, message: &str) {
        self.log(Level::Trace, message);
    }
}

/// Forwards to the `log` facade under a fixed target.
#[derive(Debug, Clone)]
pub struct LogDiagnostics {
    target: String,
    max_level: LevelFilter,
}

impl LogDiagnostics {
    pub fn new(target: impl Into<String>, max_level: LevelFilter) -> Self {
        LogDiagnostics {
            target: target.into(),
            max_level,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        LogDiagnostics::new(DEFAULT_TARGET, LevelFilter::Trace)
    }
}

impl Diagnostics for LogDiagnostics {
    fn enabled(&self, level: Level) -> bool {
        level <= self.max_level && log::log_enabled!(target: self.target.as_str(), level)
    }

    fn log(&self, level: Level, message: &str) {
        if level <= self.max_level {
            log::log!(target: self.target.as_str(), level, "{}", message);
        }
    }
}

/// Keeps every message in memory. Clones share the same buffer, so a test can
/// hand one clone to the CPU and read the other.
#[derive(Debug, Clone)]
pub struct CapturedDiagnostics {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
    max_level: LevelFilter,
}

impl CapturedDiagnostics {
    pub fn new() -> Self {
        Self::with_level(LevelFilter::Info)
    }

    pub fn with_level(max_level: LevelFilter) -> Self {
        CapturedDiagnostics {
            lines: Arc::new(Mutex::new(Vec::new())),
            max_level,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().map(|(_, line)| line.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, line)| line.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl Default for CapturedDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for CapturedDiagnostics {
    fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    fn log(&self, level: Level, message: &str) {
        if !self.enabled(level) {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_shares_buffer() {
        let sink = CapturedDiagnostics::new();
        let handle = sink.clone();
        sink.info("Register Dump #1");
        sink.warn("unknown command");
        assert_eq!(handle.messages(), vec!["Register Dump #1", "unknown command"]);
        assert_eq!(handle.messages_at(Level::Warn), vec!["unknown command"]);
        handle.clear();
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_captured_filters_by_level() {
        let sink = CapturedDiagnostics::with_level(LevelFilter::Info);
        sink.trace("PC=0600");
        assert!(sink.messages().is_empty());
        assert!(!sink.enabled(Level::Debug));
    }

    #[test]
    fn test_log_diagnostics_respects_max_level() {
        let sink = LogDiagnostics::new("cpu", LevelFilter::Off);
        assert!(!sink.enabled(Level::Error));
        assert_eq!(sink.target(), "cpu");
    }
}
