// log.rs — Per-build debug transcript.
//
// A build writes its progress to a BuildLog. With debug off the log is a
// no-op and the outcome carries no transcript; with debug on every line is
// buffered and returned with the outcome, on success and failure alike.

use std::fmt;

use chrono::{SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for the lines of one build's transcript.
///
/// Each build owns its log; nothing is shared between concurrent builds.
pub trait BuildLog: Send {
    fn record(&mut self, level: LogLevel, message: &str);

    /// The collected transcript, or None when nothing is collected.
    fn transcript(&self) -> Option<String>;

    fn debug(&mut self, message: &str) {
        self.record(LogLevel::Debug, message);
    }

    fn info(&mut self, message: &str) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&mut self, message: &str) {
        self.record(LogLevel::Warn, message);
    }

    fn error(&mut self, message: &str) {
        self.record(LogLevel::Error, message);
    }
}

/// Discards every line.
#[derive(Debug, Default)]
pub struct NoopLog;

impl BuildLog for NoopLog {
    fn record(&mut self, _level: LogLevel, _message: &str) {}

    fn transcript(&self) -> Option<String> {
        None
    }
}

/// Keeps timestamped lines in memory.
#[derive(Debug, Default)]
pub struct BufferedLog {
    lines: Vec<String>,
}

impl BufferedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl BuildLog for BufferedLog {
    fn record(&mut self, level: LogLevel, message: &str) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.lines.push(format!("{} [{}] {}", ts, level, message));
    }

    fn transcript(&self) -> Option<String> {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Some(out)
    }
}

/// The log a build should use for the given debug flag.
pub fn sink_for(debug: bool) -> Box<dyn BuildLog> {
    if debug {
        Box::new(BufferedLog::new())
    } else {
        Box::new(NoopLog)
    }
}
