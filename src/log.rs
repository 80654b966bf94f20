//! Cumulative message log
//!
//! Loading, index building and search report progress and problems here
//! instead of returning early. Every message is kept in a cache with its
//! severity until the caller flushes it; messages are also forwarded to
//! `tracing` unless silenced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// How much of the log is forwarded to `tracing`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Silence {
    /// Forward everything
    #[default]
    Off,
    /// Suppress informational messages
    Terse,
    /// Suppress informational messages and warnings
    Deep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single logged message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub severity: Severity,
    pub level: usize,
    pub elapsed: Option<String>,
    pub text: String,
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = "   |   ".repeat(self.level);
        match &self.elapsed {
            Some(elapsed) => write!(f, "{}{:>7} {}", indent, elapsed, self.text),
            None => write!(f, "{}{}", indent, self.text),
        }
    }
}

/// Message cache with severities, indentation and elapsed times
#[derive(Debug)]
pub struct MessageLog {
    messages: Vec<LogMessage>,
    silence: Silence,
    level: usize,
    started: Instant,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(Silence::Off)
    }
}

impl MessageLog {
    pub fn new(silence: Silence) -> Self {
        Self {
            messages: Vec::new(),
            silence,
            level: 0,
            started: Instant::now(),
        }
    }

    pub fn silence(&self) -> Silence {
        self.silence
    }

    pub fn set_silence(&mut self, silence: Silence) {
        self.silence = silence;
    }

    /// Set the indentation level; `reset` restarts the elapsed timer
    pub fn indent(&mut self, level: usize, reset: bool) {
        self.level = level;
        if reset {
            self.started = Instant::now();
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.record(Severity::Info, text.into(), true);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.record(Severity::Warning, text.into(), true);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.record(Severity::Error, text.into(), true);
    }

    /// Record without a time stamp
    pub fn note(&mut self, severity: Severity, text: impl Into<String>) {
        self.record(severity, text.into(), false);
    }

    fn record(&mut self, severity: Severity, text: String, timed: bool) {
        let forward = match (severity, self.silence) {
            (Severity::Error, _) => true,
            (Severity::Warning, Silence::Deep) => false,
            (Severity::Warning, _) => true,
            (Severity::Info, Silence::Off) => true,
            (Severity::Info, _) => false,
        };
        if forward {
            match severity {
                Severity::Info => tracing::info!(level = self.level, "{}", text),
                Severity::Warning => tracing::warn!(level = self.level, "{}", text),
                Severity::Error => tracing::error!(level = self.level, "{}", text),
            }
        }
        let elapsed = timed.then(|| elapsed_rep(self.started.elapsed().as_secs_f64()));
        self.messages.push(LogMessage {
            severity,
            level: self.level,
            elapsed,
            text,
        });
    }

    pub fn messages(&self) -> &[LogMessage] {
        &self.messages
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }

    /// Messages of at least the given severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &LogMessage> {
        self.messages.iter().filter(move |m| m.severity >= severity)
    }

    /// Drain the cache
    pub fn flush(&mut self) -> Vec<LogMessage> {
        std::mem::take(&mut self.messages)
    }

    /// The cached messages as text, one per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(&message.to_string());
            out.push('\n');
        }
        out
    }
}

/// Human readable elapsed time: `0.42s`, `12s`, `3m 04s`, `1h 02m 03s`
pub fn elapsed_rep(seconds: f64) -> String {
    if seconds < 10.0 {
        return format!("{:.2}s", seconds);
    }
    let total = seconds.round() as u64;
    if total < 60 {
        return format!("{}s", total);
    }
    if total < 3600 {
        return format!("{}m {:02}s", total / 60, total % 60);
    }
    format!(
        "{}h {:02}m {:02}s",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
