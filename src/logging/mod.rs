//! Structured request logging
//!
//! This module provides the platform's structured logger: JSON entries in
//! production, a colorized single-line rendering in development, with
//! correlation identifiers stamped from the ambient request context and
//! sensitive data redacted before anything reaches a sink.
//!
//! Process-level diagnostics (startup, shutdown, store internals) go
//! through `tracing` as usual; this logger is for the per-request
//! observability pipeline.

pub mod redact;
pub mod writer;

use crate::config::{Environment, Settings};
use crate::context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write as _;
use std::sync::{Arc, Mutex};

pub use redact::redact;
pub use writer::SizeBasedRollingWriter;

// ============================================================================
// Levels
// ============================================================================

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Error and fatal entries route to the error stream
    pub fn is_error(self) -> bool {
        self >= LogLevel::Error
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Captured error descriptor for a log entry
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// Only emitted outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Capture a typed error's name and message
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::new(name, err.to_string())
    }

    /// Capture an `anyhow` error with its cause chain as the stack
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            name: "Error".to_string(),
            message: err.to_string(),
            stack: Some(format!("{err:?}")),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// What a call site attaches to an entry.
///
/// Callers pick the variant explicitly instead of the logger guessing from
/// argument types at runtime.
#[derive(Debug, Clone)]
pub enum LogPayload {
    None,
    Data(Value),
    Err(ErrorInfo),
    Both { data: Value, error: ErrorInfo },
}

impl From<()> for LogPayload {
    fn from(_: ()) -> Self {
        LogPayload::None
    }
}

impl From<Value> for LogPayload {
    fn from(data: Value) -> Self {
        LogPayload::Data(data)
    }
}

impl From<ErrorInfo> for LogPayload {
    fn from(error: ErrorInfo) -> Self {
        LogPayload::Err(error)
    }
}

impl From<(Value, ErrorInfo)> for LogPayload {
    fn from((data, error): (Value, ErrorInfo)) -> Self {
        LogPayload::Both { data, error }
    }
}

impl LogPayload {
    fn into_parts(self) -> (Option<Value>, Option<ErrorInfo>) {
        match self {
            LogPayload::None => (None, None),
            LogPayload::Data(data) => (Some(data), None),
            LogPayload::Err(error) => (None, Some(error)),
            LogPayload::Both { data, error } => (Some(data), Some(error)),
        }
    }
}

// ============================================================================
// Entry
// ============================================================================

/// One emitted log record
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub service: String,
    pub environment: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for formatted entries.
///
/// Implementations must never panic; a sink that cannot write drops the
/// line rather than failing the caller's request.
pub trait LogSink: Send + Sync {
    fn write_line(&self, level: LogLevel, line: &str);
}

/// Default sink: error/fatal to stderr, everything else to stdout, with an
/// optional copy of every line into a rolling log file.
pub struct StdStreamSink {
    file: Option<Mutex<SizeBasedRollingWriter>>,
}

impl StdStreamSink {
    pub fn new() -> Self {
        Self { file: None }
    }

    pub fn with_file(writer: SizeBasedRollingWriter) -> Self {
        Self {
            file: Some(Mutex::new(writer)),
        }
    }
}

impl Default for StdStreamSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdStreamSink {
    fn write_line(&self, level: LogLevel, line: &str) {
        if level.is_error() {
            let _ = writeln!(std::io::stderr().lock(), "{line}");
        } else {
            let _ = writeln!(std::io::stdout().lock(), "{line}");
        }

        if let Some(file) = &self.file {
            if let Ok(mut writer) = file.lock() {
                let _ = writeln!(writer, "{line}");
            }
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

struct LoggerInner {
    service: String,
    environment: Environment,
    min_level: LogLevel,
    sink: Arc<dyn LogSink>,
}

/// The structured, redacting logger.
///
/// Cheaply cloneable; constructed once at startup and injected into every
/// component that needs it.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
    /// Fields merged under every entry's data (child loggers)
    fixed: Option<Arc<serde_json::Map<String, Value>>>,
}

impl Logger {
    /// Build the logger for the given settings, writing to std streams
    pub fn new(settings: &Settings) -> Self {
        Self::with_sink(settings, Arc::new(StdStreamSink::new()))
    }

    /// Build the logger with an explicit sink
    pub fn with_sink(settings: &Settings, sink: Arc<dyn LogSink>) -> Self {
        // Production keeps the noise floor at info; everywhere else debug
        let min_level = if settings.is_production() {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };

        Self {
            inner: Arc::new(LoggerInner {
                service: settings.app_name.clone(),
                environment: settings.environment,
                min_level,
                sink,
            }),
            fixed: None,
        }
    }

    /// Derive a logger that stamps `fixed_fields` under every entry's data.
    ///
    /// Caller-supplied data wins on key collisions. Non-object fixed
    /// values are ignored; fixed fields only make sense as a map.
    pub fn child(&self, fixed_fields: Value) -> Logger {
        let mut merged = self
            .fixed
            .as_deref()
            .cloned()
            .unwrap_or_default();
        if let Value::Object(map) = fixed_fields {
            for (k, v) in map {
                merged.insert(k, v);
            }
        }

        Logger {
            inner: Arc::clone(&self.inner),
            fixed: Some(Arc::new(merged)),
        }
    }

    pub fn trace(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Trace, event, payload.into());
    }

    pub fn debug(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Debug, event, payload.into());
    }

    pub fn info(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Info, event, payload.into());
    }

    pub fn warn(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Warn, event, payload.into());
    }

    pub fn error(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Error, event, payload.into());
    }

    pub fn fatal(&self, event: &str, payload: impl Into<LogPayload>) {
        self.log(LogLevel::Fatal, event, payload.into());
    }

    /// Emit one entry. Infallible from the caller's perspective: a
    /// serialization failure degrades to a plain fallback line.
    pub fn log(&self, level: LogLevel, event: &str, payload: LogPayload) {
        if level < self.inner.min_level {
            return;
        }

        let entry = self.format_entry(level, event, payload);

        let line = if self.inner.environment == Environment::Production {
            match serde_json::to_string(&entry) {
                Ok(json) => json,
                Err(_) => format!(
                    r#"{{"timestamp":"{}","level":"{}","service":"{}","event":"logger.serialize_failed","data":{{"original_event":"{}"}}}}"#,
                    entry.timestamp,
                    level.as_str(),
                    self.inner.service,
                    event
                ),
            }
        } else {
            dev_render(&entry)
        };

        self.inner.sink.write_line(level, &line);
    }

    /// Assemble the redacted entry. Exposed to the crate so tests can
    /// assert on entries without parsing sink output.
    pub(crate) fn format_entry(
        &self,
        level: LogLevel,
        event: &str,
        payload: LogPayload,
    ) -> LogEntry {
        let ctx = context::current();
        let (data, mut error) = payload.into_parts();

        let data = self.merge_fixed(data).map(|d| redact(&d));

        // Stack traces stay out of persistent production logs
        if self.inner.environment == Environment::Production {
            if let Some(err) = error.as_mut() {
                err.stack = None;
            }
        }

        LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            service: self.inner.service.clone(),
            environment: self.inner.environment.to_string(),
            event: event.to_string(),
            request_id: ctx.request_id,
            trace_id: ctx.trace_id,
            span_id: ctx.span_id,
            user_id: ctx.user_id,
            data,
            error,
        }
    }

    fn merge_fixed(&self, data: Option<Value>) -> Option<Value> {
        let Some(fixed) = self.fixed.as_deref() else {
            return data;
        };
        if fixed.is_empty() {
            return data;
        }

        let mut merged = fixed.clone();
        match data {
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    merged.insert(k, v);
                }
            }
            Some(other) => {
                merged.insert("value".to_string(), other);
            }
            None => {}
        }
        Some(Value::Object(merged))
    }
}

// ============================================================================
// Development rendering
// ============================================================================

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_DIM: &str = "\x1b[90m";

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "\x1b[90m",
        LogLevel::Debug => "\x1b[36m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Fatal => "\x1b[35m",
    }
}

/// Human-readable single-line rendering for local development.
///
/// The entry is already redacted; this only changes presentation.
fn dev_render(entry: &LogEntry) -> String {
    let time = entry
        .timestamp
        .get(11..19)
        .unwrap_or(entry.timestamp.as_str());
    let color = level_color(entry.level);

    let mut line = format!(
        "{color}[{time}] {:<5}{ANSI_RESET} {}",
        entry.level.as_str(),
        entry.event
    );

    if let Some(rid) = &entry.request_id {
        let short: String = rid.chars().take(12).collect();
        line.push_str(&format!(" {ANSI_DIM}rid={short}{ANSI_RESET}"));
    }

    if let Some(data) = &entry.data {
        let rendered = data.to_string();
        if rendered.len() < 200 {
            line.push_str(&format!(" {ANSI_DIM}{rendered}{ANSI_RESET}"));
        }
    }

    if let Some(err) = &entry.error {
        line.push_str(&format!(
            "\n  \x1b[31m{}: {}{ANSI_RESET}",
            err.name, err.message
        ));
        if let Some(stack) = &err.stack {
            for frame in stack.lines().skip(1).take(3) {
                line.push('\n');
                line.push_str(frame);
            }
        }
    }

    line
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Sink capturing (level, line) pairs for assertions
    #[derive(Default)]
    pub struct CaptureSink {
        pub lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl LogSink for CaptureSink {
        fn write_line(&self, level: LogLevel, line: &str) {
            self.lines
                .lock()
                .expect("capture sink")
                .push((level, line.to_string()));
        }
    }
}
