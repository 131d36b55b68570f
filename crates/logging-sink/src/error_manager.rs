//! crates/logging-sink/src/error_manager.rs
//! Out-of-band reporting of handler failures.
//!
//! Handlers never propagate errors to the code that logged a record. Instead
//! every failure (a file that cannot be opened, a broken socket, a missing
//! named handler) is handed to an [`ErrorManager`]. The default
//! [`OnlyOnceErrorManager`] forwards each distinct failure a single time so a
//! persistently broken sink cannot flood the diagnostic stream.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Category of a handler failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failure that fits no other category.
    Generic,
    /// Writing a record failed.
    Write,
    /// Flushing a handler failed.
    Flush,
    /// Closing a handler failed.
    Close,
    /// Opening a destination (file, socket) failed.
    Open,
    /// Formatting a record failed.
    Format,
}

impl ErrorCode {
    /// Returns the conventional upper-case name of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "GENERIC_FAILURE",
            Self::Write => "WRITE_FAILURE",
            Self::Flush => "FLUSH_FAILURE",
            Self::Close => "CLOSE_FAILURE",
            Self::Open => "OPEN_FAILURE",
            Self::Format => "FORMAT_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives handler-internal failures.
pub trait ErrorManager: Send + Sync {
    /// Reports a failure. Implementations must not panic.
    fn error(&self, message: &str, source: Option<&(dyn Error + 'static)>, code: ErrorCode);
}

/// Shared error manager handle.
pub type SharedErrorManager = Arc<dyn ErrorManager>;

/// A failure as delivered to a report sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    /// Failure category.
    pub code: ErrorCode,
    /// Human readable description.
    pub message: String,
    /// Rendered source error, if one was supplied.
    pub detail: Option<String>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogManager error of type {}: {}", self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n{detail}")?;
        }
        Ok(())
    }
}

/// Destination of reports accepted by [`OnlyOnceErrorManager`].
pub type ReportSink = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Error manager that forwards each distinct failure once.
///
/// Two reports are the same failure when their [`ErrorCode`] and message are
/// equal; the source error is not part of the key.
pub struct OnlyOnceErrorManager {
    seen: Mutex<HashSet<(ErrorCode, String)>>,
    sink: ReportSink,
}

impl OnlyOnceErrorManager {
    /// Creates a manager that writes reports to standard error.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(|report: &ErrorReport| {
            let _ = writeln!(io::stderr().lock(), "{report}");
        }))
    }

    /// Creates a manager that forwards reports to `sink`.
    pub fn with_sink(sink: ReportSink) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            sink,
        }
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared() -> SharedErrorManager {
        Arc::new(Self::new())
    }
}

impl Default for OnlyOnceErrorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorManager for OnlyOnceErrorManager {
    fn error(&self, message: &str, source: Option<&(dyn Error + 'static)>, code: ErrorCode) {
        let first = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((code, message.to_owned()));
        if first {
            let report = ErrorReport {
                code,
                message: message.to_owned(),
                detail: source.map(ToString::to_string),
            };
            (self.sink)(&report);
        }
    }
}

impl fmt::Debug for OnlyOnceErrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seen = self.seen.lock().map_or(0, |seen| seen.len());
        f.debug_struct("OnlyOnceErrorManager")
            .field("reported", &seen)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting() -> (OnlyOnceErrorManager, Arc<Mutex<Vec<ErrorReport>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink_reports = Arc::clone(&reports);
        let manager = OnlyOnceErrorManager::with_sink(Arc::new(move |report: &ErrorReport| {
            sink_reports.lock().unwrap().push(report.clone());
        }));
        (manager, reports)
    }

    #[test]
    fn repeated_failures_are_reported_once() {
        let (manager, reports) = collecting();
        for _ in 0..5 {
            manager.error("socket closed", None, ErrorCode::Write);
        }
        assert_eq!(reports.lock().unwrap().len(), 1);
    }

    #[test]
    fn distinct_failures_are_each_reported() {
        let (manager, reports) = collecting();
        manager.error("socket closed", None, ErrorCode::Write);
        manager.error("socket closed", None, ErrorCode::Flush);
        manager.error("file missing", None, ErrorCode::Open);
        assert_eq!(reports.lock().unwrap().len(), 3);
    }

    #[test]
    fn report_carries_source_detail() {
        let (manager, reports) = collecting();
        let source = io::Error::new(io::ErrorKind::NotFound, "no such file");
        manager.error("Failed to set log file", Some(&source), ErrorCode::Open);

        let reports = reports.lock().unwrap();
        assert_eq!(reports[0].detail.as_deref(), Some("no such file"));
        assert_eq!(
            reports[0].to_string(),
            "LogManager error of type OPEN_FAILURE: Failed to set log file\nno such file"
        );
    }
}
