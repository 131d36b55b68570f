//! crates/logging-sink/src/record.rs
//! The structured log record that flows from categories into handlers.

use std::fmt;
use std::thread;

use time::OffsetDateTime;

use crate::level::Level;

/// A single log event.
///
/// Records are created by the producer thread and handed to every handler by
/// reference. Handlers that need to keep a record beyond the `publish` call
/// (the asynchronous wrapper and the delayed buffer) clone it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    level: Level,
    category: String,
    message: String,
    timestamp: OffsetDateTime,
    thread: String,
    thrown: Option<String>,
}

impl Record {
    /// Creates a record stamped with the current time and thread.
    pub fn new(level: Level, category: impl Into<String>, message: impl Into<String>) -> Self {
        let current = thread::current();
        let thread = current
            .name()
            .map_or_else(|| format!("{:?}", current.id()), str::to_owned);
        Self {
            level,
            category: category.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
            thread,
            thrown: None,
        }
    }

    /// Attaches the rendered form of an error to the record.
    #[must_use]
    pub fn with_thrown(mut self, error: impl fmt::Display) -> Self {
        self.thrown = Some(error.to_string());
        self
    }

    /// Overrides the record timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Overrides the thread name.
    #[must_use]
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = thread.into();
        self
    }

    /// Returns the record severity.
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Returns the category the record was logged under.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the raw message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns when the record was created.
    pub const fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Returns the name of the producing thread.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// Returns the attached error text, if any.
    pub fn thrown(&self) -> Option<&str> {
        self.thrown.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_captures_thread_name() {
        let record = thread::Builder::new()
            .name("worker-7".to_owned())
            .spawn(|| Record::new(Level::Info, "io.app", "hello"))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(record.thread(), "worker-7");
        assert_eq!(record.category(), "io.app");
        assert_eq!(record.message(), "hello");
        assert!(record.thrown().is_none());
    }

    #[test]
    fn with_thrown_renders_error() {
        let error = std::io::Error::other("disk on fire");
        let record = Record::new(Level::Error, "io.app", "failed").with_thrown(&error);
        assert_eq!(record.thrown(), Some("disk on fire"));
    }
}
