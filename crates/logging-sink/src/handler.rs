//! crates/logging-sink/src/handler.rs
//! The handler contract shared by every sink.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error_manager::{ErrorCode, OnlyOnceErrorManager, SharedErrorManager};
use crate::filter::SharedFilter;
use crate::formatter::{PatternFormatter, SharedFormatter};
use crate::level::Level;
use crate::record::Record;

/// Pattern used when a handler is built without an explicit format.
pub const DEFAULT_FORMAT: &str = "%d{yyyy-MM-dd HH:mm:ss,SSS} %-5p [%c] (%t) %s%e%n";

/// A destination for log records.
///
/// Handlers are shared as [`SharedHandler`] between the root list, the named
/// handler map and any number of categories, so every setter takes `&self`.
/// `publish`, `flush` and `close` never fail: problems go to the handler's
/// [`ErrorManager`](crate::ErrorManager).
pub trait Handler: Send + Sync {
    /// Returns the state common to all handlers.
    fn core(&self) -> &HandlerCore;

    /// Formats and writes `record` if it passes the level and filter checks.
    fn publish(&self, record: &Record);

    /// Flushes buffered output.
    fn flush(&self);

    /// Flushes and releases the destination. Calling it twice is harmless.
    fn close(&self);

    /// Short name of the handler kind, used in diagnostics.
    fn kind(&self) -> &'static str {
        "custom"
    }

    /// Returns the minimum level accepted by the handler.
    fn level(&self) -> Level {
        self.core().level()
    }

    /// Changes the minimum level.
    fn set_level(&self, level: Level) {
        self.core().set_level(level);
    }

    /// Returns the error manager.
    fn error_manager(&self) -> SharedErrorManager {
        self.core().error_manager()
    }

    /// Replaces the error manager.
    fn set_error_manager(&self, manager: SharedErrorManager) {
        self.core().set_error_manager(manager);
    }

    /// Returns the filter, if any.
    fn filter(&self) -> Option<SharedFilter> {
        self.core().filter()
    }

    /// Replaces the filter.
    fn set_filter(&self, filter: Option<SharedFilter>) {
        self.core().set_filter(filter);
    }

    /// Returns the formatter.
    fn formatter(&self) -> SharedFormatter {
        self.core().formatter()
    }

    /// Replaces the formatter.
    fn set_formatter(&self, formatter: SharedFormatter) {
        self.core().set_formatter(formatter);
    }

    /// Reports whether `record` would be published.
    fn is_loggable(&self, record: &Record) -> bool {
        self.core().is_loggable(record)
    }
}

/// Shared handler handle.
pub type SharedHandler = Arc<dyn Handler>;

/// Level, formatter, filter and error manager of a handler.
pub struct HandlerCore {
    level: RwLock<Level>,
    formatter: RwLock<SharedFormatter>,
    error_manager: RwLock<SharedErrorManager>,
    filter: RwLock<Option<SharedFilter>>,
    closed: AtomicBool,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl HandlerCore {
    /// Creates a core accepting every level, formatting with `formatter`.
    pub fn new(formatter: SharedFormatter) -> Self {
        Self {
            level: RwLock::new(Level::Trace),
            formatter: RwLock::new(formatter),
            error_manager: RwLock::new(OnlyOnceErrorManager::shared()),
            filter: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the minimum level.
    pub fn level(&self) -> Level {
        read(&self.level)
    }

    /// Changes the minimum level.
    pub fn set_level(&self, level: Level) {
        write(&self.level, level);
    }

    /// Returns the formatter.
    pub fn formatter(&self) -> SharedFormatter {
        read(&self.formatter)
    }

    /// Replaces the formatter.
    pub fn set_formatter(&self, formatter: SharedFormatter) {
        write(&self.formatter, formatter);
    }

    /// Returns the error manager.
    pub fn error_manager(&self) -> SharedErrorManager {
        read(&self.error_manager)
    }

    /// Replaces the error manager.
    pub fn set_error_manager(&self, manager: SharedErrorManager) {
        write(&self.error_manager, manager);
    }

    /// Returns the filter.
    pub fn filter(&self) -> Option<SharedFilter> {
        read(&self.filter)
    }

    /// Replaces the filter.
    pub fn set_filter(&self, filter: Option<SharedFilter>) {
        write(&self.filter, filter);
    }

    /// Applies the closed flag, the minimum level and the filter.
    pub fn is_loggable(&self, record: &Record) -> bool {
        !self.is_closed()
            && record.level().passes(self.level())
            && self
                .filter()
                .is_none_or(|filter| filter.is_loggable(record))
    }

    /// Formats `record` with the current formatter.
    pub fn format(&self, record: &Record) -> String {
        self.formatter().format(record)
    }

    /// Hands a failure to the error manager.
    pub fn report(&self, message: &str, source: Option<&(dyn Error + 'static)>, code: ErrorCode) {
        self.error_manager().error(message, source, code);
    }

    /// Marks the handler closed; returns `true` only for the first call.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Reports whether [`mark_closed`](Self::mark_closed) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for HandlerCore {
    fn default() -> Self {
        Self::new(Arc::new(PatternFormatter::new(DEFAULT_FORMAT)))
    }
}

impl fmt::Debug for HandlerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCore")
            .field("level", &self.level())
            .field("filtered", &self.filter().is_some())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
