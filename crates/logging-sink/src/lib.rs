#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! crates/logging-sink/src/lib.rs
//!
//! # Overview
//!
//! `logging-sink` provides the runtime half of the logging pipeline: the
//! [`Record`] that flows from categories to sinks, the [`Level`] scale, the
//! [`Handler`] contract and its console, file, syslog, asynchronous and
//! in-memory implementations, `%`-pattern [`Formatter`]s, the
//! [`CleanupFilter`] and the [`ErrorManager`] that absorbs sink failures.
//!
//! # Design
//!
//! Handlers are shared as [`SharedHandler`] (`Arc<dyn Handler>`) between the
//! root handler list, the named-handler map and any number of categories.
//! Every handler embeds a [`HandlerCore`] holding its level, formatter, filter
//! and error manager behind interior mutability, so reconfiguration happens
//! through `&self`. Each handler serialises access to its own destination.
//!
//! # Invariants
//!
//! - `publish`, `flush` and `close` never panic and never return errors; sink
//!   failures are handed to the handler's error manager.
//! - `close` is idempotent and a closed handler drops further records.
//! - A cleanup filter never rewrites the level of a record, it only rejects.
//!
//! # Errors
//!
//! Constructors that touch the outside world ([`FileHandler::open`],
//! [`SyslogHandler::connect`], [`AsyncHandler::new`]) return [`SinkError`].
//!
//! # Examples
//!
//! Capture records below a prefix floor:
//!
//! ```
//! use std::sync::Arc;
//! use logging_sink::{CleanupFilter, FilterElement, Handler, Level, MemoryHandler, Record};
//!
//! let handler = MemoryHandler::new();
//! handler.set_filter(Some(Arc::new(CleanupFilter::new([FilterElement::new(
//!     "io.test",
//!     Level::Warn,
//!     true,
//! )]))));
//!
//! handler.publish(&Record::new(Level::Info, "io.test.sub", "dropped"));
//! handler.publish(&Record::new(Level::Error, "io.test.sub", "kept"));
//! assert_eq!(handler.messages(), vec!["kept".to_owned()]);
//! ```
//!
//! # See also
//!
//! - `logging` crate for configuration, handler assembly and bootstrap.

mod async_handler;
mod console;
mod error;
mod error_manager;
mod file;
mod filter;
mod formatter;
mod handler;
mod level;
mod memory;
mod record;
mod syslog;

pub use async_handler::{AsyncHandler, DEFAULT_QUEUE_LENGTH, OverflowAction};
pub use console::{ColorMode, ConsoleHandler, ConsoleTarget};
pub use error::{SinkError, SinkResult};
pub use error_manager::{
    ErrorCode, ErrorManager, ErrorReport, OnlyOnceErrorManager, ReportSink, SharedErrorManager,
};
pub use file::{
    DEFAULT_LOG_FILE, DEFAULT_MAX_BACKUP_INDEX, DEFAULT_MAX_FILE_SIZE, FileConfig, FileHandler,
    RotationPolicy,
};
pub use filter::{CleanupFilter, Filter, FilterElement, SharedFilter};
pub use formatter::{
    BannerFormatter, BannerSupplier, DEFAULT_DATE_PATTERN, DatePattern, Formatter,
    PatternFormatter, SharedFormatter,
};
pub use handler::{DEFAULT_FORMAT, Handler, HandlerCore, SharedHandler};
pub use level::{Level, ParseLevelError};
pub use memory::MemoryHandler;
pub use record::Record;
pub use syslog::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_LENGTH, Protocol, SyslogConfig, SyslogFacility, SyslogHandler,
    SyslogPriority, SyslogType, default_app_name, default_hostname,
};
