#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` assembles a process-wide, category-based logging pipeline from
//! layered configuration. Runtime settings ([`LogConfig`]) describe the root
//! level, per-category levels and handler links, a cleanup filter and the
//! console, file and syslog handlers (anonymous or named). Build-time settings
//! ([`BuildConfig`]) fix the minimum level each category may be configured
//! to. The handlers themselves live in the `logging-sink` crate.
//!
//! # Design
//!
//! - [`CategoryRegistry`] holds one logger per dot-separated category name.
//!   Levels are inherited from the nearest ancestor with an explicit level,
//!   and records travel up the tree while parent dispatch is enabled.
//! - [`build_handlers`] turns a configuration into a handler generation: the
//!   root handler list, the named handler map and a [`ShutdownList`] that
//!   releases both.
//! - [`LoggingSetup`] drives the bootstrap. Its root [`DelayedHandler`]
//!   buffers records until the first generation is installed, then swaps
//!   generations atomically and replays what it buffered.
//!
//! # Invariants
//!
//! - Resolving an inherited level always terminates at the root.
//! - A configured category level below its build-time minimum is promoted to
//!   the minimum, with a warning.
//! - Handler names are unique across console, file, syslog and externally
//!   supplied handlers.
//! - A producer fans a record out to either the previous or the new handler
//!   generation, never to a mix of both.
//!
//! # Errors
//!
//! [`ConfigError`] covers unreadable or invalid configuration documents and
//! duplicate handler names. Everything else (unknown handler references,
//! files that cannot be opened, unresolvable syslog endpoints) is reported
//! once through the shared error manager and the affected handler or link is
//! skipped.
//!
//! # Examples
//!
//! Configure a category and capture its output in memory:
//!
//! ```
//! use std::sync::Arc;
//!
//! use logging::{Collaborators, LogConfig, LoggingSetup, SetupOptions};
//! use logging_sink::{Level, MemoryHandler, Record};
//!
//! let memory = Arc::new(MemoryHandler::new());
//! let options = SetupOptions {
//!     collaborators: Collaborators {
//!         handlers: vec![memory.clone()],
//!         ..Collaborators::default()
//!     },
//!     ..SetupOptions::default()
//! };
//! let config = LogConfig::from_toml_str(
//!     r#"
//!     [console]
//!     enable = false
//!
//!     [categories."io.app"]
//!     level = "DEBUG"
//!     "#,
//! )?;
//!
//! let setup = LoggingSetup::new();
//! setup.initialize_logging(&config, &options)?;
//! setup.log(&Record::new(Level::Debug, "io.app.db", "query planned"));
//! setup.log(&Record::new(Level::Debug, "io.other", "suppressed"));
//!
//! assert_eq!(memory.messages(), vec!["query planned"]);
//! # Ok::<(), logging::ConfigError>(())
//! ```
//!
//! # See also
//!
//! - `logging-sink` for the handler, formatter and filter implementations.
//! - `tracing_bridge::CategoryLayer` (feature `layer`) for forwarding
//!   `tracing` events into the registry.

mod assembly;
mod bootstrap;
mod category;
mod config;
mod context;
mod delayed;
mod error;
mod level;
mod shutdown;
#[cfg(feature = "layer")]
pub mod tracing_bridge;

pub use assembly::{
    AssembledHandlers, AssemblyContext, AssemblyScope, ExceptionReportingHandler, build_handlers,
    category_levels, cleanup_filter, minimum_level, missing_handler_message,
};
pub use bootstrap::{IMAGE_BUILD_FORMAT, LoggingSetup, SetupOptions};
pub use category::{
    CategoryLink, CategoryLogger, CategoryRegistry, DEFAULT_ROOT_LEVEL, ROOT_CATEGORY, relink,
};
pub use config::{
    AsyncConfig, BuildConfig, CategoryBuildConfig, CategoryConfig, CleanupFilterConfig,
    ConsoleConfig, DEFAULT_CONSOLE_FORMAT, DEFAULT_SYSLOG_FORMAT, FileConfig, LogConfig,
    RotationConfig, SyslogConfig,
};
pub use context::{
    Collaborators, ExceptionReporter, LaunchMode, ParseLaunchModeError, SETUP_TARGET, SetupReport,
};
pub use delayed::{DEFAULT_BUFFER_CAPACITY, DelayedHandler, Phase, ReplayGate};
pub use error::{ConfigError, ConfigResult};
pub use level::{INHERIT, InheritableLevel, level_without_inheritance, parent_category, resolve_level};
pub use shutdown::{ShutdownAction, ShutdownList};
#[cfg(feature = "layer")]
pub use tracing_bridge::{CategoryLayer, init_tracing, init_tracing_with_filter};
