//! crates/logging/src/tracing_bridge.rs
//! Bridge from the tracing crate into the category registry.
//!
//! [`CategoryLayer`] is a tracing-subscriber layer that turns every event into
//! a [`Record`] and dispatches it through a [`CategoryRegistry`]. The event
//! target becomes the category, with `::` path separators replaced by dots,
//! so `tracing::info!(target: "io::app", ...)` lands in category `io.app`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logging::{LoggingSetup, init_tracing};
//!
//! let setup = LoggingSetup::global();
//! init_tracing(setup)?;
//!
//! tracing::info!(target: "io::app", "service started");
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use logging_sink::{Level, Record};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;

use crate::bootstrap::LoggingSetup;
use crate::category::CategoryRegistry;

/// A tracing layer dispatching events through a category registry.
#[derive(Clone, Debug)]
pub struct CategoryLayer {
    registry: Arc<CategoryRegistry>,
}

impl CategoryLayer {
    /// Creates a layer logging into `registry`.
    #[must_use]
    pub const fn new(registry: Arc<CategoryRegistry>) -> Self {
        Self { registry }
    }

    /// Creates a layer logging into the registry of `setup`.
    #[must_use]
    pub fn for_setup(setup: &LoggingSetup) -> Self {
        Self::new(Arc::clone(setup.registry()))
    }

    /// Maps a tracing target to a category name.
    #[must_use]
    pub fn category_for_target(target: &str) -> String {
        target.replace("::", ".")
    }

    /// Maps a tracing level to a record level.
    #[must_use]
    pub const fn level_for(level: &tracing::Level) -> Level {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::TRACE => Level::Trace,
        }
    }
}

impl<S> Layer<S> for CategoryLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let category = Self::category_for_target(metadata.target());
        let level = Self::level_for(metadata.level());
        if !self.registry.is_enabled(&category, level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let mut record = Record::new(level, category, visitor.take_message());
        if let Some(error) = visitor.error {
            record = record.with_thrown(error);
        }
        self.registry.log(&record);
    }
}

/// Collects the message, an `error` field and any other fields of an event.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: String,
    error: Option<String>,
}

impl EventVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn take_message(&mut self) -> String {
        let message = self.message.take().unwrap_or_default();
        let fields = std::mem::take(&mut self.fields);
        match (message.is_empty(), fields.is_empty()) {
            (_, true) => message,
            (true, false) => fields,
            (false, false) => format!("{message} {fields}"),
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.error = Some(value.to_string());
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }
}

/// Installs a global tracing subscriber forwarding events into `setup`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(setup: &LoggingSetup) -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(CategoryLayer::for_setup(setup))
        .try_init()
}

/// Installs a global tracing subscriber combining `filter` with the
/// category layer.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing_with_filter<F>(setup: &LoggingSetup, filter: F) -> Result<(), TryInitError>
where
    F: Layer<tracing_subscriber::Registry> + Send + Sync + 'static,
{
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(filter)
        .with(CategoryLayer::for_setup(setup))
        .try_init()
}
