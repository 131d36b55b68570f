//! crates/logging/src/assembly.rs
//! Turns a [`LogConfig`] into a wired handler graph.
//!
//! # Overview
//!
//! [`build_handlers`] constructs the root handler list, the named handler map,
//! the category links and the [`ShutdownList`] releasing the handlers. Along
//! the way it applies category levels (clamped to the build-time minimum) in
//! the supplied [`CategoryRegistry`]. Links are staged, not attached; the
//! caller applies them with [`relink`](crate::relink) when it installs the
//! generation.
//!
//! # Errors
//!
//! Only duplicate handler names are fatal, and they are detected before any
//! handler is created or the registry is touched. Handlers that cannot be
//! built and references to unknown handler names are reported through the
//! shared error manager and skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use logging_sink::{
    AsyncHandler, BannerFormatter, BannerSupplier, CleanupFilter, ConsoleHandler, ConsoleTarget,
    ErrorCode, FileHandler, FilterElement, Handler, HandlerCore, Level, PatternFormatter, Record,
    RotationPolicy, SharedErrorManager, SharedFilter, SharedFormatter, SharedHandler, SinkError,
    SyslogHandler, default_app_name, default_hostname,
};

use crate::category::{CategoryLink, CategoryRegistry, ROOT_CATEGORY, relink};
use crate::config::{
    AsyncConfig, BuildConfig, CategoryBuildConfig, CategoryConfig, ConsoleConfig, FileConfig,
    LogConfig, SyslogConfig,
};
use crate::context::{Collaborators, ExceptionReporter, LaunchMode, SetupReport};
use crate::error::{ConfigError, ConfigResult};
use crate::level::{InheritableLevel, resolve_level};
use crate::shutdown::ShutdownList;

/// Which handler kinds an assembly pass builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssemblyScope {
    /// Console only, plus named handlers and category links.
    BuildTime,
    /// Every configured and supplied handler.
    #[default]
    Runtime,
}

/// Everything an assembly pass reads besides the configuration itself.
pub struct AssemblyContext<'a> {
    /// Registry receiving category levels and handler links.
    pub registry: &'a CategoryRegistry,
    /// Build-time minimum levels.
    pub build: &'a BuildConfig,
    /// Category minimums contributed by components, below the build table.
    pub category_defaults: &'a BTreeMap<String, InheritableLevel>,
    /// Launch mode of the process.
    pub launch_mode: LaunchMode,
    /// Host supplied formatters and handlers.
    pub collaborators: &'a Collaborators,
    /// Error manager given to every handler.
    pub error_manager: SharedErrorManager,
    /// Handler kinds to build.
    pub scope: AssemblyScope,
}

impl fmt::Debug for AssemblyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyContext")
            .field("build", &self.build)
            .field("launch_mode", &self.launch_mode)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Result of an assembly pass.
pub struct AssembledHandlers {
    /// Handlers attached to the root category.
    pub root: Vec<SharedHandler>,
    /// Handlers addressable by name.
    pub named: BTreeMap<String, SharedHandler>,
    /// Named handlers to attach to category loggers.
    pub links: Vec<CategoryLink>,
    /// Release actions for every handler this pass created.
    pub shutdown: ShutdownList,
    /// Warnings emitted during the pass.
    pub report: SetupReport,
}

impl fmt::Debug for AssembledHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledHandlers")
            .field("root", &self.root.iter().map(|h| h.kind()).collect::<Vec<_>>())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("links", &self.links)
            .field("shutdown", &self.shutdown)
            .field("report", &self.report)
            .finish()
    }
}

impl AssembledHandlers {
    /// Attaches the staged category links.
    pub fn link_categories(&self) {
        relink(&[], &self.links);
    }
}

/// Forwards records that carry an attached error to an external reporter.
pub struct ExceptionReportingHandler {
    core: HandlerCore,
    reporter: ExceptionReporter,
}

impl ExceptionReportingHandler {
    /// Wraps `reporter`.
    pub fn new(reporter: ExceptionReporter) -> Self {
        Self {
            core: HandlerCore::default(),
            reporter,
        }
    }
}

impl Handler for ExceptionReportingHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if record.thrown().is_some() && self.core.is_loggable(record) {
            (self.reporter)(record);
        }
    }

    fn flush(&self) {}

    fn close(&self) {
        self.core.mark_closed();
    }

    fn kind(&self) -> &'static str {
        "exception"
    }
}

impl fmt::Debug for ExceptionReportingHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionReportingHandler")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

/// Message reported when a category or the root names an unknown handler.
pub fn missing_handler_message(name: &str) -> String {
    format!("Handler with name '{name}' is linked to a category but not configured.")
}

/// Builds the cleanup filter described by `config.filters`.
pub fn cleanup_filter(config: &LogConfig) -> SharedFilter {
    Arc::new(CleanupFilter::new(config.filters.iter().map(
        |(category, filter)| {
            FilterElement::new(category.as_str(), filter.target_level, filter.if_starts_with)
        },
    )))
}

/// Returns the build-time minimum for `category`.
pub fn minimum_level(
    category: &str,
    build: &BuildConfig,
    defaults: &BTreeMap<String, InheritableLevel>,
) -> Level {
    resolve_level(
        category,
        &build.categories,
        |entry: &CategoryBuildConfig| entry.min_level,
        defaults,
        build.min_level,
    )
}

/// Computes the level to apply to every configured category.
///
/// Categories resolving below their build-time minimum are promoted to it;
/// `None` means the category inherits.
pub fn category_levels(
    config: &LogConfig,
    build: &BuildConfig,
    defaults: &BTreeMap<String, InheritableLevel>,
    report: &mut SetupReport,
) -> BTreeMap<String, Option<Level>> {
    let empty = BTreeMap::new();
    config
        .categories
        .iter()
        .map(|(name, category)| {
            let configured = resolve_level(
                name,
                &config.categories,
                |entry: &CategoryConfig| entry.level,
                &empty,
                build.min_level,
            );
            let minimum = minimum_level(name, build, defaults);
            let level = if configured < minimum {
                report.warn(format!(
                    "Log level {configured} for category '{name}' set below minimum logging level {minimum}, promoting it to {minimum}"
                ));
                Some(minimum)
            } else {
                category.level.level()
            };
            (name.clone(), level)
        })
        .collect()
}

/// Assembles the handler graph described by `config`.
///
/// # Errors
///
/// Returns [`ConfigError::DuplicateHandler`] when two enabled named handlers
/// share a name, whatever their sources and whether or not anything refers to
/// them. Nothing is built and the registry is left untouched then.
pub fn build_handlers(
    config: &LogConfig,
    context: &AssemblyContext<'_>,
) -> ConfigResult<AssembledHandlers> {
    claim_handler_names(config, context.collaborators)?;

    let mut assembly = Assembly {
        context,
        filter: cleanup_filter(config),
        report: SetupReport::new(),
        shutdown: ShutdownList::new(),
    };
    let registry = context.registry;
    let collaborators = context.collaborators;
    let runtime = context.scope == AssemblyScope::Runtime;

    if config.level < context.build.min_level {
        assembly.report.warn(format!(
            "Root log level {} is below the minimum logging level {}; keeping it as configured",
            config.level, context.build.min_level
        ));
    }
    registry.set_level(ROOT_CATEGORY, Some(config.level));

    let mut root = Vec::new();
    if config.console.enable {
        let candidates: &[SharedFormatter] = if runtime {
            &collaborators.console_formatters
        } else {
            &[]
        };
        let formatter = assembly.select_formatter("console", candidates);
        if let Some(handler) = assembly.console(
            "console handler",
            &config.console,
            formatter,
            collaborators.banner.as_ref(),
        ) {
            root.push(handler);
        }
    }
    if runtime {
        if context.launch_mode.is_dev_or_test()
            && let Some(reporter) = &collaborators.exception_reporter
        {
            let handler: SharedHandler =
                Arc::new(ExceptionReportingHandler::new(Arc::clone(reporter)));
            root.push(assembly.enroll(handler));
        }
        if config.file.enable {
            let formatter = assembly.select_formatter("file", &collaborators.file_formatters);
            if let Some(handler) = assembly.file("file handler", &config.file, formatter) {
                root.push(handler);
            }
        }
        if config.syslog.enable {
            let formatter = assembly.select_formatter("syslog", &collaborators.syslog_formatters);
            if let Some(handler) = assembly.syslog("syslog handler", &config.syslog, formatter) {
                root.push(handler);
            }
        }
    }

    let wants_named = !config.categories.is_empty()
        || !config.handlers.is_empty()
        || !collaborators.named_handlers.is_empty();
    let named = if wants_named {
        assembly.named_handlers(config)
    } else {
        BTreeMap::new()
    };

    let levels = category_levels(
        config,
        context.build,
        context.category_defaults,
        &mut assembly.report,
    );
    let mut links = Vec::new();
    for (name, category) in &config.categories {
        let logger = registry.logger(name);
        logger.set_level(levels.get(name).copied().flatten());
        logger.set_use_parent_handlers(category.use_parent_handlers);
        for handler_name in category.handlers.iter().flatten() {
            match named.get(handler_name) {
                Some(handler) => links.push(CategoryLink {
                    logger: Arc::clone(&logger),
                    handler: Arc::clone(handler),
                }),
                None => assembly.missing(handler_name),
            }
        }
    }

    if runtime {
        for handler in &collaborators.handlers {
            root.push(assembly.adopt(Arc::clone(handler)));
        }
    }

    for handler_name in &config.handlers {
        match named.get(handler_name) {
            Some(handler) => root.push(Arc::clone(handler)),
            None => assembly.missing(handler_name),
        }
    }

    Ok(AssembledHandlers {
        root,
        named,
        links,
        shutdown: assembly.shutdown,
        report: assembly.report,
    })
}

/// Rejects a name used by more than one enabled named handler.
fn claim_handler_names(config: &LogConfig, collaborators: &Collaborators) -> ConfigResult<()> {
    let mut claims: Vec<(&str, String)> = Vec::new();
    for name in config.console_handlers.iter().filter(|(_, c)| c.enable).map(|(n, _)| n) {
        claims.push((name.as_str(), format!("console-handlers.{name}")));
    }
    for (name, file) in config.file_handlers.iter().filter(|(_, f)| f.enable) {
        claims.push((name.as_str(), format!("file-handlers.{name} ({})", file.path.display())));
    }
    for (name, syslog) in config.syslog_handlers.iter().filter(|(_, s)| s.enable) {
        claims.push((name.as_str(), format!("syslog-handlers.{name} ({})", syslog.endpoint)));
    }
    for (index, map) in collaborators.named_handlers.iter().enumerate() {
        for (name, handler) in map {
            claims.push((name.as_str(), format!("external {} handler #{index}", handler.kind())));
        }
    }

    let mut sources: BTreeMap<&str, String> = BTreeMap::new();
    for (name, source) in claims {
        if let Some(existing) = sources.get(name) {
            return Err(ConfigError::DuplicateHandler {
                name: name.to_owned(),
                existing: existing.clone(),
                duplicate: source,
            });
        }
        sources.insert(name, source);
    }
    Ok(())
}

struct Assembly<'c, 'a> {
    context: &'c AssemblyContext<'a>,
    filter: SharedFilter,
    report: SetupReport,
    shutdown: ShutdownList,
}

impl Assembly<'_, '_> {
    fn error_manager(&self) -> &SharedErrorManager {
        &self.context.error_manager
    }

    fn warn(&mut self, message: String) {
        self.error_manager().error(&message, None, ErrorCode::Generic);
        self.report.warn(message);
    }

    fn missing(&self, name: &str) {
        self.error_manager()
            .error(&missing_handler_message(name), None, ErrorCode::Generic);
    }

    fn select_formatter(
        &mut self,
        kind: &str,
        candidates: &[SharedFormatter],
    ) -> Option<SharedFormatter> {
        if candidates.len() > 1 {
            self.warn(format!(
                "Multiple {kind} formatters were activated; using the last one"
            ));
        }
        candidates.last().cloned()
    }

    fn fail(&self, what: &str, error: &SinkError) {
        self.error_manager()
            .error(&format!("Failed to create {what}"), Some(error), error.code());
    }

    /// Gives a created handler the shared error manager and filter and
    /// registers its close action.
    fn enroll(&self, handler: SharedHandler) -> SharedHandler {
        let handler = self.adopt(handler);
        let closing = Arc::clone(&handler);
        self.shutdown.register(Box::new(move || {
            closing.flush();
            closing.close();
        }));
        handler
    }

    fn adopt(&self, handler: SharedHandler) -> SharedHandler {
        handler.set_error_manager(Arc::clone(self.error_manager()));
        handler.set_filter(Some(Arc::clone(&self.filter)));
        handler
    }

    fn wrap_async(
        &self,
        what: &str,
        handler: SharedHandler,
        config: &AsyncConfig,
    ) -> SharedHandler {
        handler.set_error_manager(Arc::clone(self.error_manager()));
        if !config.enable {
            return handler;
        }
        match AsyncHandler::new(config.queue_length, config.overflow) {
            Ok(wrapper) => {
                wrapper.set_level(handler.level());
                wrapper.add_handler(handler);
                Arc::new(wrapper)
            }
            Err(error) => {
                self.fail(&format!("asynchronous wrapper for {what}"), &error);
                handler
            }
        }
    }

    fn console(
        &self,
        what: &str,
        config: &ConsoleConfig,
        formatter: Option<SharedFormatter>,
        banner: Option<&BannerSupplier>,
    ) -> Option<SharedHandler> {
        let target = if config.stderr {
            ConsoleTarget::Stderr
        } else {
            ConsoleTarget::Stdout
        };
        let mut formatter = formatter.unwrap_or_else(|| {
            if config.color.enabled_for(target) {
                Arc::new(PatternFormatter::colored(config.format.as_str(), config.darken))
            } else {
                Arc::new(PatternFormatter::new(config.format.as_str()))
            }
        });
        if let Some(banner) = banner {
            formatter = Arc::new(BannerFormatter::new(formatter, Arc::clone(banner)));
        }
        let handler: SharedHandler = Arc::new(ConsoleHandler::new(target, formatter));
        handler.set_level(config.level);
        Some(self.enroll(self.wrap_async(what, handler, &config.async_handler)))
    }

    fn file(
        &self,
        what: &str,
        config: &FileConfig,
        formatter: Option<SharedFormatter>,
    ) -> Option<SharedHandler> {
        let formatter =
            formatter.unwrap_or_else(|| Arc::new(PatternFormatter::new(config.format.as_str())));
        let rotation = &config.rotation;
        let sink_config = logging_sink::FileConfig {
            path: config.path.clone(),
            append: config.append,
            rotation: RotationPolicy {
                max_file_size: (rotation.max_file_size > 0).then_some(rotation.max_file_size),
                max_backup_index: rotation.max_backup_index,
                file_suffix: rotation.file_suffix.clone(),
                rotate_on_boot: rotation.rotate_on_boot,
            },
        };
        match FileHandler::open(sink_config, formatter) {
            Ok(handler) => {
                let handler: SharedHandler = Arc::new(handler);
                handler.set_level(config.level);
                Some(self.enroll(self.wrap_async(what, handler, &config.async_handler)))
            }
            Err(error) => {
                self.fail(what, &error);
                None
            }
        }
    }

    fn syslog(
        &self,
        what: &str,
        config: &SyslogConfig,
        formatter: Option<SharedFormatter>,
    ) -> Option<SharedHandler> {
        let formatter =
            formatter.unwrap_or_else(|| Arc::new(PatternFormatter::new(config.format.as_str())));
        let sink_config = logging_sink::SyslogConfig {
            endpoint: config.endpoint.clone(),
            protocol: config.protocol,
            syslog_type: config.syslog_type,
            facility: config.facility,
            app_name: config.app_name.clone().unwrap_or_else(default_app_name),
            hostname: config.hostname.clone().unwrap_or_else(default_hostname),
            use_counting_framing: config.use_counting_framing,
            truncate: config.truncate,
            max_length: config.max_length,
            block_on_reconnect: config.block_on_reconnect,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
        };
        match SyslogHandler::connect(sink_config, formatter) {
            Ok(handler) => {
                let handler: SharedHandler = Arc::new(handler);
                handler.set_level(config.level);
                Some(self.enroll(self.wrap_async(what, handler, &config.async_handler)))
            }
            Err(error) => {
                self.fail(what, &error);
                None
            }
        }
    }

    fn named_handlers(&self, config: &LogConfig) -> BTreeMap<String, SharedHandler> {
        let mut named = BTreeMap::new();
        for (name, console) in config.console_handlers.iter().filter(|(_, c)| c.enable) {
            let what = format!("console handler '{name}'");
            if let Some(handler) = self.console(&what, console, None, None) {
                named.insert(name.clone(), handler);
            }
        }
        for (name, file) in config.file_handlers.iter().filter(|(_, f)| f.enable) {
            let what = format!("file handler '{name}'");
            if let Some(handler) = self.file(&what, file, None) {
                named.insert(name.clone(), handler);
            }
        }
        for (name, syslog) in config.syslog_handlers.iter().filter(|(_, s)| s.enable) {
            let what = format!("syslog handler '{name}'");
            if let Some(handler) = self.syslog(&what, syslog, None) {
                named.insert(name.clone(), handler);
            }
        }
        for map in &self.context.collaborators.named_handlers {
            for (name, handler) in map {
                named.insert(name.clone(), self.adopt(Arc::clone(handler)));
            }
        }
        named
    }
}
