//! crates/logging/src/bootstrap.rs
//! Bootstrap orchestration: from buffered startup records to the fully
//! configured runtime pipeline.
//!
//! A [`LoggingSetup`] owns the category registry and the [`DelayedHandler`]
//! attached to its root. Each `initialize_*` call assembles a handler
//! generation, swaps it into the delayed handler, moves the category links
//! over to it and then releases the previous generation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use logging_sink::{
    ConsoleHandler, ConsoleTarget, ErrorCode, Handler, Level, OnlyOnceErrorManager,
    PatternFormatter, Record, SharedErrorManager, SharedHandler,
};

use crate::assembly::{AssembledHandlers, AssemblyContext, AssemblyScope, build_handlers};
use crate::category::{CategoryLink, CategoryRegistry, ROOT_CATEGORY, relink};
use crate::config::{BuildConfig, LogConfig};
use crate::context::{Collaborators, LaunchMode, SetupReport};
use crate::delayed::{DelayedHandler, Phase};
use crate::error::ConfigResult;
use crate::level::InheritableLevel;
use crate::shutdown::ShutdownList;

/// Console pattern used while building a native image.
pub const IMAGE_BUILD_FORMAT: &str = "%d{HH:mm:ss,SSS} %-5p [%c{1.}] %s%e%n";

/// Everything besides the runtime configuration that shapes a setup pass.
#[derive(Clone, Debug, Default)]
pub struct SetupOptions {
    /// Build-time minimum levels.
    pub build: BuildConfig,
    /// Category minimums contributed by components.
    pub category_defaults: BTreeMap<String, InheritableLevel>,
    /// Launch mode of the process.
    pub launch_mode: LaunchMode,
    /// Host supplied formatters and handlers.
    pub collaborators: Collaborators,
}

#[derive(Default)]
struct Generation {
    named: BTreeMap<String, SharedHandler>,
    links: Vec<CategoryLink>,
    shutdown: ShutdownList,
}

impl Generation {
    /// Splits an assembly into its root handlers, the generation owning
    /// everything else and the warnings.
    fn split(assembled: AssembledHandlers) -> (Vec<SharedHandler>, Self, SetupReport) {
        let generation = Self {
            named: assembled.named,
            links: assembled.links,
            shutdown: assembled.shutdown,
        };
        (assembled.root, generation, assembled.report)
    }
}

/// Which delayed handler slot a generation is installed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    BuildTime,
    Runtime,
}

impl Stage {
    const fn phase(self) -> Phase {
        match self {
            Self::BuildTime => Phase::BuildTimeConfigured,
            Self::Runtime => Phase::RuntimeConfigured,
        }
    }
}

/// Process-wide logging state.
pub struct LoggingSetup {
    registry: Arc<CategoryRegistry>,
    delayed: Arc<DelayedHandler>,
    error_manager: SharedErrorManager,
    generation: Mutex<Generation>,
}

static GLOBAL: OnceLock<LoggingSetup> = OnceLock::new();

impl LoggingSetup {
    /// Creates an unconfigured setup reporting to standard error.
    pub fn new() -> Self {
        Self::with_error_manager(OnlyOnceErrorManager::shared())
    }

    /// Creates an unconfigured setup reporting through `error_manager`.
    ///
    /// Until the first handler set is installed every record reaching the
    /// root is buffered; the configured levels are applied when the buffer
    /// is replayed.
    pub fn with_error_manager(error_manager: SharedErrorManager) -> Self {
        let registry = Arc::new(CategoryRegistry::new());
        registry.set_level(ROOT_CATEGORY, Some(Level::Trace));

        let delayed = Arc::new(DelayedHandler::new());
        let gate_registry = Arc::downgrade(&registry);
        delayed.set_replay_gate(Some(Arc::new(move |record: &Record| {
            gate_registry
                .upgrade()
                .is_none_or(|registry| registry.is_enabled(record.category(), record.level()))
        })));
        delayed.set_error_manager(Arc::clone(&error_manager));
        registry.root().add_handler(Arc::clone(&delayed) as SharedHandler);

        Self {
            registry,
            delayed,
            error_manager,
            generation: Mutex::new(Generation::default()),
        }
    }

    /// Returns the process-wide instance, creating it on first use.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Returns the category registry.
    pub fn registry(&self) -> &Arc<CategoryRegistry> {
        &self.registry
    }

    /// Returns the root delayed handler.
    pub fn delayed(&self) -> &Arc<DelayedHandler> {
        &self.delayed
    }

    /// Returns the error manager shared by every handler.
    pub fn error_manager(&self) -> &SharedErrorManager {
        &self.error_manager
    }

    /// Returns the current bootstrap phase.
    pub fn phase(&self) -> Phase {
        self.delayed.phase()
    }

    /// Returns the named handlers of the installed generation.
    pub fn named_handlers(&self) -> BTreeMap<String, SharedHandler> {
        self.lock_generation().named.clone()
    }

    /// Dispatches `record` through the category tree.
    pub fn log(&self, record: &Record) {
        self.registry.log(record);
    }

    fn lock_generation(&self) -> MutexGuard<'_, Generation> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn assemble(
        &self,
        config: &LogConfig,
        options: &SetupOptions,
        scope: AssemblyScope,
    ) -> ConfigResult<AssembledHandlers> {
        let context = AssemblyContext {
            registry: &self.registry,
            build: &options.build,
            category_defaults: &options.category_defaults,
            launch_mode: options.launch_mode,
            collaborators: &options.collaborators,
            error_manager: Arc::clone(&self.error_manager),
            scope,
        };
        build_handlers(config, &context)
    }

    /// Installs `handlers` for `stage`, moves every category from the
    /// current generation's links to the new ones, then releases the
    /// previous generation.
    fn install(&self, stage: Stage, handlers: Vec<SharedHandler>, generation: Generation) {
        let previous = {
            let mut current = self.lock_generation();
            match stage {
                Stage::Runtime => {
                    self.delayed.set_auto_flush(false);
                    self.delayed.set_handlers(handlers);
                }
                Stage::BuildTime => {
                    self.delayed.set_build_time_handlers(handlers);
                }
            }
            relink(&current.links, &generation.links);
            std::mem::replace(&mut *current, generation)
        };
        previous.shutdown.run();
        tracing::debug!(
            target: crate::context::SETUP_TARGET,
            phase = %stage.phase(),
            "installed logging handlers"
        );
    }

    /// Installs the minimal build-time handler set: the console handler plus
    /// the named handlers and category links of `config`.
    ///
    /// # Errors
    ///
    /// Fails on duplicate handler names; nothing is installed then.
    pub fn initialize_build_time_logging(
        &self,
        config: &LogConfig,
        options: &SetupOptions,
    ) -> ConfigResult<SetupReport> {
        let assembled = self.assemble(config, options, AssemblyScope::BuildTime)?;
        let (root, generation, report) = Generation::split(assembled);
        self.install(Stage::BuildTime, root, generation);
        Ok(report)
    }

    /// Installs the console-only handler set used while building an image.
    pub fn initialize_for_image_build(&self) {
        self.registry.set_level(ROOT_CATEGORY, Some(Level::Info));
        let handler: SharedHandler = Arc::new(ConsoleHandler::new(
            ConsoleTarget::Stdout,
            Arc::new(PatternFormatter::new(IMAGE_BUILD_FORMAT)),
        ));
        handler.set_level(Level::Info);
        handler.set_error_manager(Arc::clone(&self.error_manager));
        let generation = Generation::default();
        let closing = Arc::clone(&handler);
        generation.shutdown.register(Box::new(move || {
            closing.flush();
            closing.close();
        }));
        self.install(Stage::BuildTime, vec![handler], generation);
    }

    /// Assembles the complete runtime pipeline and swaps it in. Records
    /// buffered so far are replayed into the new handlers.
    ///
    /// # Errors
    ///
    /// Fails on duplicate handler names; the active handlers stay installed.
    pub fn initialize_logging(
        &self,
        config: &LogConfig,
        options: &SetupOptions,
    ) -> ConfigResult<SetupReport> {
        let assembled = self.assemble(config, options, AssemblyScope::Runtime)?;
        let (root, generation, report) = Generation::split(assembled);
        self.install(Stage::Runtime, root, generation);
        Ok(report)
    }

    /// Loads and installs the runtime configuration; if that fails while no
    /// runtime handlers are installed yet, installs the default console
    /// pipeline first.
    ///
    /// # Errors
    ///
    /// Returns the original loading or assembly error, after the fallback
    /// is in place.
    pub fn initialize_logging_with_fallback(
        &self,
        load: impl FnOnce() -> ConfigResult<LogConfig>,
        options: &SetupOptions,
    ) -> ConfigResult<SetupReport> {
        let result = load().and_then(|config| self.initialize_logging(&config, options));
        if result.is_err() && self.phase() != Phase::RuntimeConfigured {
            self.handle_failed_start();
        }
        result
    }

    /// Installs the default console pipeline in development mode, for use
    /// when startup failed before logging was configured.
    pub fn handle_failed_start(&self) -> SetupReport {
        let options = SetupOptions {
            launch_mode: LaunchMode::Development,
            ..SetupOptions::default()
        };
        match self.initialize_logging(&LogConfig::default(), &options) {
            Ok(report) => report,
            Err(error) => {
                self.error_manager.error(
                    "Failed to install the fallback console handler",
                    Some(&error),
                    ErrorCode::Generic,
                );
                SetupReport::new()
            }
        }
    }

    /// Flushes and releases every installed handler. Records published
    /// afterwards are discarded.
    pub fn shutdown(&self) {
        self.delayed.flush();
        let generation = std::mem::take(&mut *self.lock_generation());
        relink(&generation.links, &[]);
        generation.shutdown.run();
        self.delayed.close();
    }
}

impl Default for LoggingSetup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoggingSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingSetup")
            .field("phase", &self.phase())
            .field("registry", &self.registry)
            .field("delayed", &self.delayed)
            .finish_non_exhaustive()
    }
}
