//! crates/logging/src/category.rs
//! The registry of named category loggers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use logging_sink::{Level, Record, SharedHandler};

use crate::level::parent_category;

/// Name of the root category.
pub const ROOT_CATEGORY: &str = "";

/// Level of the root category until configured otherwise.
pub const DEFAULT_ROOT_LEVEL: Level = Level::Info;

/// One node of the category tree.
pub struct CategoryLogger {
    name: String,
    level: RwLock<Option<Level>>,
    use_parent_handlers: AtomicBool,
    handlers: ArcSwap<Vec<SharedHandler>>,
}

impl CategoryLogger {
    fn new(name: String, level: Option<Level>) -> Self {
        Self {
            name,
            level: RwLock::new(level),
            use_parent_handlers: AtomicBool::new(true),
            handlers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Returns the category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the explicitly set level.
    pub fn level(&self) -> Option<Level> {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets or clears the explicit level.
    pub fn set_level(&self, level: Option<Level>) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    /// Reports whether records continue to the ancestors' handlers.
    pub fn use_parent_handlers(&self) -> bool {
        self.use_parent_handlers.load(Ordering::Acquire)
    }

    /// Changes parent dispatch.
    pub fn set_use_parent_handlers(&self, value: bool) {
        self.use_parent_handlers.store(value, Ordering::Release);
    }

    /// Returns the current handler snapshot.
    pub fn handlers(&self) -> Arc<Vec<SharedHandler>> {
        self.handlers.load_full()
    }

    /// Replaces all handlers at once.
    pub fn set_handlers(&self, handlers: Vec<SharedHandler>) {
        self.handlers.store(Arc::new(handlers));
    }

    /// Appends a handler.
    pub fn add_handler(&self, handler: SharedHandler) {
        self.handlers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
    }

    /// Removes every occurrence of `handler`.
    pub fn remove_handler(&self, handler: &SharedHandler) {
        self.handlers.rcu(|current| {
            current
                .iter()
                .filter(|existing| !Arc::ptr_eq(existing, handler))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// Removes every occurrence of the handlers in `removed` and appends
    /// `added`, as a single update.
    pub fn replace_handlers(&self, removed: &[SharedHandler], added: &[SharedHandler]) {
        self.handlers.rcu(|current| {
            let mut next: Vec<SharedHandler> = current
                .iter()
                .filter(|existing| !removed.iter().any(|gone| Arc::ptr_eq(existing, gone)))
                .cloned()
                .collect();
            next.extend(added.iter().cloned());
            next
        });
    }

    fn publish(&self, record: &Record) {
        for handler in self.handlers.load().iter() {
            handler.publish(record);
        }
    }
}

impl fmt::Debug for CategoryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryLogger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("use_parent_handlers", &self.use_parent_handlers())
            .field("handlers", &self.handlers.load().len())
            .finish()
    }
}

/// A named handler attached to a category logger.
#[derive(Clone)]
pub struct CategoryLink {
    /// The category logger.
    pub logger: Arc<CategoryLogger>,
    /// The handler attached to it.
    pub handler: SharedHandler,
}

impl fmt::Debug for CategoryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryLink")
            .field("category", &self.logger.name())
            .field("handler", &self.handler.kind())
            .finish()
    }
}

/// Detaches the `previous` links and attaches the `next` ones.
///
/// Each affected logger switches its handler list in one update, so a
/// record reaches either the old or the new link set of that category.
pub fn relink(previous: &[CategoryLink], next: &[CategoryLink]) {
    let mut loggers: Vec<&Arc<CategoryLogger>> = Vec::new();
    for link in previous.iter().chain(next) {
        if !loggers.iter().any(|seen| Arc::ptr_eq(seen, &link.logger)) {
            loggers.push(&link.logger);
        }
    }
    let handlers_of = |links: &[CategoryLink], logger: &Arc<CategoryLogger>| {
        links
            .iter()
            .filter(|link| Arc::ptr_eq(&link.logger, logger))
            .map(|link| Arc::clone(&link.handler))
            .collect::<Vec<_>>()
    };
    for logger in loggers {
        logger.replace_handlers(&handlers_of(previous, logger), &handlers_of(next, logger));
    }
}

/// Concurrent map of category loggers.
///
/// Loggers are created on first use and never removed. The root logger
/// always exists and always has a level.
pub struct CategoryRegistry {
    loggers: DashMap<String, Arc<CategoryLogger>>,
    root: Arc<CategoryLogger>,
}

impl CategoryRegistry {
    /// Creates a registry holding only the root logger.
    pub fn new() -> Self {
        let root = Arc::new(CategoryLogger::new(
            ROOT_CATEGORY.to_owned(),
            Some(DEFAULT_ROOT_LEVEL),
        ));
        let loggers = DashMap::new();
        loggers.insert(ROOT_CATEGORY.to_owned(), Arc::clone(&root));
        Self { loggers, root }
    }

    /// Returns the root logger.
    pub fn root(&self) -> &Arc<CategoryLogger> {
        &self.root
    }

    /// Returns the logger for `name`, creating it if needed.
    pub fn logger(&self, name: &str) -> Arc<CategoryLogger> {
        if let Some(existing) = self.loggers.get(name) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.loggers
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(CategoryLogger::new(name.to_owned(), None)))
                .value(),
        )
    }

    /// Returns the logger for `name` if it exists.
    pub fn get(&self, name: &str) -> Option<Arc<CategoryLogger>> {
        self.loggers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Sets the explicit level of `name`.
    pub fn set_level(&self, name: &str, level: Option<Level>) {
        if name == ROOT_CATEGORY {
            self.root.set_level(Some(level.unwrap_or(DEFAULT_ROOT_LEVEL)));
        } else {
            self.logger(name).set_level(level);
        }
    }

    /// Attaches `handler` to `name`.
    pub fn add_handler(&self, name: &str, handler: SharedHandler) {
        self.logger(name).add_handler(handler);
    }

    /// Detaches `handler` from `name`.
    pub fn remove_handler(&self, name: &str, handler: &SharedHandler) {
        if let Some(logger) = self.get(name) {
            logger.remove_handler(handler);
        }
    }

    /// Returns the names of all known categories, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loggers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the level that applies to `name`: its own, or that of its
    /// nearest existing ancestor with an explicit level.
    pub fn effective_level(&self, name: &str) -> Level {
        let mut current = Some(name);
        while let Some(category) = current {
            if let Some(level) = self.get(category).and_then(|logger| logger.level()) {
                return level;
            }
            current = parent_category(category);
        }
        self.root.level().unwrap_or(DEFAULT_ROOT_LEVEL)
    }

    /// Reports whether a record at `level` in `name` would be dispatched.
    pub fn is_enabled(&self, name: &str, level: Level) -> bool {
        level.passes(self.effective_level(name))
    }

    /// Dispatches `record` to its category's handlers and, while parent
    /// dispatch is enabled, to the handlers of every ancestor.
    pub fn log(&self, record: &Record) {
        if !self.is_enabled(record.category(), record.level()) {
            return;
        }
        let mut current = Some(record.category());
        while let Some(category) = current {
            if let Some(logger) = self.get(category) {
                logger.publish(record);
                if !logger.use_parent_handlers() {
                    return;
                }
            }
            current = parent_category(category);
        }
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("categories", &self.loggers.len())
            .finish_non_exhaustive()
    }
}
