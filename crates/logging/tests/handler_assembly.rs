//! Integration tests for handler assembly.
//!
//! These tests build handler generations from TOML documents and check the
//! naming, linking, filtering and level rules end to end.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use logging::{
    AssemblyContext, AssemblyScope, BuildConfig, CategoryRegistry, Collaborators, ConfigError,
    LaunchMode, LogConfig, build_handlers, missing_handler_message,
};
use logging_sink::{
    ErrorReport, Handler, Level, MemoryHandler, OnlyOnceErrorManager, Record, SharedErrorManager,
    SharedHandler,
};

fn capturing_manager() -> (SharedErrorManager, Arc<Mutex<Vec<ErrorReport>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let manager: SharedErrorManager = Arc::new(OnlyOnceErrorManager::with_sink(Arc::new(
        move |report: &ErrorReport| sink.lock().unwrap().push(report.clone()),
    )));
    (manager, reports)
}

fn assemble(
    config: &LogConfig,
    build: &BuildConfig,
    registry: &CategoryRegistry,
    collaborators: &Collaborators,
    error_manager: SharedErrorManager,
) -> Result<logging::AssembledHandlers, ConfigError> {
    let defaults = BTreeMap::new();
    let context = AssemblyContext {
        registry,
        build,
        category_defaults: &defaults,
        launch_mode: LaunchMode::Normal,
        collaborators,
        error_manager,
        scope: AssemblyScope::Runtime,
    };
    build_handlers(config, &context)
}

// ============================================================================
// Handler Names
// ============================================================================

/// Verifies that reusing a name across handler kinds is fatal.
#[test]
fn duplicate_name_across_kinds_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig::from_toml_str(&format!(
        r#"
        [console]
        enable = false

        [console-handlers.shared]
        stderr = true

        [file-handlers.shared]
        enable = true
        path = "{}"
        "#,
        dir.path().join("shared.log").display()
    ))
    .unwrap();
    let (manager, _) = capturing_manager();
    let mut collaborators = Collaborators::default();
    let memory: SharedHandler = Arc::new(MemoryHandler::new());
    collaborators.named_handlers = vec![BTreeMap::from([("other".to_owned(), memory)])];

    let error = assemble(
        &config,
        &BuildConfig::default(),
        &CategoryRegistry::new(),
        &collaborators,
        manager,
    )
    .unwrap_err();

    assert!(matches!(error, ConfigError::DuplicateHandler { ref name, .. } if name == "shared"));
    assert!(error.to_string().contains("console-handlers.shared"));
    assert!(error.to_string().contains("file-handlers.shared"));
}

/// Verifies that duplicate names are fatal even when nothing refers to them,
/// and that the failed pass opens no files.
#[test]
fn unreferenced_duplicate_name_is_fatal_before_opening_files() {
    let dir = tempfile::tempdir().unwrap();
    let root_log = dir.path().join("root.log");
    let shared_log = dir.path().join("shared.log");
    let config = LogConfig::from_toml_str(&format!(
        r#"
        level = "DEBUG"
        [console]
        enable = false

        [file]
        enable = true
        path = "{}"
        [file.async]
        enable = true

        [console-handlers.shared]

        [file-handlers.shared]
        enable = true
        path = "{}"
        "#,
        root_log.display(),
        shared_log.display()
    ))
    .unwrap();
    let (manager, _) = capturing_manager();
    let registry = CategoryRegistry::new();

    let error = assemble(
        &config,
        &BuildConfig::default(),
        &registry,
        &Collaborators::default(),
        manager,
    )
    .unwrap_err();

    assert!(matches!(error, ConfigError::DuplicateHandler { ref name, .. } if name == "shared"));
    assert!(!root_log.exists());
    assert!(!shared_log.exists());
    assert_eq!(registry.effective_level("io.app"), logging::DEFAULT_ROOT_LEVEL);
}

/// Verifies that a disabled named handler does not claim its name.
#[test]
fn disabled_named_handler_does_not_conflict() {
    let config = LogConfig::from_toml_str(
        r#"
        handlers = ["audit"]
        [console]
        enable = false
        [console-handlers.audit]
        enable = false
        "#,
    )
    .unwrap();
    let (manager, _) = capturing_manager();
    let memory = Arc::new(MemoryHandler::new());
    let collaborators = Collaborators {
        named_handlers: vec![BTreeMap::from([(
            "audit".to_owned(),
            memory.clone() as SharedHandler,
        )])],
        ..Collaborators::default()
    };

    let assembled = assemble(
        &config,
        &BuildConfig::default(),
        &CategoryRegistry::new(),
        &collaborators,
        manager,
    )
    .unwrap();

    assert_eq!(assembled.root.len(), 1);
    assert_eq!(assembled.root[0].kind(), "memory");
}

// ============================================================================
// Missing References
// ============================================================================

/// Verifies that an unknown handler reference is reported exactly once and
/// assembly still completes.
#[test]
fn unknown_reference_reported_once() {
    let config = LogConfig::from_toml_str(
        r#"
        handlers = ["missing"]
        [console]
        enable = false
        [categories."io.app"]
        handlers = ["missing"]
        [categories."io.db"]
        handlers = ["missing"]
        "#,
    )
    .unwrap();
    let (manager, reports) = capturing_manager();

    let assembled = assemble(
        &config,
        &BuildConfig::default(),
        &CategoryRegistry::new(),
        &Collaborators::default(),
        manager,
    )
    .unwrap();

    assert!(assembled.root.is_empty());
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message, missing_handler_message("missing"));
    assert_eq!(
        reports[0].to_string(),
        "LogManager error of type GENERIC_FAILURE: Handler with name 'missing' is linked to a category but not configured."
    );
}

// ============================================================================
// Filtering
// ============================================================================

/// Verifies that a prefix cleanup filter acts as a floor on every handler.
#[test]
fn prefix_filter_applies_to_named_and_anonymous_handlers() {
    let config = LogConfig::from_toml_str(
        r#"
        handlers = ["audit"]
        [console]
        enable = false
        [filters."io.test"]
        target-level = "WARN"
        if-starts-with = true
        "#,
    )
    .unwrap();
    let (manager, _) = capturing_manager();
    let anonymous = Arc::new(MemoryHandler::new());
    let named = Arc::new(MemoryHandler::new());
    let collaborators = Collaborators {
        handlers: vec![anonymous.clone() as SharedHandler],
        named_handlers: vec![BTreeMap::from([(
            "audit".to_owned(),
            named.clone() as SharedHandler,
        )])],
        ..Collaborators::default()
    };
    let registry = CategoryRegistry::new();

    let assembled = assemble(
        &config,
        &BuildConfig::default(),
        &registry,
        &collaborators,
        manager,
    )
    .unwrap();
    registry.root().set_handlers(assembled.root.clone());

    registry.log(&Record::new(Level::Info, "io.test.sub", "info from sub"));
    registry.log(&Record::new(Level::Error, "io.test.sub", "error from sub"));
    registry.log(&Record::new(Level::Info, "io.tested", "plain string prefix"));
    registry.log(&Record::new(Level::Info, "io.other", "unrelated"));

    assert_eq!(anonymous.messages(), vec!["error from sub", "unrelated"]);
    assert_eq!(named.messages(), vec!["error from sub", "unrelated"]);
    assert_eq!(anonymous.records()[0].level(), Level::Error);
}

// ============================================================================
// Levels
// ============================================================================

/// Verifies the root INFO, `io.app` DEBUG, minimum WARN scenario.
#[test]
fn minimum_level_scenario() {
    let config = LogConfig::from_toml_str(
        r#"
        level = "INFO"
        [console]
        enable = false
        [categories."io.app"]
        level = "DEBUG"
        "#,
    )
    .unwrap();
    let build = BuildConfig::from_toml_str("min-level = \"WARN\"").unwrap();
    let (manager, _) = capturing_manager();
    let registry = CategoryRegistry::new();

    let assembled = assemble(&config, &build, &registry, &Collaborators::default(), manager)
        .unwrap();

    assert_eq!(registry.effective_level("io.app"), Level::Warn);
    assert_eq!(registry.effective_level("io.app.db"), Level::Warn);
    assert_eq!(registry.effective_level("io.other"), Level::Info);
    assert!(
        assembled
            .report
            .warnings()
            .iter()
            .any(|warning| warning.contains("'io.app'"))
    );
}

/// Verifies that category links respect the parent dispatch flag.
#[test]
fn category_links_and_parent_dispatch() {
    let config = LogConfig::from_toml_str(
        r#"
        [console]
        enable = false
        [categories."io.audit"]
        use-parent-handlers = false
        handlers = ["audit"]
        "#,
    )
    .unwrap();
    let (manager, _) = capturing_manager();
    let root = Arc::new(MemoryHandler::new());
    let audit = Arc::new(MemoryHandler::new());
    let collaborators = Collaborators {
        handlers: vec![root.clone() as SharedHandler],
        named_handlers: vec![BTreeMap::from([(
            "audit".to_owned(),
            audit.clone() as SharedHandler,
        )])],
        ..Collaborators::default()
    };
    let registry = CategoryRegistry::new();

    let assembled = assemble(
        &config,
        &BuildConfig::default(),
        &registry,
        &collaborators,
        manager,
    )
    .unwrap();
    assert!(registry.logger("io.audit").handlers().is_empty());
    registry.root().set_handlers(assembled.root.clone());
    assembled.link_categories();

    registry.log(&Record::new(Level::Info, "io.audit.login", "login"));
    registry.log(&Record::new(Level::Info, "io.web", "request"));

    assert_eq!(audit.messages(), vec!["login"]);
    assert_eq!(root.messages(), vec!["request"]);
}
