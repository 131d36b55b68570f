//! Integration tests for category level resolution and minimum-level clamping.
//!
//! Inherited levels walk up the dot-separated category tree until an explicit
//! level is found or the root minimum applies. Configured levels below the
//! build-time minimum are promoted.

use std::collections::BTreeMap;

use logging::{
    BuildConfig, CategoryBuildConfig, InheritableLevel, LogConfig, SetupReport, category_levels,
    minimum_level, parent_category, resolve_level,
};
use logging_sink::Level;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn level() -> impl Strategy<Value = Level> {
    prop::sample::select(vec![
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ])
}

fn inheritable() -> impl Strategy<Value = InheritableLevel> {
    prop_oneof![
        1 => Just(InheritableLevel::Inherit),
        3 => level().prop_map(InheritableLevel::Explicit),
    ]
}

fn category() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "io", "app"]), 1..6)
        .prop_map(|segments| segments.join("."))
}

fn table() -> impl Strategy<Value = BTreeMap<String, InheritableLevel>> {
    prop::collection::btree_map(category(), inheritable(), 0..12)
}

/// Walks the ancestors one by one, consulting the table before the defaults.
fn reference(
    name: &str,
    table: &BTreeMap<String, InheritableLevel>,
    defaults: &BTreeMap<String, InheritableLevel>,
    root: Level,
) -> Level {
    let mut current = Some(name);
    while let Some(category) = current.filter(|c| !c.is_empty()) {
        let found = table
            .get(category)
            .or_else(|| defaults.get(category))
            .copied()
            .unwrap_or_default();
        if let Some(level) = found.level() {
            return level;
        }
        current = parent_category(category);
    }
    root
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: resolution terminates with the nearest explicit ancestor
    /// level or the root minimum.
    #[test]
    fn resolution_matches_ancestor_walk(
        name in category(),
        configured in table(),
        defaults in table(),
        root in level(),
    ) {
        let resolved = resolve_level(&name, &configured, |l| *l, &defaults, root);
        prop_assert_eq!(resolved, reference(&name, &configured, &defaults, root));
    }

    /// Property: after clamping no configured category resolves below its
    /// build-time minimum.
    #[test]
    fn clamped_levels_never_fall_below_minimum(
        configured in table(),
        minimums in table(),
        min_level in level(),
    ) {
        let mut config = LogConfig::default();
        for (name, level) in &configured {
            config.categories.entry(name.clone()).or_default().level = *level;
        }
        let build = BuildConfig {
            min_level,
            categories: minimums
                .iter()
                .map(|(name, level)| (name.clone(), CategoryBuildConfig { min_level: *level }))
                .collect(),
        };
        let defaults = BTreeMap::new();
        let mut report = SetupReport::new();

        let levels = category_levels(&config, &build, &defaults, &mut report);

        for (name, applied) in &levels {
            let minimum = minimum_level(name, &build, &defaults);
            if let Some(level) = applied {
                prop_assert!(*level >= minimum, "{name}: {level} < {minimum}");
            }
        }
    }
}

// ============================================================================
// Clamp Examples
// ============================================================================

/// Verifies that a verbose category is promoted and a warning is recorded.
#[test]
fn verbose_category_is_promoted_with_warning() {
    let mut config = LogConfig::default();
    config.set_category_level("io.app", Level::Debug);
    let build = BuildConfig {
        min_level: Level::Warn,
        ..BuildConfig::default()
    };
    let mut report = SetupReport::new();

    let levels = category_levels(&config, &build, &BTreeMap::new(), &mut report);

    assert_eq!(levels["io.app"], Some(Level::Warn));
    assert_eq!(report.warnings().len(), 1);
    assert!(report.warnings()[0].contains("promoting it to WARN"));
}

/// Verifies that a level at or above the minimum is kept as configured.
#[test]
fn sufficient_level_is_kept() {
    let mut config = LogConfig::default();
    config.set_category_level("io.app", Level::Error);
    let build = BuildConfig {
        min_level: Level::Warn,
        ..BuildConfig::default()
    };
    let mut report = SetupReport::new();

    let levels = category_levels(&config, &build, &BTreeMap::new(), &mut report);

    assert_eq!(levels["io.app"], Some(Level::Error));
    assert!(report.is_empty());
}

/// Verifies that an inheriting category stays inherited when its ancestor
/// satisfies the minimum.
#[test]
fn inheriting_category_stays_inherited() {
    let mut config = LogConfig::default();
    config.set_category_level("io", Level::Error);
    config.categories.entry("io.app".to_owned()).or_default();
    let build = BuildConfig::default();
    let mut report = SetupReport::new();

    let levels = category_levels(&config, &build, &BTreeMap::new(), &mut report);

    assert_eq!(levels["io.app"], None);
    assert_eq!(levels["io"], Some(Level::Error));
}
