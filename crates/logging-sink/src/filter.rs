//! crates/logging-sink/src/filter.rs
//! Per-category level floors applied by every handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::level::Level;
use crate::record::Record;

/// Decides whether a record reaches a handler.
pub trait Filter: Send + Sync {
    /// Returns `true` when `record` should be published.
    fn is_loggable(&self, record: &Record) -> bool;
}

/// Shared filter handle.
pub type SharedFilter = Arc<dyn Filter>;

/// A single cleanup rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterElement {
    category: String,
    target_level: Level,
    starts_with: bool,
}

impl FilterElement {
    /// Creates a rule for `category`.
    ///
    /// With `starts_with` the rule also applies to every category whose name
    /// begins with `category`.
    pub fn new(category: impl Into<String>, target_level: Level, starts_with: bool) -> Self {
        Self {
            category: category.into(),
            target_level,
            starts_with,
        }
    }

    /// Returns the category (or prefix) the rule applies to.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the minimum level a matching record must have.
    pub const fn target_level(&self) -> Level {
        self.target_level
    }

    /// Reports whether the rule matches by prefix.
    pub const fn starts_with(&self) -> bool {
        self.starts_with
    }

    fn matches(&self, category: &str) -> bool {
        if self.starts_with {
            category.starts_with(&self.category)
        } else {
            category == self.category
        }
    }
}

/// Rejects records below the floor of the rule matching their category.
///
/// An exact rule for the record's category wins; otherwise the longest
/// matching prefix rule applies. Records with no matching rule pass. The
/// filter never rewrites the record level.
#[derive(Clone, Debug, Default)]
pub struct CleanupFilter {
    elements: HashMap<String, FilterElement>,
    prefixes: Vec<FilterElement>,
}

impl CleanupFilter {
    /// Builds a filter from rules; a later rule for the same category replaces
    /// an earlier one.
    pub fn new(elements: impl IntoIterator<Item = FilterElement>) -> Self {
        let elements: HashMap<String, FilterElement> = elements
            .into_iter()
            .map(|element| (element.category.clone(), element))
            .collect();
        let mut prefixes: Vec<FilterElement> = elements
            .values()
            .filter(|element| element.starts_with)
            .cloned()
            .collect();
        prefixes.sort_by(|a, b| b.category.len().cmp(&a.category.len()));
        Self { elements, prefixes }
    }

    /// Returns the configured rules.
    pub fn elements(&self) -> impl Iterator<Item = &FilterElement> {
        self.elements.values()
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Reports whether the filter has no rules.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn rule_for(&self, category: &str) -> Option<&FilterElement> {
        self.elements
            .get(category)
            .or_else(|| self.prefixes.iter().find(|element| element.matches(category)))
    }
}

impl Filter for CleanupFilter {
    fn is_loggable(&self, record: &Record) -> bool {
        self.rule_for(record.category())
            .is_none_or(|element| record.level() >= element.target_level)
    }
}
