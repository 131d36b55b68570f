//! crates/logging/src/level.rs
//! Inheritable category levels and their resolution.
//!
//! A category either carries an explicit [`Level`] or inherits from its
//! nearest ancestor. Ancestors are found by trimming the last `.`-segment of
//! the name; once no segment remains the root minimum applies.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use logging_sink::{Level, ParseLevelError};
use serde::{Deserialize, Serialize};

/// Keyword selecting inheritance in configuration files.
pub const INHERIT: &str = "inherit";

/// An explicit level or the request to inherit one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InheritableLevel {
    /// Use the nearest ancestor's level.
    #[default]
    Inherit,
    /// Use this level.
    Explicit(Level),
}

impl InheritableLevel {
    /// Reports whether the level is inherited.
    pub const fn is_inherited(self) -> bool {
        matches!(self, Self::Inherit)
    }

    /// Returns the explicit level, if any.
    pub const fn level(self) -> Option<Level> {
        match self {
            Self::Inherit => None,
            Self::Explicit(level) => Some(level),
        }
    }
}

impl From<Level> for InheritableLevel {
    fn from(level: Level) -> Self {
        Self::Explicit(level)
    }
}

impl fmt::Display for InheritableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str(INHERIT),
            Self::Explicit(level) => level.fmt(f),
        }
    }
}

impl FromStr for InheritableLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(INHERIT) {
            Ok(Self::Inherit)
        } else {
            s.parse().map(Self::Explicit)
        }
    }
}

impl TryFrom<String> for InheritableLevel {
    type Error = ParseLevelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InheritableLevel> for String {
    fn from(value: InheritableLevel) -> Self {
        value.to_string()
    }
}

/// Returns the parent category of `name`; the root (`""`) has none.
///
/// ```
/// use logging::parent_category;
///
/// assert_eq!(parent_category("io.app.db"), Some("io.app"));
/// assert_eq!(parent_category("io"), Some(""));
/// assert_eq!(parent_category(""), None);
/// ```
pub fn parent_category(name: &str) -> Option<&str> {
    if name.is_empty() {
        return None;
    }
    Some(name.rfind('.').map_or("", |dot| &name[..dot]))
}

/// Looks `category` up in `table`, then in `defaults`, without walking up.
///
/// A table entry shadows the defaults even when it asks to inherit.
pub fn level_without_inheritance<T>(
    category: &str,
    table: &BTreeMap<String, T>,
    extract: impl Fn(&T) -> InheritableLevel,
    defaults: &BTreeMap<String, InheritableLevel>,
) -> InheritableLevel {
    table
        .get(category)
        .map(&extract)
        .or_else(|| defaults.get(category).copied())
        .unwrap_or_default()
}

/// Resolves the effective level of `category`.
///
/// Each step consults [`level_without_inheritance`]; an inherited result
/// moves to the parent category. Categories without a dot fall back to
/// `root_minimum` once inherited.
pub fn resolve_level<T>(
    category: &str,
    table: &BTreeMap<String, T>,
    extract: impl Fn(&T) -> InheritableLevel,
    defaults: &BTreeMap<String, InheritableLevel>,
    root_minimum: Level,
) -> Level {
    let mut current = category;
    loop {
        let found = level_without_inheritance(current, table, &extract, defaults);
        if let Some(level) = found.level() {
            return level;
        }
        match current.rfind('.') {
            Some(dot) => current = &current[..dot],
            None => return root_minimum,
        }
    }
}
