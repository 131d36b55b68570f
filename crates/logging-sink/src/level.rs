//! crates/logging-sink/src/level.rs
//! Severity levels shared by records, handlers and categories.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Severity of a log record or threshold of a handler/category.
///
/// Levels are totally ordered from most verbose ([`Level::Trace`]) to
/// [`Level::Off`], which sits above every record severity and therefore
/// disables a handler or category when used as a threshold. The numeric
/// values follow the JBoss/JUL numbering so thresholds can be compared with
/// values coming from other logging systems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Level {
    /// Finest-grained diagnostics.
    Trace,
    /// Debugging diagnostics.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Potential problems.
    Warn,
    /// Failures that the process can recover from.
    Error,
    /// Failures that end the process.
    Fatal,
    /// Threshold that rejects every record.
    Off,
}

impl Level {
    /// All record severities in ascending order.
    pub const SEVERITIES: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    /// Returns the numeric severity of the level.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Trace => 400,
            Self::Debug => 500,
            Self::Info => 800,
            Self::Warn => 900,
            Self::Error => 1000,
            Self::Fatal => 1100,
            Self::Off => u32::MAX,
        }
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Off => "OFF",
        }
    }

    /// Reports whether a record at `self` passes a `threshold`.
    #[must_use]
    pub fn passes(self, threshold: Self) -> bool {
        self != Self::Off && self >= threshold
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ALL" | "TRACE" | "FINEST" | "FINER" => Ok(Self::Trace),
            "DEBUG" | "FINE" | "CONFIG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" | "SEVERE" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            "OFF" => Ok(Self::Off),
            _ => Err(ParseLevelError(name.to_owned())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = ParseLevelError;

    fn try_from(value: String) -> Result<Self, <Self as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        for pair in Level::SEVERITIES.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].value() < pair[1].value());
        }
        assert!(Level::Fatal < Level::Off);
    }

    #[test]
    fn parse_accepts_aliases_case_insensitively() {
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("Severe".parse::<Level>(), Ok(Level::Error));
        assert_eq!("all".parse::<Level>(), Ok(Level::Trace));
        assert_eq!(" debug ".parse::<Level>(), Ok(Level::Debug));
        assert_eq!("OFF".parse::<Level>(), Ok(Level::Off));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let err = "loud".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "unknown log level 'loud'");
    }

    #[test]
    fn passes_compares_against_threshold() {
        assert!(Level::Warn.passes(Level::Info));
        assert!(Level::Info.passes(Level::Info));
        assert!(!Level::Debug.passes(Level::Info));
        assert!(!Level::Fatal.passes(Level::Off));
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(Level::Warn.to_string(), "WARN");
        assert_eq!(String::from(Level::Trace), "TRACE");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_level_names() {
        let json = serde_json::to_string(&Level::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
        let level: Level = serde_json::from_str("\"fine\"").unwrap();
        assert_eq!(level, Level::Debug);
    }
}
