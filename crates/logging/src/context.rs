//! crates/logging/src/context.rs
//! Inputs shared by handler assembly and bootstrap: launch mode, external
//! collaborators and the setup report.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use logging_sink::{BannerSupplier, Record, SharedFormatter, SharedHandler};
use serde::{Deserialize, Serialize};

/// Target under which setup warnings are emitted as `tracing` events.
pub const SETUP_TARGET: &str = "logging::setup";

/// How the hosting process was launched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchMode {
    /// Production run.
    #[default]
    Normal,
    /// Interactive development with hot reload.
    Development,
    /// Test run.
    Test,
}

impl LaunchMode {
    /// Reports whether the mode is development or test.
    pub const fn is_dev_or_test(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }

    /// Returns the lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a launch mode name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown launch mode '{0}' (expected normal, development or test)")]
pub struct ParseLaunchModeError(pub String);

impl FromStr for LaunchMode {
    type Err = ParseLaunchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "prod" | "production" => Ok(Self::Normal),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            _ => Err(ParseLaunchModeError(s.to_owned())),
        }
    }
}

/// Receives records that carry an attached error in development and test
/// runs.
pub type ExceptionReporter = Arc<dyn Fn(&Record) + Send + Sync>;

/// Parts of the pipeline supplied by the host instead of configuration.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Text printed ahead of the first console record.
    pub banner: Option<BannerSupplier>,
    /// Sink for attached errors in development and test runs.
    pub exception_reporter: Option<ExceptionReporter>,
    /// Candidate formatters for the root console handler; the last wins.
    pub console_formatters: Vec<SharedFormatter>,
    /// Candidate formatters for the root file handler; the last wins.
    pub file_formatters: Vec<SharedFormatter>,
    /// Candidate formatters for the root syslog handler; the last wins.
    pub syslog_formatters: Vec<SharedFormatter>,
    /// Anonymous handlers appended to the root list.
    pub handlers: Vec<SharedHandler>,
    /// Named handler maps merged with the configured named handlers.
    pub named_handlers: Vec<BTreeMap<String, SharedHandler>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("banner", &self.banner.is_some())
            .field("exception_reporter", &self.exception_reporter.is_some())
            .field("console_formatters", &self.console_formatters.len())
            .field("file_formatters", &self.file_formatters.len())
            .field("syslog_formatters", &self.syslog_formatters.len())
            .field("handlers", &self.handlers.len())
            .field(
                "named_handlers",
                &self
                    .named_handlers
                    .iter()
                    .flat_map(BTreeMap::keys)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Warnings collected while configuring the pipeline.
///
/// Every warning is also emitted as a `tracing` event under
/// [`SETUP_TARGET`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupReport {
    warnings: Vec<String>,
}

impl SetupReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records and emits a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: SETUP_TARGET, "{message}");
        self.warnings.push(message);
    }

    /// Returns the collected warnings in emission order.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Reports whether no warning was emitted.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Appends the warnings of `other`.
    pub fn merge(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }
}
