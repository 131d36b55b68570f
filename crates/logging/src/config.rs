//! crates/logging/src/config.rs
//! Runtime and build-time logging configuration.
//!
//! Both documents are plain serde structs read from TOML with kebab-case keys.
//! Every field has a default, so an empty document is a valid configuration
//! that logs INFO and above to the console.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use logging_sink::{
    ColorMode, DEFAULT_ENDPOINT, DEFAULT_LOG_FILE, DEFAULT_MAX_BACKUP_INDEX, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MAX_LENGTH, DEFAULT_QUEUE_LENGTH, Level, OverflowAction, Protocol, SyslogFacility,
    SyslogType,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::level::InheritableLevel;

/// Default console and file pattern.
pub const DEFAULT_CONSOLE_FORMAT: &str = "%d{yyyy-MM-dd HH:mm:ss,SSS} %-5p [%c{3.}] (%t) %s%e%n";

/// Default syslog pattern.
pub const DEFAULT_SYSLOG_FORMAT: &str = "%s%e";

fn parse<T: serde::de::DeserializeOwned>(text: &str, origin: &str) -> ConfigResult<T> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        origin: origin.to_owned(),
        source: Box::new(source),
    })
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Runtime logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LogConfig {
    /// Level of the root category.
    pub level: Level,
    /// Named handlers attached to the root category.
    pub handlers: Vec<String>,
    /// Per-category settings.
    pub categories: BTreeMap<String, CategoryConfig>,
    /// Cleanup filter rules keyed by category.
    pub filters: BTreeMap<String, CleanupFilterConfig>,
    /// The anonymous console handler.
    pub console: ConsoleConfig,
    /// The anonymous file handler.
    pub file: FileConfig,
    /// The anonymous syslog handler.
    pub syslog: SyslogConfig,
    /// Named console handlers.
    pub console_handlers: BTreeMap<String, ConsoleConfig>,
    /// Named file handlers.
    pub file_handlers: BTreeMap<String, FileConfig>,
    /// Named syslog handlers.
    pub syslog_handlers: BTreeMap<String, SyslogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            handlers: Vec::new(),
            categories: BTreeMap::new(),
            filters: BTreeMap::new(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            syslog: SyslogConfig::default(),
            console_handlers: BTreeMap::new(),
            file_handlers: BTreeMap::new(),
            syslog_handlers: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        parse(text, "<string>")
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        parse(&read(path)?, &path.display().to_string())
    }

    /// Sets an explicit level for `category`, creating the entry if needed.
    pub fn set_category_level(&mut self, category: impl Into<String>, level: Level) {
        self.categories.entry(category.into()).or_default().level = level.into();
    }

    /// Reports whether any named handler section exists.
    pub fn has_named_handlers(&self) -> bool {
        !self.console_handlers.is_empty()
            || !self.file_handlers.is_empty()
            || !self.syslog_handlers.is_empty()
    }
}

/// Settings for one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CategoryConfig {
    /// Level, or `inherit`.
    pub level: InheritableLevel,
    /// Also dispatch to the ancestors' handlers.
    pub use_parent_handlers: bool,
    /// Named handlers attached to the category.
    pub handlers: Option<Vec<String>>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            level: InheritableLevel::Inherit,
            use_parent_handlers: true,
            handlers: None,
        }
    }
}

/// A cleanup filter rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CleanupFilterConfig {
    /// Records below this level are rejected.
    pub target_level: Level,
    /// Match every category starting with the key.
    pub if_starts_with: bool,
}

impl Default for CleanupFilterConfig {
    fn default() -> Self {
        Self {
            target_level: Level::Debug,
            if_starts_with: false,
        }
    }
}

/// Asynchronous wrapping of a handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AsyncConfig {
    /// Wrap the handler.
    pub enable: bool,
    /// Bounded queue length.
    pub queue_length: usize,
    /// Policy when the queue is full.
    pub overflow: OverflowAction,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            enable: false,
            queue_length: DEFAULT_QUEUE_LENGTH,
            overflow: OverflowAction::Block,
        }
    }
}

/// Console handler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Build the handler.
    pub enable: bool,
    /// Write to standard error instead of standard output.
    pub stderr: bool,
    /// Pattern format.
    pub format: String,
    /// Minimum level.
    pub level: Level,
    /// Color mode.
    pub color: ColorMode,
    /// Dim the category and thread columns when colored.
    pub darken: u8,
    /// Asynchronous wrapping.
    #[serde(rename = "async")]
    pub async_handler: AsyncConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enable: true,
            stderr: false,
            format: DEFAULT_CONSOLE_FORMAT.to_owned(),
            level: Level::Trace,
            color: ColorMode::Auto,
            darken: 0,
            async_handler: AsyncConfig::default(),
        }
    }
}

/// File rotation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RotationConfig {
    /// Rotate after this many bytes.
    pub max_file_size: u64,
    /// Number of numbered backups kept.
    pub max_backup_index: u32,
    /// Date pattern appended on period rotation.
    pub file_suffix: Option<String>,
    /// Rotate an existing file at startup.
    pub rotate_on_boot: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_backup_index: DEFAULT_MAX_BACKUP_INDEX,
            file_suffix: None,
            rotate_on_boot: true,
        }
    }
}

/// File handler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Build the handler.
    pub enable: bool,
    /// File to write.
    pub path: PathBuf,
    /// Append instead of truncating.
    pub append: bool,
    /// Pattern format.
    pub format: String,
    /// Minimum level.
    pub level: Level,
    /// Rotation rules.
    pub rotation: RotationConfig,
    /// Asynchronous wrapping.
    #[serde(rename = "async")]
    pub async_handler: AsyncConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enable: false,
            path: PathBuf::from(DEFAULT_LOG_FILE),
            append: true,
            format: DEFAULT_CONSOLE_FORMAT.to_owned(),
            level: Level::Trace,
            rotation: RotationConfig::default(),
            async_handler: AsyncConfig::default(),
        }
    }
}

/// Syslog handler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyslogConfig {
    /// Build the handler.
    pub enable: bool,
    /// Daemon address as `host:port`.
    pub endpoint: String,
    /// Transport.
    pub protocol: Protocol,
    /// Message layout.
    pub syslog_type: SyslogType,
    /// Facility.
    pub facility: SyslogFacility,
    /// Application name; the executable name when unset.
    pub app_name: Option<String>,
    /// Host name; the machine host name when unset.
    pub hostname: Option<String>,
    /// Octet-counting framing for TCP.
    pub use_counting_framing: bool,
    /// Cut messages longer than `max-length`.
    pub truncate: bool,
    /// Maximum message length in bytes.
    pub max_length: usize,
    /// Retry broken TCP connections instead of dropping records.
    pub block_on_reconnect: bool,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Pattern format.
    pub format: String,
    /// Minimum level.
    pub level: Level,
    /// Asynchronous wrapping.
    #[serde(rename = "async")]
    pub async_handler: AsyncConfig,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enable: false,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            protocol: Protocol::Tcp,
            syslog_type: SyslogType::Rfc5424,
            facility: SyslogFacility::UserLevel,
            app_name: None,
            hostname: None,
            use_counting_framing: false,
            truncate: true,
            max_length: DEFAULT_MAX_LENGTH,
            block_on_reconnect: false,
            connect_timeout_ms: 5_000,
            format: DEFAULT_SYSLOG_FORMAT.to_owned(),
            level: Level::Trace,
            async_handler: AsyncConfig::default(),
        }
    }
}

/// Settings fixed when the application is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
    /// Global floor for runtime levels.
    pub min_level: Level,
    /// Per-category floors.
    pub categories: BTreeMap<String, CategoryBuildConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Debug,
            categories: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        parse(text, "<string>")
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        parse(&read(path)?, &path.display().to_string())
    }
}

/// Build-time settings for one category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CategoryBuildConfig {
    /// Floor for the category, or `inherit`.
    pub min_level: InheritableLevel,
}
