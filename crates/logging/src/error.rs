//! crates/logging/src/error.rs
//! Fatal configuration errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A configuration problem that aborts assembly or bootstrap.
///
/// Recoverable problems (a missing named handler, an unopenable file) never
/// surface here; they go to the error manager instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read logging configuration '{path}': {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A configuration document is not valid TOML or has unknown keys.
    #[error("failed to parse logging configuration from {origin}: {source}")]
    Parse {
        /// File name or `<string>`.
        origin: String,
        /// Parser error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// Two handlers were registered under the same name.
    #[error(
        "only one handler can be configured with the name '{name}' (attempted merging {existing} and {duplicate})"
    )]
    DuplicateHandler {
        /// The contested name.
        name: String,
        /// Description of the handler registered first.
        existing: String,
        /// Description of the handler registered second.
        duplicate: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
